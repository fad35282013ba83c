mod monitor_tests;
