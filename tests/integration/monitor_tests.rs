//! Integration tests for the monitoring cycle
//!
//! These tests use wiremock to stand in for both the marketplace and the
//! Telegram Bot API, and exercise the full cycle end-to-end: fetch through
//! the real HTTP transport, extraction, dedup, batching, and delivery.

use adwatch::cancel::StopToken;
use adwatch::config::{
    Config, NotifyConfig, PermutationMode, ScheduleConfig, SearchConfig, StorageConfig,
    TransportConfig,
};
use adwatch::dedup::FingerprintStore;
use adwatch::extract::HtmlExtractor;
use adwatch::monitor::Scheduler;
use adwatch::notify::TelegramNotifier;
use adwatch::stats::StatsLedger;
use adwatch::transport::{ReqwestFetcher, TransportManager};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS_PAGE: &str = r#"<html><body>
    <div id="srchrslt-adtable">
        <a class="aditem-main--title" href="/ad/rennrad-carbon/101">Rennrad Carbon 56cm</a>
        <a class="aditem-main--title" href="/ad/rennrad-stahl/102">Rennrad Stahl Klassiker</a>
        <a class="aditem-main--title" href="/ad/stadtrad/103">Stadtrad Hollandrad</a>
    </div>
    </body></html>"#;

const BLOCKED_PAGE: &str =
    r#"<html><body>Cloudflare - please complete the captcha to continue</body></html>"#;

/// Creates a test configuration pointed at the given mock marketplace
fn create_test_config(market_url: &str, data_dir: &str) -> Config {
    Config {
        search: SearchConfig {
            base_url: market_url.to_string(),
            query_template: "/s-seite:{page}/{query}/k0".to_string(),
            keywords: vec!["rennrad".to_string()],
            negative_keywords: vec![],
            permutations: PermutationMode::Single,
            max_pages_per_cycle: 1,
            listing_selector: "a.aditem-main--title".to_string(),
        },
        schedule: ScheduleConfig {
            base_interval_mins: 20,
            max_interval_mins: 50,
            interval_multiplier: 5,
            empty_page_threshold: 3,
            cycle_wait_mins: 30,
            window_start_hour: 0,
            window_end_hour: 24,
            utc_offset_hours: 0,
            max_page_attempts: 3,
            page_retry_min_secs: 0,
            page_retry_max_secs: 0,
        },
        transport: TransportConfig {
            max_attempts: 1,
            backoff_min_secs: 0,
            backoff_max_secs: 0,
            ..TransportConfig::default()
        },
        notify: NotifyConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            chunk_size: 20,
            max_message_chars: 4096,
            inter_chunk_delay_ms: 0,
        },
        storage: StorageConfig {
            data_dir: data_dir.to_string(),
        },
    }
}

fn build_scheduler(
    config: Config,
    telegram_url: &str,
    dir: &TempDir,
) -> Scheduler<ReqwestFetcher, HtmlExtractor, TelegramNotifier> {
    let fetcher = ReqwestFetcher::new(Duration::from_secs(5)).expect("client builds");
    let transport = TransportManager::new(
        fetcher,
        config.transport.clone(),
        dir.path().join("session.json"),
    );
    let extractor = HtmlExtractor::new(
        &config.search.listing_selector,
        url::Url::parse(&config.search.base_url).expect("base url parses"),
    );
    let notifier =
        TelegramNotifier::with_api_base(&config.notify.bot_token, telegram_url).expect("notifier");
    let store = FingerprintStore::open(&dir.path().join("fingerprints.log")).expect("store opens");
    let ledger = StatsLedger::open(&dir.path().join("stats.json"));

    Scheduler::new(config, transport, extractor, notifier, store, ledger).expect("scheduler builds")
}

#[tokio::test]
async fn test_full_cycle_delivers_and_dedups() {
    let market = MockServer::start().await;
    let telegram = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/s-seite:1/rennrad/k0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&market)
        .await;

    // Both qualifying listings arrive in one message; the Stadtrad does not
    // match the keyword and is never mentioned
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains("Rennrad Carbon 56cm"))
        .and(body_string_contains("Rennrad Stahl Klassiker"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&telegram)
        .await;

    let config = create_test_config(&market.uri(), &dir.path().to_string_lossy());
    let mut scheduler = build_scheduler(config, &telegram.uri(), &dir);

    let report = scheduler.run_cycle(&mut StopToken::never()).await;
    assert_eq!(report.pages_succeeded, 1);
    assert_eq!(report.listings_seen, 2);
    assert_eq!(report.new_listings, 2);
    assert_eq!(report.chunks_sent, 1);
    assert!(!report.notify_aborted);

    // Second cycle sees the same page and delivers nothing new; the
    // expect(1) on the Telegram mock verifies no second message went out
    let report = scheduler.run_cycle(&mut StopToken::never()).await;
    assert_eq!(report.listings_seen, 2);
    assert_eq!(report.new_listings, 0);
    assert_eq!(report.chunks_sent, 0);

    // Both fingerprints were persisted
    let log = std::fs::read_to_string(dir.path().join("fingerprints.log")).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[tokio::test]
async fn test_blocked_response_recovers_within_cycle() {
    let market = MockServer::start().await;
    let telegram = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // First hit is a challenge page; every later hit is real results
    Mock::given(method("GET"))
        .and(path("/s-seite:1/rennrad/k0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BLOCKED_PAGE))
        .up_to_n_times(1)
        .mount(&market)
        .await;
    Mock::given(method("GET"))
        .and(path("/s-seite:1/rennrad/k0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&market)
        .await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&telegram)
        .await;

    let config = create_test_config(&market.uri(), &dir.path().to_string_lossy());
    let mut scheduler = build_scheduler(config, &telegram.uri(), &dir);

    // With a single transport attempt the blocked response pushes the fetch
    // into the session-less fallback, which lands on the real page
    let report = scheduler.run_cycle(&mut StopToken::never()).await;
    assert_eq!(report.pages_succeeded, 1);
    assert_eq!(report.new_listings, 2);
    assert_eq!(report.chunks_sent, 1);
}

#[tokio::test]
async fn test_failed_delivery_is_retried_next_cycle() {
    let market = MockServer::start().await;
    let telegram = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/s-seite:1/rennrad/k0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&market)
        .await;

    // Telegram is down for the first cycle, healthy afterwards
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(1)
        .mount(&telegram)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&telegram)
        .await;

    let config = create_test_config(&market.uri(), &dir.path().to_string_lossy());
    let mut scheduler = build_scheduler(config, &telegram.uri(), &dir);

    let first = scheduler.run_cycle(&mut StopToken::never()).await;
    assert_eq!(first.new_listings, 2);
    assert_eq!(first.chunks_sent, 0);
    assert!(first.notify_aborted);

    // Nothing was committed, so the same listings are staged and delivered
    // on the next cycle
    let second = scheduler.run_cycle(&mut StopToken::never()).await;
    assert_eq!(second.new_listings, 2);
    assert_eq!(second.chunks_sent, 1);
    assert!(!second.notify_aborted);

    let log = std::fs::read_to_string(dir.path().join("fingerprints.log")).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[tokio::test]
async fn test_dead_market_records_errors_not_panics() {
    let telegram = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Nothing listens on this port
    let mut config = create_test_config("http://127.0.0.1:1", &dir.path().to_string_lossy());
    config.schedule.max_page_attempts = 2;

    let mut scheduler = build_scheduler(config, &telegram.uri(), &dir);
    let report = scheduler.run_cycle(&mut StopToken::never()).await;

    assert_eq!(report.pages_succeeded, 0);
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.new_listings, 0);
    assert!(!scheduler.ledger().recent_errors(10).is_empty());
}

#[tokio::test]
async fn test_stats_survive_reopen() {
    let market = MockServer::start().await;
    let telegram = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&market)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .mount(&telegram)
        .await;

    let config = create_test_config(&market.uri(), &dir.path().to_string_lossy());
    let mut scheduler = build_scheduler(config, &telegram.uri(), &dir);
    scheduler.run_cycle(&mut StopToken::never()).await;
    drop(scheduler);

    let reopened = StatsLedger::open(&dir.path().join("stats.json"));
    assert_eq!(reopened.overall_stats().successes, 1);
    assert_eq!(reopened.stats_by_keyword_set()["rennrad"].ads_found, 2);
}
