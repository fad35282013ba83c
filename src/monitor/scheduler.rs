//! Monitoring scheduler
//!
//! Runs the polling loop: operating-window gate, page walk through the
//! transport manager, extraction, dedup against the fingerprint store,
//! batched notification with per-chunk fingerprint commit, statistics
//! recording, and adaptive inter-cycle sleep. Nothing that happens inside
//! a cycle terminates the loop; only a stop signal does.

use crate::cancel::StopToken;
use crate::config::Config;
use crate::dedup::{fingerprint, Fingerprint, FingerprintStore};
use crate::extract::{Extractor, Listing};
use crate::monitor::interval::AdaptiveInterval;
use crate::monitor::search::{KeywordSet, SearchPlan};
use crate::monitor::window::OperatingWindow;
use crate::notify::{pack_results, random_marker, Notifier};
use crate::stats::StatsLedger;
use crate::transport::{FetchError, PageFetcher, TransportManager};
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

/// Summary of one monitoring cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Pages fetched and extracted successfully
    pub pages_succeeded: u32,
    /// Pages abandoned after their attempt budget
    pub pages_failed: u32,
    /// Qualifying listings extracted (pre-dedup)
    pub listings_seen: usize,
    /// Listings that passed dedup this cycle
    pub new_listings: usize,
    /// Message chunks delivered
    pub chunks_sent: usize,
    /// Whether delivery was aborted mid-batch
    pub notify_aborted: bool,
    /// Whether the cycle ended early on a stop request
    pub cancelled: bool,
}

/// The monitoring loop and its state
pub struct Scheduler<F: PageFetcher, E: Extractor, N: Notifier> {
    config: Config,
    plan: SearchPlan,
    window: OperatingWindow,
    interval: AdaptiveInterval,
    transport: TransportManager<F>,
    extractor: E,
    notifier: N,
    store: FingerprintStore,
    ledger: StatsLedger,
}

impl<F: PageFetcher, E: Extractor, N: Notifier> Scheduler<F, E, N> {
    /// Assembles the scheduler from its collaborators
    pub fn new(
        config: Config,
        transport: TransportManager<F>,
        extractor: E,
        notifier: N,
        store: FingerprintStore,
        ledger: StatsLedger,
    ) -> crate::Result<Self> {
        let plan = SearchPlan::from_config(&config.search)?;
        let window = OperatingWindow::from_config(&config.schedule);
        let interval = AdaptiveInterval::new(
            Duration::from_secs(config.schedule.base_interval_mins * 60),
            Duration::from_secs(config.schedule.max_interval_mins * 60),
            config.schedule.interval_multiplier as u32,
            config.schedule.empty_page_threshold,
        );

        Ok(Self {
            config,
            plan,
            window,
            interval,
            transport,
            extractor,
            notifier,
            store,
            ledger,
        })
    }

    /// Read access to the statistics ledger (health reporting)
    pub fn ledger(&self) -> &StatsLedger {
        &self.ledger
    }

    /// Runs the monitoring loop until a stop request arrives
    pub async fn run(mut self, mut stop: StopToken) {
        tracing::info!(
            "Monitor started: {} permutation(s), {} page(s) per cycle",
            self.plan.permutations().len(),
            self.config.search.max_pages_per_cycle
        );

        loop {
            if stop.is_stopped() {
                break;
            }

            if !self.window.wait_until_open(&mut stop).await {
                break;
            }

            let report = self.run_cycle(&mut stop).await;
            tracing::info!(
                "Cycle done: {} page(s) ok, {} failed, {} listing(s) seen, {} new, {} chunk(s) sent",
                report.pages_succeeded,
                report.pages_failed,
                report.listings_seen,
                report.new_listings,
                report.chunks_sent
            );
            if report.cancelled {
                break;
            }

            let wait = self.inter_cycle_wait();
            tracing::debug!("Sleeping {:?} until next cycle", wait);
            if !sleep_sliced(&mut stop, wait).await {
                break;
            }
        }

        tracing::info!("Monitor stopped");
    }

    /// The inter-cycle sleep: the fixed cadence, stretched by the adaptive
    /// interval when it has escalated past it
    fn inter_cycle_wait(&self) -> Duration {
        let fixed = Duration::from_secs(self.config.schedule.cycle_wait_mins * 60);
        fixed.max(self.interval.current())
    }

    /// Runs one full cycle across all permutations and pages
    pub async fn run_cycle(&mut self, stop: &mut StopToken) -> CycleReport {
        let mut report = CycleReport::default();
        let mut staged: Vec<(Listing, Fingerprint)> = Vec::new();
        let mut staged_fps: HashSet<Fingerprint> = HashSet::new();

        'permutations: for set in self.plan.permutations().to_vec() {
            for page in 1..=self.config.search.max_pages_per_cycle {
                if stop.is_stopped() {
                    report.cancelled = true;
                    break 'permutations;
                }

                match self.fetch_page(&set, page, stop).await {
                    PageOutcome::Cancelled => {
                        report.cancelled = true;
                        break 'permutations;
                    }
                    PageOutcome::Abandoned => {
                        report.pages_failed += 1;
                        // A dead page counts against the yield signal
                        self.interval.record_page(false);
                        // Remaining pages of this permutation are skipped;
                        // the cycle itself continues
                        continue 'permutations;
                    }
                    PageOutcome::Fetched(body) => {
                        report.pages_succeeded += 1;

                        let listings = self.extractor.extract(
                            &body,
                            &self.config.search.keywords,
                            &self.config.search.negative_keywords,
                        );
                        report.listings_seen += listings.len();

                        self.ledger
                            .record_success(&set.key(), page, listings.len() as u32);
                        self.interval.record_page(!listings.is_empty());

                        for listing in listings {
                            let fp = fingerprint(&listing.url);
                            if self.store.is_new(&fp) && staged_fps.insert(fp.clone()) {
                                staged.push((listing, fp));
                            }
                        }
                    }
                }

                // Short randomized pause before the next page
                if page < self.config.search.max_pages_per_cycle
                    && !stop.sleep(self.page_jitter()).await
                {
                    report.cancelled = true;
                    break 'permutations;
                }
            }
        }

        report.new_listings = staged.len();
        if !staged.is_empty() {
            self.notify_and_commit(&staged, stop, &mut report).await;
        }

        report
    }

    /// Fetches one result page within the per-page attempt budget
    async fn fetch_page(&mut self, set: &KeywordSet, page: u32, stop: &mut StopToken) -> PageOutcome {
        let url = self.plan.page_url(set, page);

        for attempt in 1..=self.config.schedule.max_page_attempts {
            if stop.is_stopped() {
                return PageOutcome::Cancelled;
            }

            match self.transport.fetch(&url, stop).await {
                Ok(body) => return PageOutcome::Fetched(body),
                Err(FetchError::Cancelled) => return PageOutcome::Cancelled,
                Err(error) => {
                    tracing::warn!(
                        "Page {} attempt {}/{} failed for '{}': {}",
                        page,
                        attempt,
                        self.config.schedule.max_page_attempts,
                        set.key(),
                        error
                    );
                    self.ledger
                        .record_error(&set.key(), page, error.kind(), &error.to_string());

                    if attempt < self.config.schedule.max_page_attempts
                        && !stop.sleep(self.page_jitter()).await
                    {
                        return PageOutcome::Cancelled;
                    }
                }
            }
        }

        tracing::error!(
            "Abandoning page {} of '{}' after {} attempts",
            page,
            set.key(),
            self.config.schedule.max_page_attempts
        );
        PageOutcome::Abandoned
    }

    /// Sends the staged listings in chunks, committing fingerprints only
    /// for chunks that were delivered
    ///
    /// A failed send aborts the remaining chunks; their fingerprints stay
    /// uncommitted so the listings are picked up again next cycle.
    async fn notify_and_commit(
        &mut self,
        staged: &[(Listing, Fingerprint)],
        stop: &mut StopToken,
        report: &mut CycleReport,
    ) {
        let items: Vec<String> = staged
            .iter()
            .map(|(listing, _)| format!("{}\n{}", listing.title, listing.url))
            .collect();

        let chunks = pack_results(
            &items,
            self.config.notify.chunk_size,
            self.config.notify.max_message_chars,
            &random_marker(),
        );
        let total = chunks.len();

        for (idx, chunk) in chunks.iter().enumerate() {
            match self
                .notifier
                .send(&self.config.notify.chat_id, &chunk.text)
                .await
            {
                Ok(()) => {
                    report.chunks_sent += 1;
                    // Delivered listings are now seen; commit happens-after send
                    for (_, fp) in &staged[chunk.item_indices.clone()] {
                        if let Err(e) = self.store.commit(fp) {
                            tracing::warn!("Could not persist fingerprint: {}", e);
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(
                        "Delivery failed on chunk {}/{}, aborting batch: {}",
                        idx + 1,
                        total,
                        error
                    );
                    report.notify_aborted = true;
                    break;
                }
            }

            if idx + 1 < total {
                let delay = Duration::from_millis(self.config.notify.inter_chunk_delay_ms);
                if !stop.sleep(delay).await {
                    report.notify_aborted = true;
                    break;
                }
            }
        }
    }

    /// Randomized short delay between page attempts and pages
    fn page_jitter(&self) -> Duration {
        let min = self.config.schedule.page_retry_min_secs;
        let max = self.config.schedule.page_retry_max_secs.max(min);
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}

/// Outcome of one page's fetch budget
enum PageOutcome {
    Fetched(String),
    Abandoned,
    Cancelled,
}

/// Sleeps `total` in one-second cancellable slices
async fn sleep_sliced(stop: &mut StopToken, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        let slice = remaining.min(Duration::from_secs(1));
        if !stop.sleep(slice).await {
            return false;
        }
        remaining -= slice;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        NotifyConfig, PermutationMode, ScheduleConfig, SearchConfig, StorageConfig,
        TransportConfig,
    };
    use crate::notify::NotifyError;
    use crate::stats::OutcomeStatus;
    use crate::transport::{RawResponse, RequestHeaders};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const VALID_BODY: &str = r#"<html><body><div id="srchrslt-adtable">
        <a class="aditem-main--title" href="/ad/1">Rennrad Shimano</a>
        <a class="aditem-main--title" href="/ad/2">Rennrad Campagnolo</a>
        </div></body></html>"#;

    const EMPTY_RESULTS_BODY: &str =
        r#"<html><body><div id="srchrslt-adtable"></div></body></html>"#;

    const BLOCKED_BODY: &str = "<html>cloudflare captcha</html>";

    fn test_config(dir: &TempDir) -> Config {
        Config {
            search: SearchConfig {
                base_url: "https://market.example.com".to_string(),
                query_template: "/s-seite:{page}/{query}/k0".to_string(),
                keywords: vec!["rennrad".to_string()],
                negative_keywords: vec![],
                permutations: PermutationMode::Single,
                max_pages_per_cycle: 2,
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
                max_page_attempts: 2,
                page_retry_min_secs: 0,
                page_retry_max_secs: 0,
            },
            transport: TransportConfig {
                backoff_min_secs: 0,
                backoff_max_secs: 0,
                max_attempts: 1,
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
                data_dir: dir.path().to_string_lossy().to_string(),
            },
        }
    }

    /// Fetch primitive that replays a script, then repeats its last entry
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<RawResponse, String>>>,
        repeat_last: Option<Result<RawResponse, String>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<RawResponse, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                repeat_last: None,
            }
        }

        fn repeating(response: Result<RawResponse, String>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                repeat_last: Some(response),
            }
        }

        fn ok(body: &str) -> Result<RawResponse, String> {
            Ok(RawResponse {
                status: 200,
                body: body.to_string(),
                set_cookies: vec![],
            })
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _url: &str,
            _headers: &RequestHeaders,
            _cookie: Option<&str>,
        ) -> Result<RawResponse, String> {
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            self.repeat_last
                .clone()
                .unwrap_or_else(|| Err("script exhausted".to_string()))
        }
    }

    /// Notifier that records sends and can fail from a given index on
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<String>>>,
        fail_from: Option<usize>,
    }

    impl RecordingNotifier {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    sent: sent.clone(),
                    fail_from: None,
                },
                sent,
            )
        }

        fn failing_from(index: usize) -> (Self, Arc<Mutex<Vec<String>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    sent: sent.clone(),
                    fail_from: Some(index),
                },
                sent,
            )
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _recipient: &str, text: &str) -> Result<(), NotifyError> {
            let mut sent = self.sent.lock().unwrap();
            if let Some(fail_from) = self.fail_from {
                if sent.len() >= fail_from {
                    return Err(NotifyError::Rejected {
                        status: 502,
                        detail: "flaky".to_string(),
                    });
                }
            }
            sent.push(text.to_string());
            Ok(())
        }
    }

    fn scheduler_with(
        dir: &TempDir,
        config: Config,
        fetcher: ScriptedFetcher,
        notifier: RecordingNotifier,
    ) -> Scheduler<ScriptedFetcher, crate::extract::HtmlExtractor, RecordingNotifier> {
        let transport = TransportManager::new(
            fetcher,
            config.transport.clone(),
            dir.path().join("session.json"),
        );
        let extractor = crate::extract::HtmlExtractor::new(
            &config.search.listing_selector,
            url::Url::parse(&config.search.base_url).unwrap(),
        );
        let store = FingerprintStore::open(&dir.path().join("fingerprints.log")).unwrap();
        let ledger = StatsLedger::open(&dir.path().join("stats.json"));
        Scheduler::new(config, transport, extractor, notifier, store, ledger).unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_commits_after_delivery() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 1;

        let (notifier, sent) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::new(vec![ScriptedFetcher::ok(VALID_BODY)]);
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        let report = scheduler.run_cycle(&mut StopToken::never()).await;

        assert_eq!(report.pages_succeeded, 1);
        assert_eq!(report.new_listings, 2);
        assert_eq!(report.chunks_sent, 1);
        assert!(!report.notify_aborted);

        // One message carrying both listings
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Rennrad Shimano"));
        assert!(sent[0].contains("https://market.example.com/ad/2"));

        // Both fingerprints committed after the send
        assert_eq!(scheduler.store.len(), 2);

        // Stats: one success with ads_found = 2
        let stats = scheduler.ledger.overall_stats();
        assert_eq!(stats.successes, 1);
        let by_set = scheduler.ledger.stats_by_keyword_set();
        assert_eq!(by_set["rennrad"].ads_found, 2);
    }

    #[tokio::test]
    async fn test_second_cycle_dedups_everything() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 1;

        let (notifier, sent) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::repeating(ScriptedFetcher::ok(VALID_BODY));
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        let first = scheduler.run_cycle(&mut StopToken::never()).await;
        assert_eq!(first.new_listings, 2);

        let second = scheduler.run_cycle(&mut StopToken::never()).await;
        assert_eq!(second.listings_seen, 2);
        assert_eq!(second.new_listings, 0);
        assert_eq!(second.chunks_sent, 0);

        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_listing_across_pages_staged_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir); // 2 pages per cycle

        let (notifier, _) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::repeating(ScriptedFetcher::ok(VALID_BODY));
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        let report = scheduler.run_cycle(&mut StopToken::never()).await;
        assert_eq!(report.pages_succeeded, 2);
        assert_eq!(report.listings_seen, 4);
        // The same two ads appeared on both pages
        assert_eq!(report.new_listings, 2);
    }

    #[tokio::test]
    async fn test_failed_chunk_leaves_fingerprints_uncommitted() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 1;
        config.notify.chunk_size = 1; // one listing per chunk

        let (notifier, sent) = RecordingNotifier::failing_from(1);
        let fetcher = ScriptedFetcher::new(vec![ScriptedFetcher::ok(VALID_BODY)]);
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        let report = scheduler.run_cycle(&mut StopToken::never()).await;

        assert_eq!(report.new_listings, 2);
        assert_eq!(report.chunks_sent, 1);
        assert!(report.notify_aborted);
        assert_eq!(sent.lock().unwrap().len(), 1);

        // Only the delivered chunk's fingerprint was committed; the other
        // listing will be retried next cycle
        assert_eq!(scheduler.store.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_page_aborts_remaining_pages_not_cycle() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir); // 2 attempts per page, 1 transport attempt

        let (notifier, _) = RecordingNotifier::new();
        // Page 1 blocked on every attempt; would-be page 2 is never reached
        let fetcher = ScriptedFetcher::repeating(ScriptedFetcher::ok(BLOCKED_BODY));
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        let report = scheduler.run_cycle(&mut StopToken::never()).await;

        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.pages_succeeded, 0);
        assert!(!report.cancelled);

        // Errors were recorded for the page attempts
        assert!(!scheduler.ledger.recent_errors(10).is_empty());
    }

    #[tokio::test]
    async fn test_empty_pages_escalate_interval() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 3;

        let (notifier, _) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::repeating(ScriptedFetcher::ok(EMPTY_RESULTS_BODY));
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        assert_eq!(scheduler.interval.current(), Duration::from_secs(20 * 60));
        let report = scheduler.run_cycle(&mut StopToken::never()).await;
        assert_eq!(report.pages_succeeded, 3);
        assert_eq!(report.new_listings, 0);

        // 3 empty pages with threshold 3: min(20 * 5, 50) = 50 minutes
        assert_eq!(scheduler.interval.current(), Duration::from_secs(50 * 60));
        assert_eq!(scheduler.inter_cycle_wait(), Duration::from_secs(50 * 60));
    }

    #[tokio::test]
    async fn test_yielding_page_restores_interval() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 1;

        let (notifier, _) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::new(vec![
            ScriptedFetcher::ok(EMPTY_RESULTS_BODY),
            ScriptedFetcher::ok(EMPTY_RESULTS_BODY),
            ScriptedFetcher::ok(EMPTY_RESULTS_BODY),
            ScriptedFetcher::ok(VALID_BODY),
        ]);
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        // The counter carries across cycles: three one-page cycles escalate
        for _ in 0..3 {
            scheduler.run_cycle(&mut StopToken::never()).await;
        }
        assert_eq!(scheduler.interval.current(), Duration::from_secs(50 * 60));

        scheduler.run_cycle(&mut StopToken::never()).await;
        assert_eq!(scheduler.interval.current(), Duration::from_secs(20 * 60));
    }

    #[tokio::test]
    async fn test_stats_record_per_keyword_set() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 1;

        let (notifier, _) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::new(vec![ScriptedFetcher::ok(VALID_BODY)]);
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);
        scheduler.run_cycle(&mut StopToken::never()).await;

        let records = scheduler.ledger.stats_by_keyword_set();
        assert_eq!(records["rennrad"].successes, 1);
        assert!(matches!(
            scheduler.ledger.overall_stats().success_rate,
            rate if (rate - 1.0).abs() < 1e-9
        ));
    }

    #[tokio::test]
    async fn test_stop_mid_cycle_cancels() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let (notifier, _) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::repeating(ScriptedFetcher::ok(VALID_BODY));
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        let (tx, mut stop) = StopToken::new_pair();
        tx.send(true).unwrap();

        let report = scheduler.run_cycle(&mut stop).await;
        assert!(report.cancelled);
        assert_eq!(report.pages_succeeded, 0);
    }

    #[tokio::test]
    async fn test_error_records_carry_page_and_kind() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.search.max_pages_per_cycle = 1;
        config.schedule.max_page_attempts = 1;

        let (notifier, _) = RecordingNotifier::new();
        let fetcher = ScriptedFetcher::repeating(Err("connection refused".to_string()));
        let mut scheduler = scheduler_with(&dir, config, fetcher, notifier);

        scheduler.run_cycle(&mut StopToken::never()).await;

        let errors = scheduler.ledger.recent_errors(1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].page, 1);
        assert!(matches!(
            &errors[0].outcome,
            OutcomeStatus::Error { error_type, .. } if error_type == "exhausted"
        ));
    }
}
