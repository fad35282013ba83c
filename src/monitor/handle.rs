//! Lifecycle handle for a running monitor
//!
//! Wraps the scheduler task so callers can start it once, observe whether
//! it is still running, and request a stop from any thread. Single-instance
//! enforcement across processes is the job of [`InstanceLock`]; within a
//! process the handle consumes the scheduler on launch, so a second start
//! is a compile-time impossibility rather than a runtime check.
//!
//! [`InstanceLock`]: crate::monitor::InstanceLock

use crate::cancel::{StopSignal, StopToken};
use crate::extract::Extractor;
use crate::monitor::scheduler::Scheduler;
use crate::notify::Notifier;
use crate::transport::PageFetcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Handle to a spawned monitoring loop
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    signal: StopSignal,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorHandle {
    /// Spawns the monitoring loop onto the current runtime
    pub fn launch<F, E, N>(scheduler: Scheduler<F, E, N>) -> Self
    where
        F: PageFetcher + 'static,
        E: Extractor + 'static,
        N: Notifier + 'static,
    {
        let (signal, token) = StopToken::new_pair();
        let running = Arc::new(AtomicBool::new(true));

        let flag = running.clone();
        let task = tokio::spawn(async move {
            scheduler.run(token).await;
            flag.store(false, Ordering::SeqCst);
        });

        Self {
            running,
            signal,
            task: Mutex::new(Some(task)),
        }
    }

    /// Whether the loop is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests a stop; safe to call from any thread, idempotent
    pub fn stop(&self) {
        let _ = self.signal.send(true);
    }

    /// Requests a stop and waits for the loop to finish
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.task.lock().map(|mut t| t.take()).unwrap_or(None);
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Monitor task ended abnormally: {}", e);
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}
