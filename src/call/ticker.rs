use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Counts whole periods elapsed since it was started. Must be started from
/// inside a tokio runtime; the counting task is aborted on `stop` or drop.
pub struct Ticker {
    elapsed: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn every_second() -> Self {
        Self::start(Duration::from_secs(1))
    }

    pub fn start(period: Duration) -> Self {
        let elapsed = Arc::new(AtomicU64::new(0));
        let counter = elapsed.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
        Self { elapsed, handle }
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn stop(self) -> u64 {
        self.handle.abort();
        self.elapsed()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
