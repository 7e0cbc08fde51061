//! Background eviction of expired windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::store::WindowStore;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to a running periodic sweep of a window store.
///
/// The sweep stops when [`Reaper::shutdown`] is awaited or, failing that,
/// when the handle is dropped.
#[derive(Debug)]
pub struct Reaper {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Start sweeping `store` every `interval`.
    ///
    /// Must be called from within a Tokio runtime. The first sweep happens
    /// one full interval after the call.
    pub fn spawn(store: Arc<WindowStore>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        info!(interval_ms = interval.as_millis() as u64, "Starting window reaper");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            debug!(removed = removed, remaining = store.len(), "Swept expired windows");
                        }
                    }
                }
            }

            info!("Window reaper stopped");
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Whether the sweep task is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the sweep and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Window reaper task ended abnormally");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use crate::ratelimit::key::WindowKey;

    // Tokio's clock is paused in these tests, so sleeps advance virtual
    // time straight to the next reaper tick.

    #[tokio::test(start_paused = true)]
    async fn test_reaper_empties_expired_store() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(WindowStore::with_clock(clock.clone()));

        for i in 0..50 {
            store.record_hit(&WindowKey::new("p", format!("ip{}", i)), Duration::from_millis(10));
        }
        assert_eq!(store.len(), 50);

        clock.advance(Duration::from_secs(1));
        let reaper = Reaper::spawn(store.clone(), Duration::from_secs(60));

        // Nothing runs before the first interval has elapsed.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(store.len(), 50);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.is_empty());

        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_keeps_live_windows() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(WindowStore::with_clock(clock.clone()));
        store.record_hit(&WindowKey::new("p", "live"), Duration::from_secs(60));

        let reaper = Reaper::spawn(store.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(store.len(), 1);

        // Once the window ends the next tick removes it.
        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.is_empty());

        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let store = Arc::new(WindowStore::new());
        let reaper = Reaper::spawn(store, Duration::from_secs(60));
        assert!(reaper.is_running());

        let start = tokio::time::Instant::now();
        reaper.shutdown().await;

        // Shutdown does not wait for the next tick.
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(WindowStore::with_clock(clock.clone()));
        store.record_hit(&WindowKey::new("p", "k"), Duration::from_millis(10));
        clock.advance(Duration::from_secs(1));

        drop(Reaper::spawn(store.clone(), Duration::from_secs(1)));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.len(), 1);
    }
}
