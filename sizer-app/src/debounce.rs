//! Debounce primitive.
//!
//! Coalesces bursts of updates on a `watch` channel: every update restarts
//! the quiet timer and only the latest value is emitted once the timer runs
//! out. When the sender is dropped, a pending value is flushed immediately.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Run the debounce loop until the sender side of `rx` is dropped.
///
/// `settle` receives each settled value and is awaited before the next
/// burst is observed. The value held by `rx` at call time counts as already
/// seen.
pub async fn run_debounced<T, F, Fut>(mut rx: watch::Receiver<T>, quiet: Duration, mut settle: F)
where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if rx.changed().await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Closed mid-burst: flush what we have
                        break;
                    }
                },
                _ = tokio::time::sleep(quiet) => break,
            }
        }

        let value = rx.borrow_and_update().clone();
        settle(value).await;
    }
}

/// Spawn [`run_debounced`] on the runtime.
pub fn spawn_debounced<T, F, Fut>(rx: watch::Receiver<T>, quiet: Duration, settle: F) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(run_debounced(rx, quiet, settle))
}

// =============================================================================
// Tests
// =============================================================================
