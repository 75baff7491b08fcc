//! Listener plumbing for relayed HAL events.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Receiver of vendor HAL events relayed by the bridge.
///
/// Implementations are invoked on whatever thread the HAL fired from and
/// outside any bridge lock, so it is safe to call back into the bridge.
pub trait VendorEventListener: Send + Sync {
    /// BR/EDR cleanup finished; `success` is the HAL's verdict.
    fn on_bredr_cleanup(&self, success: bool);
}

/// Listener that only logs, useful during bring-up and as a default sink.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl VendorEventListener for LoggingListener {
    fn on_bredr_cleanup(&self, success: bool) {
        log::info!("BR/EDR cleanup completed: success={}", success);
    }
}

/// Adapter that turns the completion callback into an awaitable one-shot.
///
/// Resolves at most once; repeat completions are ignored. Dropping the
/// waiter without a completion closes the receiving half with an error.
pub struct CleanupWaiter {
    tx: Mutex<Option<oneshot::Sender<bool>>>,
}

impl CleanupWaiter {
    /// Creates the waiter and the receiver the caller awaits.
    pub fn new() -> (Arc<Self>, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }
}

impl VendorEventListener for CleanupWaiter {
    fn on_bredr_cleanup(&self, success: bool) {
        match self.tx.lock().take() {
            // The receiver may be gone; a completion nobody awaits is fine.
            Some(tx) => {
                let _ = tx.send(success);
            }
            None => log::debug!("BR/EDR cleanup already resolved, ignoring repeat completion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_waiter_resolves_once() {
        let (waiter, rx) = CleanupWaiter::new();

        waiter.on_bredr_cleanup(true);
        // Second completion must not panic or overwrite the first.
        waiter.on_bredr_cleanup(false);

        assert_eq!(rx.await, Ok(true));
    }

    #[tokio::test]
    async fn test_waiter_dropped_without_completion() {
        let (waiter, rx) = CleanupWaiter::new();
        drop(waiter);

        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_waiter_tolerates_dropped_receiver() {
        let (waiter, rx) = CleanupWaiter::new();
        drop(rx);

        // Must not panic even though nobody is listening.
        waiter.on_bredr_cleanup(false);
    }

    #[test]
    fn test_logging_listener_is_a_no_op_sink() {
        LoggingListener.on_bredr_cleanup(true);
        LoggingListener.on_bredr_cleanup(false);
    }
}
