//! QR expiry countdown.
//!
//! A background task ticks once per second and decrements the remaining
//! seconds. When the counter reaches zero it runs the expiry callback once.
//! Cancelling (or dropping) the handle stops the task before its next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Handle to a running countdown.
#[derive(Debug)]
pub(crate) struct Countdown {
    id: u64,
    remaining: Arc<AtomicU64>,
    token: CancellationToken,
}

impl Countdown {
    /// Start counting down from `seconds`.
    ///
    /// The task is cancelled together with `parent`. `on_expire` is not
    /// called if the countdown was cancelled first.
    pub(crate) fn start<F>(id: u64, seconds: u64, parent: &CancellationToken, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = parent.child_token();
        let remaining = Arc::new(AtomicU64::new(seconds));

        let task_token = token.clone();
        let task_remaining = Arc::clone(&remaining);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => {
                        debug!(countdown = id, "Countdown cancelled");
                        return;
                    }
                    _ = ticker.tick() => {
                        let left = task_remaining
                            .fetch_sub(1, Ordering::SeqCst)
                            .saturating_sub(1);
                        if left == 0 {
                            break;
                        }
                    }
                }
            }
            if !task_token.is_cancelled() {
                debug!(countdown = id, "Countdown expired");
                on_expire();
            }
        });

        Self {
            id,
            remaining,
            token,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
