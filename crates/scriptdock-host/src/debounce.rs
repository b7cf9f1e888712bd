//! Trailing-edge coalescing of change notifications.
//!
//! Every event restarts a `quiet` countdown. The callback fires once when
//! the countdown elapses with no further event, so a burst of saves turns
//! into a single rescan at `last_event + quiet` or later. There is no upper
//! bound on how long a steady stream of events can postpone the trigger.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::watcher::ChangeEvent;

/// Default quiet interval.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Coalesces bursts of [`ChangeEvent`]s into single triggers.
#[derive(Debug, Clone, Copy)]
pub struct ReloadDebouncer {
    quiet: Duration,
}

impl Default for ReloadDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ReloadDebouncer {
    /// Create a debouncer with the given quiet interval.
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self { quiet }
    }

    /// Consume `events` until cancelled or the channel closes, calling
    /// `on_fire` once per quiet period that follows at least one event.
    ///
    /// `on_fire` receives a 1-based trigger count and is awaited before the
    /// next event is read; events arriving meanwhile are buffered by the
    /// channel and start a new countdown afterwards. A pending trigger is
    /// discarded on cancellation or channel close.
    pub async fn run<F, Fut>(
        self,
        mut events: mpsc::UnboundedReceiver<ChangeEvent>,
        cancel: CancellationToken,
        mut on_fire: F,
    ) where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut deadline: Option<Instant> = None;
        let mut fired: u64 = 0;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!(pending = deadline.is_some(), "Debouncer cancelled");
                    return;
                }

                () = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    deadline = None;
                    fired = fired.saturating_add(1);
                    debug!(trigger = fired, "Quiet period elapsed");
                    on_fire(fired).await;
                }

                event = events.recv() => {
                    match event {
                        Some(change) => {
                            #[allow(clippy::arithmetic_side_effects)]
                            // Instant + Duration cannot overflow in practice
                            let at = Instant::now() + self.quiet;
                            debug!(path = %change.path.display(), kind = ?change.kind, "Countdown restarted");
                            deadline = Some(at);
                        }
                        None => {
                            debug!(pending = deadline.is_some(), "Change channel closed, stopping debouncer");
                            return;
                        }
                    }
                }
            }
        }
    }
}
