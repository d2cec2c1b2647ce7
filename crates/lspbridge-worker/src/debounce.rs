//! Per-subject cancel-and-reschedule timers for diagnostics requests.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default quiescence window before a scheduled request fires.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(500);

/// Debounces repeated requests keyed by subject.
///
/// Scheduling a subject cancels any not-yet-fired task for the same subject,
/// so only the most recent request in a quiescence window executes, with its
/// own arguments. Handles live in this struct, one per subject — session
/// state, not process state.
pub struct Debouncer<T> {
    delay: Duration,
    fire_tx: mpsc::UnboundedSender<T>,
    pending: HashMap<String, CancellationToken>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer delivering fired requests on the returned receiver.
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        (Self { delay, fire_tx, pending: HashMap::new() }, fire_rx)
    }

    /// Schedule `request` for `subject`, cancelling any earlier scheduled
    /// request for the same subject that has not fired yet.
    pub fn schedule(&mut self, subject: impl Into<String>, request: T) {
        let subject = subject.into();
        if let Some(previous) = self.pending.remove(&subject) {
            previous.cancel();
        }

        let token = CancellationToken::new();
        self.pending.insert(subject, token.clone());

        let delay = self.delay;
        let fire_tx = self.fire_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = fire_tx.send(request);
                }
            }
        });
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        for token in self.pending.values() {
            token.cancel();
        }
    }
}
