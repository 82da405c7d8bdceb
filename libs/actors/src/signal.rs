//! Completion Signal
//!
//! One-shot handoff between a process and whoever is waiting for it to ask
//! for shutdown. The writing half lives in process state and fires at most
//! once; later writes are no-ops, so a repeated request can never block or
//! panic the writer.

use tokio::sync::oneshot;
use tracing::debug;

/// Create a connected signal/waiter pair
pub fn completion_signal() -> (CompletionSignal, CompletionWaiter) {
    let (sender, receiver) = oneshot::channel();
    (
        CompletionSignal {
            sender: Some(sender),
        },
        CompletionWaiter { receiver },
    )
}

/// Writing half, owned by a single process
#[derive(Debug)]
pub struct CompletionSignal {
    sender: Option<oneshot::Sender<bool>>,
}

impl CompletionSignal {
    /// Deliver `value` to the waiter
    ///
    /// Returns `true` only for the call that actually fired the signal.
    pub fn fire(&mut self, value: bool) -> bool {
        match self.sender.take() {
            Some(sender) => {
                if sender.send(value).is_err() {
                    debug!("Completion waiter already dropped");
                }
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.sender.is_none()
    }
}

/// Reading half, observed exactly once
#[derive(Debug)]
pub struct CompletionWaiter {
    receiver: oneshot::Receiver<bool>,
}

impl CompletionWaiter {
    /// Suspend until the signal fires
    ///
    /// Resolves to `None` if the signal was dropped without firing, which
    /// happens when the owning process ends for any other reason.
    pub async fn wait(self) -> Option<bool> {
        self.receiver.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_fire_wins() {
        let (mut signal, waiter) = completion_signal();
        assert!(!signal.has_fired());
        assert!(signal.fire(true));
        assert!(signal.has_fired());
        assert!(!signal.fire(false));

        assert_eq!(waiter.wait().await, Some(true));
    }

    #[tokio::test]
    async fn test_dropped_signal_releases_waiter() {
        let (signal, waiter) = completion_signal();
        drop(signal);
        assert_eq!(waiter.wait().await, None);
    }

    #[test]
    fn test_fire_without_waiter_does_not_panic() {
        let (mut signal, waiter) = completion_signal();
        drop(waiter);
        assert!(signal.fire(true));
        assert!(!signal.fire(true));
    }
}
