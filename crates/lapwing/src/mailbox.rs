//! Bounded inter-context mailboxes.
//!
//! Every cross-context channel in lapwing uses the same delivery policy:
//! a non-blocking send, one bounded retry while the receiver catches up,
//! then drop the message and log it. A sender never blocks past the retry
//! window and never loses a message silently.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

/// Result of a [`Mailbox::post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// Mailbox stayed full past the retry window; the message was dropped
    /// and a diagnostic emitted.
    Dropped,
    /// Receiver is gone.
    Closed,
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Sending half of a bounded FIFO mailbox. Cloneable; payload ownership
/// transfers fully to the receiver.
#[derive(Debug, Clone)]
pub struct Mailbox<T> {
    tx: mpsc::Sender<T>,
    name: &'static str,
    retry_window: Duration,
}

impl<T: Send> Mailbox<T> {
    /// Create a mailbox and its consumer end.
    pub fn channel(
        name: &'static str,
        capacity: usize,
        retry_window: Duration,
    ) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                name,
                retry_window,
            },
            rx,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Deliver `msg` under the send policy. Waits at most the retry window.
    pub async fn post(&self, msg: T) -> SendOutcome {
        match self.tx.try_send(msg) {
            Ok(()) => SendOutcome::Delivered,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(mailbox = self.name, "mailbox closed, message lost");
                SendOutcome::Closed
            }
            Err(mpsc::error::TrySendError::Full(msg)) => {
                match timeout(self.retry_window, self.tx.send(msg)).await {
                    Ok(Ok(())) => SendOutcome::Delivered,
                    Ok(Err(_)) => {
                        tracing::warn!(mailbox = self.name, "mailbox closed during retry");
                        SendOutcome::Closed
                    }
                    Err(_) => {
                        tracing::warn!(
                            mailbox = self.name,
                            retry_ms = self.retry_window.as_millis() as u64,
                            "mailbox full past retry window, message dropped"
                        );
                        SendOutcome::Dropped
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_delivers_within_capacity() {
        let (mailbox, mut rx) = Mailbox::channel("test", 4, Duration::from_millis(20));
        for i in 0..4 {
            assert_eq!(mailbox.post(i).await, SendOutcome::Delivered);
        }
        assert_eq!(rx.recv().await, Some(0));
    }

    #[tokio::test]
    async fn test_post_drops_when_full_past_retry() {
        let (mailbox, _rx) = Mailbox::channel("test", 1, Duration::from_millis(20));
        assert_eq!(mailbox.post(1u8).await, SendOutcome::Delivered);
        assert_eq!(mailbox.post(2u8).await, SendOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_post_succeeds_if_drained_during_retry() {
        let (mailbox, mut rx) = Mailbox::channel("test", 1, Duration::from_millis(500));
        assert_eq!(mailbox.post(1u8).await, SendOutcome::Delivered);

        let drain = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            rx.recv().await
        });
        assert_eq!(mailbox.post(2u8).await, SendOutcome::Delivered);
        assert_eq!(drain.await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_post_reports_closed_receiver() {
        let (mailbox, rx) = Mailbox::channel("test", 1, Duration::from_millis(20));
        drop(rx);
        assert_eq!(mailbox.post(1u8).await, SendOutcome::Closed);
    }
}
