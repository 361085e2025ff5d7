#![cfg(test)]

// ============================================================
// MAILBOX DELIVERY POLICY
// ============================================================

use std::time::{Duration, Instant};

use lapwing::mailbox::{Mailbox, SendOutcome};

mod backpressure {
    use super::*;

    #[tokio::test]
    async fn flood_should_deliver_capacity_and_drop_the_rest() {
        let (mailbox, mut rx) = Mailbox::channel("flood", 4, Duration::from_millis(20));

        let mut delivered = 0;
        let mut dropped = 0;
        for i in 0..20u32 {
            match mailbox.post(i).await {
                SendOutcome::Delivered => delivered += 1,
                SendOutcome::Dropped => dropped += 1,
                SendOutcome::Closed => panic!("receiver still alive"),
            }
        }

        assert_eq!(delivered, 4, "a full mailbox accepts exactly its capacity");
        assert_eq!(dropped, 16);

        // everything that was delivered arrives, in order, and nothing else
        for expected in 0..4u32 {
            assert_eq!(rx.recv().await, Some(expected));
        }
        assert!(rx.try_recv().is_err(), "dropped messages must not reappear");
    }

    #[tokio::test]
    async fn post_should_never_block_past_the_retry_window() {
        let (mailbox, _rx) = Mailbox::channel("bounded-wait", 1, Duration::from_millis(50));
        assert_eq!(mailbox.post(0u8).await, SendOutcome::Delivered);

        let start = Instant::now();
        let outcome = mailbox.post(1u8).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, SendOutcome::Dropped);
        assert!(
            elapsed < Duration::from_millis(500),
            "send against a stuck receiver took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn slow_consumer_should_eventually_get_every_delivered_message() {
        let (mailbox, mut rx) = Mailbox::channel("slow", 2, Duration::from_millis(200));

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(v) = rx.recv().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
                seen.push(v);
            }
            seen
        });

        let mut delivered = Vec::new();
        for i in 0..10u32 {
            if mailbox.post(i).await == SendOutcome::Delivered {
                delivered.push(i);
            }
        }
        drop(mailbox);

        let seen = consumer.await.unwrap();
        assert_eq!(seen, delivered, "delivered messages arrive exactly once, in order");
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn concurrent_senders_should_interleave_without_loss() {
        let (mailbox, mut rx) = Mailbox::channel("concurrent", 64, Duration::from_millis(100));

        let sends = (0..8u32).map(|sender| {
            let mailbox = mailbox.clone();
            async move {
                for i in 0..8u32 {
                    assert_eq!(mailbox.post(sender * 8 + i).await, SendOutcome::Delivered);
                }
            }
        });
        futures::future::join_all(sends).await;
        drop(mailbox);

        let mut received = Vec::new();
        while let Some(v) = rx.recv().await {
            received.push(v);
        }
        received.sort_unstable();
        assert_eq!(received, (0..64).collect::<Vec<_>>());
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn post_should_report_closed_after_receiver_drop() {
        let (mailbox, rx) = Mailbox::channel("closed", 4, Duration::from_millis(20));
        drop(rx);

        assert_eq!(mailbox.post(0u8).await, SendOutcome::Closed);
        assert!(!SendOutcome::Closed.is_delivered());
    }

    #[tokio::test]
    async fn clones_should_feed_the_same_receiver() {
        let (mailbox, mut rx) = Mailbox::channel("cloned", 8, Duration::from_millis(20));
        let clone = mailbox.clone();

        mailbox.post(1u8).await;
        clone.post(2u8).await;

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }
}
