//! Bounded notification fan-out.
//!
//! Delivery itself belongs to an external collaborator; the engine only
//! owns the contract that a batch never has more than
//! [`MAX_IN_FLIGHT`] sends in flight, respecting downstream rate
//! limits. Failures are collected and reported, never retried here.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

pub const MAX_IN_FLIGHT: usize = 5;

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Stand-in delivery channel: writes the notification to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            body = %notification.body,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Send a batch with at most [`MAX_IN_FLIGHT`] concurrent sends.
/// Returns the notifications that failed, with their errors.
pub async fn dispatch_all(
    notifier: Arc<dyn Notifier>,
    batch: Vec<Notification>,
) -> Vec<(Notification, anyhow::Error)> {
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let mut tasks = Vec::with_capacity(batch.len());

    for notification in batch {
        let semaphore = Arc::clone(&semaphore);
        let notifier = Arc::clone(&notifier);
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("notification semaphore closed");
            match notifier.send(&notification).await {
                Ok(()) => None,
                Err(error) => Some((notification, error)),
            }
        }));
    }

    let mut failures = Vec::new();
    for task in tasks {
        if let Ok(Some(failure)) = task.await {
            failures.push(failure);
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingNotifier {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delivered: AtomicUsize,
    }

    impl CountingNotifier {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delivered: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            if notification.recipient == "0923456789" {
                anyhow::bail!("mailbox unavailable");
            }
            Ok(())
        }
    }

    fn batch(size: usize) -> Vec<Notification> {
        (0..size)
            .map(|i| Notification {
                recipient: format!("teacher-{i}"),
                subject: "Self-evaluation reminder".to_string(),
                body: "Your self-evaluation is still pending.".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn fan_out_never_exceeds_the_concurrency_cap() {
        let notifier = Arc::new(CountingNotifier::new());
        let failures = dispatch_all(notifier.clone(), batch(20)).await;

        assert!(failures.is_empty());
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 20);
        assert!(notifier.peak.load(Ordering::SeqCst) <= MAX_IN_FLIGHT);
    }

    #[tokio::test]
    async fn failed_sends_are_collected_not_retried() {
        let notifier = Arc::new(FailingNotifier);
        let batch = vec![
            Notification {
                recipient: "0912345678".to_string(),
                subject: "reminder".to_string(),
                body: String::new(),
            },
            Notification {
                recipient: "0923456789".to_string(),
                subject: "reminder".to_string(),
                body: String::new(),
            },
        ];

        let failures = dispatch_all(notifier, batch).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.recipient, "0923456789");
    }
}
