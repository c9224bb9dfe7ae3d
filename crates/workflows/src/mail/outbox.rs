use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::{MailError, Mailer, OutboundEmail};

/// Bounded queue in front of a [`Mailer`].
///
/// Enqueueing never waits on delivery. A single worker drains the queue;
/// failed deliveries are logged and counted, and the caller's state change
/// stands.
#[derive(Debug, Clone)]
pub struct MailOutbox {
    sender: mpsc::Sender<OutboundEmail>,
}

impl MailOutbox {
    /// Starts the delivery worker. It exits once every outbox clone is
    /// dropped and the queue is drained.
    pub fn spawn(mailer: Arc<dyn Mailer>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<OutboundEmail>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(email) = receiver.recv().await {
                match mailer.send(&email).await {
                    Ok(()) => {
                        tracing::debug!(to = %email.to, subject = %email.subject, "mail delivered");
                        metrics::counter!("mail_delivered_total").increment(1);
                    }
                    Err(err) => {
                        tracing::warn!(
                            to = %email.to,
                            subject = %email.subject,
                            error = %err,
                            "mail delivery failed"
                        );
                        metrics::counter!("mail_delivery_failures_total").increment(1);
                    }
                }
            }
            tracing::debug!("mail outbox closed");
        });

        (Self { sender }, worker)
    }

    #[cfg(test)]
    pub(crate) fn from_sender(sender: mpsc::Sender<OutboundEmail>) -> Self {
        Self { sender }
    }

    pub fn enqueue(&self, email: OutboundEmail) -> Result<(), MailError> {
        self.sender.try_send(email).map_err(|err| match err {
            TrySendError::Full(_) => MailError::QueueFull,
            TrySendError::Closed(_) => MailError::QueueClosed,
        })?;
        metrics::counter!("mail_enqueued_total").increment(1);
        Ok(())
    }
}
