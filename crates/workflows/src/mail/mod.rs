//! Outbound mail: the delivery capability, a queued outbox and the
//! transactional templates.

mod outbox;
mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, watch};

pub use outbox::MailOutbox;
pub use templates::{cancellation_email, verification_email};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail queue is full")]
    QueueFull,

    #[error("Mail queue is closed")]
    QueueClosed,

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Delivers a rendered email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

/// Writes each email to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.html_body,
            "outbound email"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<OutboundEmail>,
    failing: bool,
}

/// Records deliveries instead of sending them.
#[derive(Debug, Clone)]
pub struct InMemoryMailer {
    state: Arc<Mutex<InMemoryMailerState>>,
    attempts: Arc<watch::Sender<usize>>,
}

impl Default for InMemoryMailer {
    fn default() -> Self {
        let (attempts, _) = watch::channel(0);
        Self {
            state: Arc::default(),
            attempts: Arc::new(attempts),
        }
    }
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following delivery fail until switched back.
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.state.lock().await.sent.clone()
    }

    /// Waits until at least `count` deliveries were attempted.
    pub async fn wait_for_attempts(&self, count: usize) {
        let mut attempts = self.attempts.subscribe();
        let _ = attempts.wait_for(|seen| *seen >= count).await;
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let result = {
            let mut state = self.state.lock().await;
            if state.failing {
                Err(MailError::Delivery("mailer switched off".to_string()))
            } else {
                state.sent.push(email.clone());
                Ok(())
            }
        };
        self.attempts.send_modify(|seen| *seen += 1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "ada@example.com".to_string(),
            subject: "Hello".to_string(),
            html_body: "<p>Hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_mailer_records() {
        let mailer = InMemoryMailer::new();
        mailer.send(&email()).await.unwrap();

        mailer.wait_for_attempts(1).await;
        assert_eq!(mailer.sent().await, vec![email()]);
    }

    #[tokio::test]
    async fn test_in_memory_mailer_failing() {
        let mailer = InMemoryMailer::new();
        mailer.set_failing(true).await;

        assert!(matches!(
            mailer.send(&email()).await,
            Err(MailError::Delivery(_))
        ));
        assert!(mailer.sent().await.is_empty());
    }
}
