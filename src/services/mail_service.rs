//! Email dispatch collaborator.
//!
//! Registration and password-reset flows block on a single synchronous
//! `send` call; the outcome decides whether their durable writes stand.

use thiserror::Error;

/// Errors specific to mail dispatch.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail provider rejected the message (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail dispatch is not configured")]
    NotConfigured,
}

/// Domain service trait for outbound email.
#[async_trait::async_trait]
pub trait MailService: Send + Sync {
    /// Deliver one message. A non-error return means the provider accepted
    /// the message, not that it reached the inbox.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
