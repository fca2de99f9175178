//! Change notifications.
//!
//! [`compose`] renders a diff; a [`NotificationSink`] delivers it. The
//! monitor only ever sees the trait, so delivery failures are reported
//! back as [`NotifyError`] and never abort a cycle.

mod compose;
mod smtp;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use compose::{compose, MISSING_LINK};
pub use smtp::SmtpSink;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Delivers a composed notification.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
///
/// Used when SMTP credentials are not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!("Notification (not emailed): {}\n{}", subject, body);
        Ok(())
    }
}
