//! Notifier trait definition and shared error types.

use std::fmt;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Who a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// The whole team's broadcast channel.
    Team,
    /// Direct messages to the operator.
    Admin,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Team => f.write_str("team"),
            Audience::Admin => f.write_str("admin"),
        }
    }
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub audience: Audience,
    pub text: String,
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook").
    fn channel_name(&self) -> &str;
}

/// Marker found in template config values that were never filled in.
const PLACEHOLDER_MARKER: &str = "YOUR";

/// Whether an endpoint value is blank or still a template placeholder.
pub fn is_placeholder(endpoint: &str) -> bool {
    let trimmed = endpoint.trim();
    trimmed.is_empty() || trimmed.contains(PLACEHOLDER_MARKER)
}
