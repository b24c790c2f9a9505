//! Slack-compatible incoming-webhook notifier.
//!
//! Delivers `{"text": "..."}` JSON payloads to a configured webhook URL.

use std::time::Duration;

use crate::traits::{Notification, Notifier, NotifyError};

/// Per-request timeout for webhook delivery.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts notifications to an incoming-webhook URL.
///
/// Environment variable references (`${VAR_NAME}`) in the URL are resolved
/// at construction time so secrets can stay out of the config file.
#[derive(Debug)]
pub struct WebhookNotifier {
    /// Target URL (env vars already resolved).
    url: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier.
    ///
    /// Missing env vars referenced by `url` produce a [`NotifyError::Config`] error.
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(url.trim())?;
        if resolved_url.is_empty() {
            return Err(NotifyError::Config("webhook URL is empty".to_string()));
        }
        Ok(Self {
            url: resolved_url,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": notification.text }))
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(
            audience = %notification.audience,
            status = %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(
                    "unclosed env var reference in webhook URL".to_string(),
                ));
            }
            let value = std::env::var(&var_name).map_err(|_| {
                NotifyError::Config(format!("env var not found: {var_name}"))
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
