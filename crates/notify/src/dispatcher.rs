//! Routes messages to the team or admin channel.
//!
//! Delivery is lossy by contract: one attempt per message, no queue and no
//! retry. Failures are logged and reported back as a [`DispatchOutcome`],
//! never as an error.

use oncall_core::CycleConfig;

use crate::traits::{is_placeholder, Audience, Notification, Notifier};
use crate::webhook::WebhookNotifier;

/// What happened to a single `send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// No channel configured for the audience; the message was only logged.
    Skipped,
    Failed(String),
}

/// Best-effort sender with one optional channel per audience.
pub struct Dispatcher {
    team: Option<Box<dyn Notifier>>,
    admin: Option<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(team: Option<Box<dyn Notifier>>, admin: Option<Box<dyn Notifier>>) -> Self {
        Self { team, admin }
    }

    /// A dispatcher that logs every message and sends nothing.
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    /// Build webhook channels from the cycle config.
    ///
    /// Missing, placeholder, or unresolvable endpoints leave that audience
    /// log-only instead of failing startup.
    pub fn from_config(cycle: &CycleConfig) -> Self {
        Self::new(
            channel_from(Audience::Team, cycle.team_webhook.as_deref()),
            channel_from(Audience::Admin, cycle.admin_webhook.as_deref()),
        )
    }

    pub fn is_configured(&self, audience: Audience) -> bool {
        self.channel(audience).is_some()
    }

    fn channel(&self, audience: Audience) -> Option<&dyn Notifier> {
        match audience {
            Audience::Team => self.team.as_deref(),
            Audience::Admin => self.admin.as_deref(),
        }
    }

    /// Send `text` to `audience`. Never fails.
    pub async fn send(&self, audience: Audience, text: &str) -> DispatchOutcome {
        let Some(channel) = self.channel(audience) else {
            tracing::info!(
                %audience,
                "(not configured) {}",
                preview(text)
            );
            return DispatchOutcome::Skipped;
        };

        let notification = Notification {
            audience,
            text: text.to_string(),
        };
        let start = std::time::Instant::now();
        let result = channel.send(&notification).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(
                    %audience,
                    channel = channel.channel_name(),
                    duration_ms,
                    "notification delivered"
                );
                DispatchOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    %audience,
                    channel = channel.channel_name(),
                    error = %e,
                    duration_ms,
                    "notification delivery failed"
                );
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}

fn channel_from(audience: Audience, endpoint: Option<&str>) -> Option<Box<dyn Notifier>> {
    let endpoint = endpoint.filter(|e| !is_placeholder(e))?;
    match WebhookNotifier::new(endpoint) {
        Ok(notifier) => Some(Box::new(notifier)),
        Err(e) => {
            tracing::warn!(%audience, error = %e, "webhook unusable, messages will be logged only");
            None
        }
    }
}

/// First 80 characters of a message for log lines.
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(80).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
