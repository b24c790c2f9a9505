//! Notification delivery for the on-call cycle.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - A Slack-compatible webhook notifier
//! - Minijinja templates for every lifecycle message
//! - A lossy, best-effort dispatcher addressing the team and admin audiences

pub mod dispatcher;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use templating::{Message, MessageContext, TemplateRenderer};
pub use traits::{Audience, Notification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
