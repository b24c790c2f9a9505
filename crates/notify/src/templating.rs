//! Minijinja templates for lifecycle messages.
//!
//! Every message the orchestrator sends is one of the [`Message`] variants,
//! rendered against a [`MessageContext`]. A fresh
//! [`minijinja::Environment`] is created per render call.

use crate::traits::NotifyError;

/// Data available to message templates.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MessageContext {
    /// Days left in the current month.
    pub days_left: u32,
    /// Name of the month being scheduled, e.g. `"March"`.
    pub target_month: String,
    /// Collection form URL.
    pub app_url: String,
    /// Trailing generation output, already truncated.
    pub output_tail: String,
}

/// The fixed set of lifecycle messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Daily team reminder inside the window.
    Reminder,
    /// Team reminder on generation day.
    FinalNotice,
    /// Admin report with generation output after success.
    AdminSuccess,
    /// Team announcement after success. Never includes raw output.
    TeamSuccess,
    /// Admin report with generation output after failure.
    AdminFailure,
}

impl Message {
    fn template(self) -> &'static str {
        match self {
            Message::Reminder => concat!(
                "🔔 *On-Call Constraints: {{ days_left }} {{ days_left | pluralize('day', 'days') }} left!*\n\n",
                "Please log in and mark your unavailable shifts for *{{ target_month }}*.\n",
                "👉 {{ app_url }}\n\n",
                "_Deadline: tomorrow night_"
            ),
            Message::FinalNotice => concat!(
                "⏰ *Last chance to submit on-call constraints!*\n",
                "The schedule will be generated tonight. ",
                "Make sure you've marked your unavailable shifts for *{{ target_month }}*.\n",
                "👉 {{ app_url }}"
            ),
            Message::AdminSuccess => concat!(
                "✅ *On-Call Schedule Generated Successfully!*\n",
                "```{{ output_tail }}```"
            ),
            Message::TeamSuccess => concat!(
                "✅ *The on-call schedule for {{ target_month }} is ready!*\n",
                "📊 Check the Google Drive spreadsheet, the new month has been added.\n",
                "_See you next month! 👋_"
            ),
            Message::AdminFailure => concat!(
                "❌ *Schedule generation FAILED*\n",
                "Please check the logs and run manually.\n",
                "```{{ output_tail }}```"
            ),
        }
    }

    /// Plain text used if rendering ever fails.
    pub fn fallback_text(self, ctx: &MessageContext) -> String {
        match self {
            Message::Reminder => format!(
                "On-call constraints: {} day(s) left. {}",
                ctx.days_left, ctx.app_url
            ),
            Message::FinalNotice => format!("Last chance to submit on-call constraints: {}", ctx.app_url),
            Message::AdminSuccess => format!("Schedule generated successfully.\n{}", ctx.output_tail),
            Message::TeamSuccess => "The on-call schedule is ready.".to_string(),
            Message::AdminFailure => format!("Schedule generation FAILED.\n{}", ctx.output_tail),
        }
    }
}

/// Renders [`Message`] templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("pluralize", pluralize_filter);
        env
    }

    /// Render a message with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if rendering fails.
    pub fn render(&self, message: Message, ctx: &MessageContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(message.template(), ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Render, falling back to [`Message::fallback_text`] on error.
    pub fn render_or_fallback(&self, message: Message, ctx: &MessageContext) -> String {
        self.render(message, ctx).unwrap_or_else(|e| {
            tracing::error!(?message, error = %e, "message template failed, sending plain text");
            message.fallback_text(ctx)
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: pick the singular form for 1, the plural otherwise.
fn pluralize_filter(count: u32, singular: String, plural: String) -> String {
    if count == 1 {
        singular
    } else {
        plural
    }
}
