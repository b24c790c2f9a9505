//! Daily cron trigger and the daemon loop around it.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use cron::Schedule;
use oncall_store::CycleStore;
use tracing::{error, info};

use crate::clock::{Clock, Zone};
use crate::error::LifecycleError;
use crate::generation::GenerationInvoker;
use crate::orchestrator::Orchestrator;
use crate::process::shutdown_signal;
use crate::service::CollectionService;

/// Longest single sleep between wall-clock checks.
const MAX_SLEEP: Duration = Duration::from_secs(300);

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// A cron schedule evaluated in a [`Zone`].
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    expression: String,
    schedule: Schedule,
    zone: Zone,
}

impl DailyTrigger {
    /// Parse a 5- or 6-field cron expression whose fields are wall-clock
    /// times in `zone`.
    pub fn parse(expression: &str, zone: Zone) -> Result<Self, LifecycleError> {
        let schedule =
            Schedule::from_str(&normalize_cron(expression)).map_err(|e| LifecycleError::Cron {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            zone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.zone {
            Zone::Host => self
                .schedule
                .after(&after.with_timezone(&Local))
                .next()
                .map(|t| t.with_timezone(&Utc)),
            Zone::Named(tz) => self
                .schedule
                .after(&after.with_timezone(&tz))
                .next()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// Why a wait inside the daemon loop ended.
enum Wake {
    Fire,
    Shutdown,
}

/// Run until Ctrl-C or SIGTERM: startup reconciliation, then one daily
/// check per trigger fire. The collection service is stopped on exit.
///
/// With `check_now`, a daily check also runs right after startup.
pub async fn run_daemon<S, G, K, C>(
    orchestrator: &mut Orchestrator<S, G, K, C>,
    trigger: &DailyTrigger,
    check_now: bool,
) -> Result<(), LifecycleError>
where
    S: CollectionService,
    G: GenerationInvoker,
    K: CycleStore,
    C: Clock,
{
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    orchestrator.reconcile_startup();
    let mut run_now = check_now;

    let outcome = loop {
        if !run_now {
            let Some(next) = trigger.next_after(Utc::now()) else {
                break Err(LifecycleError::Cron {
                    expression: trigger.expression().to_string(),
                    reason: "no upcoming fire time".to_string(),
                });
            };
            info!(
                next = %trigger.zone.local(next).format("%Y-%m-%d %H:%M"),
                zone = %trigger.zone,
                "next daily check scheduled"
            );

            let wake = loop {
                let remaining = (next - Utc::now()).to_std().unwrap_or_default();
                if remaining.is_zero() {
                    break Ok(Wake::Fire);
                }
                tokio::select! {
                    _ = tokio::time::sleep(remaining.min(MAX_SLEEP)) => {}
                    res = &mut shutdown => break res.map(|()| Wake::Shutdown),
                }
            };
            match wake {
                Ok(Wake::Fire) => {}
                Ok(Wake::Shutdown) => break Ok(()),
                Err(e) => break Err(LifecycleError::Signal(e)),
            }
        }
        run_now = false;

        tokio::select! {
            action = orchestrator.run_daily_guarded() => {
                if let Some(action) = action {
                    info!(?action, "daily check complete");
                }
            }
            res = &mut shutdown => {
                info!("shutdown requested during daily check, abandoning it");
                break res.map_err(LifecycleError::Signal);
            }
        }
    };

    if let Err(e) = &outcome {
        error!(error = %e, "daemon loop stopped");
    } else {
        info!("shutdown signal received");
    }
    orchestrator.shutdown();
    outcome
}
