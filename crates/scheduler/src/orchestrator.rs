//! The monthly lifecycle: decide what today's phase requires and do it.
//!
//! One [`Orchestrator::run_daily`] call per day drives everything:
//! resetting the store at the boundary, keeping the collection service up
//! during the window, reminding the team, and running generation on the
//! second-to-last day.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::FutureExt;
use oncall_core::{Config, CycleMonth};
use oncall_notify::{Audience, Dispatcher, Message, MessageContext, TemplateRenderer};
use oncall_store::CycleStore;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::LifecycleError;
use crate::generation::{GenerationInvoker, FAILURE_TAIL_CHARS, SUCCESS_TAIL_CHARS};
use crate::phase::{days_left, expected_cycle, resolve_phase, CalendarPhase};
use crate::service::CollectionService;

/// What a daily or startup run ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// Nothing required for this phase.
    Idle(CalendarPhase),
    /// The store now collects for this month.
    Reset(CycleMonth),
    /// The store was already on the next month at the boundary.
    ResetSkipped(CycleMonth),
    /// Service ensured and team reminded.
    Reminded { days_left: u32 },
    /// Generation ran and the service was stopped.
    Generated { exit_code: i32 },
    /// Startup found the window open and brought the service up.
    ServiceStarted(CalendarPhase),
}

/// Drives the cycle against its collaborators.
pub struct Orchestrator<S, G, K, C> {
    config: Arc<Config>,
    generation_at: NaiveTime,
    service: S,
    generator: G,
    store: K,
    dispatcher: Dispatcher,
    renderer: TemplateRenderer,
    clock: C,
}

impl<S, G, K, C> Orchestrator<S, G, K, C>
where
    S: CollectionService,
    G: GenerationInvoker,
    K: CycleStore,
    C: Clock,
{
    pub fn new(
        config: Arc<Config>,
        service: S,
        generator: G,
        store: K,
        dispatcher: Dispatcher,
        clock: C,
    ) -> Result<Self, LifecycleError> {
        let generation_at = config.trigger.generation_time()?;
        Ok(Self {
            config,
            generation_at,
            service,
            generator,
            store,
            dispatcher,
            renderer: TemplateRenderer::new(),
            clock,
        })
    }

    fn reminder_days(&self) -> u32 {
        self.config.cycle.reminder_days
    }

    /// Bring the process state in line with today's phase after a restart.
    ///
    /// Starts the service inside the window or on generation day; never
    /// notifies, resets at the boundary, or generates.
    pub fn reconcile_startup(&mut self) -> CycleAction {
        let today = self.clock.now().date();
        let left = days_left(today);
        let phase = resolve_phase(today, self.reminder_days());
        info!(%today, days_left = left, ?phase, "startup reconciliation");

        if phase != CalendarPhase::ResetBoundary {
            self.reconcile_cycle(today);
        }

        match phase {
            CalendarPhase::ReminderWindow(_) | CalendarPhase::GenerationDay => {
                info!("inside collection window, starting collection service");
                self.ensure_service();
                CycleAction::ServiceStarted(phase)
            }
            CalendarPhase::ResetBoundary => {
                info!("reset boundary today, leaving the reset to the daily check");
                CycleAction::Idle(phase)
            }
            CalendarPhase::PostGeneration => {
                info!("generation already done this month, collection service stays off");
                CycleAction::Idle(phase)
            }
            CalendarPhase::Outside => {
                let opens_in = (left + 1).saturating_sub(self.reminder_days());
                info!(opens_in_days = opens_in, "outside collection window");
                CycleAction::Idle(phase)
            }
        }
    }

    /// The once-a-day check.
    ///
    /// # Errors
    ///
    /// Returns a store error if the boundary reset fails; the reset is then
    /// abandoned for this cycle. Every other failure is logged and absorbed.
    pub async fn run_daily(&mut self) -> Result<CycleAction, LifecycleError> {
        let now = self.clock.now();
        let today = now.date();
        let left = days_left(today);
        let phase = resolve_phase(today, self.reminder_days());
        info!(%today, days_left = left, ?phase, "daily check");

        if phase == CalendarPhase::ResetBoundary {
            return self.reset_boundary(today);
        }
        self.reconcile_cycle(today);

        match phase {
            CalendarPhase::ReminderWindow(d) => {
                self.ensure_service();
                let ctx = self.context(today, d);
                self.notify(Audience::Team, Message::Reminder, &ctx).await;
                Ok(CycleAction::Reminded { days_left: d })
            }
            CalendarPhase::GenerationDay => Ok(self.generation_day(now).await),
            CalendarPhase::PostGeneration => {
                info!("schedule already generated for this month");
                Ok(CycleAction::Idle(phase))
            }
            _ => {
                info!("outside collection window, no action needed");
                Ok(CycleAction::Idle(phase))
            }
        }
    }

    /// [`run_daily`](Self::run_daily) with errors and panics logged instead
    /// of propagated.
    pub async fn run_daily_guarded(&mut self) -> Option<CycleAction> {
        match AssertUnwindSafe(self.run_daily()).catch_unwind().await {
            Ok(Ok(action)) => Some(action),
            Ok(Err(e)) => {
                error!(error = %e, "daily check failed");
                None
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %msg, "daily check panicked");
                None
            }
        }
    }

    /// Stop the collection service before the process exits.
    pub fn shutdown(&mut self) {
        info!("shutting down lifecycle orchestrator");
        self.service.stop();
    }

    fn reset_boundary(&mut self, today: NaiveDate) -> Result<CycleAction, LifecycleError> {
        let target = expected_cycle(today, self.reminder_days());
        let current = self.store.current_cycle()?;
        if current >= target {
            info!(%current, "store already collecting for the upcoming month, reset skipped");
            return Ok(CycleAction::ResetSkipped(current));
        }
        let cycle = if current.next() == target {
            self.store.advance_cycle_and_clear_restrictions()?
        } else {
            self.store.realign_cycle(target)?
        };
        Ok(CycleAction::Reset(cycle))
    }

    /// Realign the store if a boundary reset was missed. Never fails.
    fn reconcile_cycle(&self, today: NaiveDate) {
        let expected = expected_cycle(today, self.reminder_days());
        match self.store.current_cycle() {
            Ok(current) if current < expected => {
                warn!(%current, %expected, "constraint store missed its reset, realigning");
                if let Err(e) = self.store.realign_cycle(expected) {
                    error!(error = %e, "failed to realign constraint store");
                }
            }
            Ok(current) if current > expected => {
                warn!(%current, %expected, "constraint store is ahead of the calendar, leaving it");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not read constraint store, skipping cycle check"),
        }
    }

    async fn generation_day(&mut self, now: NaiveDateTime) -> CycleAction {
        let today = now.date();
        self.ensure_service();
        let ctx = self.context(today, 1);
        self.notify(Audience::Team, Message::FinalNotice, &ctx).await;

        let deadline = today.and_time(self.generation_at);
        if now < deadline {
            info!(
                at = %self.generation_at.format("%H:%M"),
                minutes = (deadline - now).num_minutes(),
                "waiting for submission deadline before generating"
            );
            self.clock.sleep_until(deadline).await;
        }

        let result = self.generator.run().await;
        if result.succeeded() {
            let admin = MessageContext {
                output_tail: result.output_tail(SUCCESS_TAIL_CHARS).to_string(),
                ..ctx.clone()
            };
            self.notify(Audience::Admin, Message::AdminSuccess, &admin).await;
            self.notify(Audience::Team, Message::TeamSuccess, &ctx).await;
        } else {
            error!(exit_code = result.exit_code, "schedule generation failed");
            let admin = MessageContext {
                output_tail: result.output_tail(FAILURE_TAIL_CHARS).to_string(),
                ..ctx.clone()
            };
            self.notify(Audience::Admin, Message::AdminFailure, &admin).await;
        }

        self.service.stop();
        CycleAction::Generated {
            exit_code: result.exit_code,
        }
    }

    fn ensure_service(&mut self) {
        if let Err(e) = self.service.start() {
            error!(error = %e, "failed to start collection service");
        }
    }

    fn context(&self, today: NaiveDate, days_left: u32) -> MessageContext {
        MessageContext {
            days_left,
            target_month: CycleMonth::of(today).next().name().to_string(),
            app_url: self.config.cycle.app_url.clone(),
            output_tail: String::new(),
        }
    }

    async fn notify(&self, audience: Audience, message: Message, ctx: &MessageContext) {
        let text = self.renderer.render_or_fallback(message, ctx);
        self.dispatcher.send(audience, &text).await;
    }
}
