//! End-to-end lifecycle scenarios against in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use oncall_core::{Config, CycleMonth};
use oncall_notify::{Audience, Dispatcher, Notification, Notifier, NotifyError};
use oncall_scheduler::{
    CalendarPhase, Clock, CollectionService, CycleAction, GenerationInvoker, GenerationResult,
    LifecycleError, Orchestrator,
};
use oncall_store::{CycleStore, StoreError};

// ── Fakes ─────────────────────────────────────────────────────

type Sent = Arc<Mutex<Vec<(Audience, String)>>>;

struct RecordingNotifier {
    sent: Sent,
    fail: bool,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((notification.audience, notification.text.clone()));
        if self.fail {
            return Err(NotifyError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
struct ServiceState {
    running: bool,
    start_calls: usize,
    stop_calls: usize,
}

#[derive(Clone, Default)]
struct FakeService(Arc<Mutex<ServiceState>>);

impl CollectionService for FakeService {
    fn start(&mut self) -> Result<(), LifecycleError> {
        let mut s = self.0.lock().unwrap();
        s.start_calls += 1;
        s.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.stop_calls += 1;
        s.running = false;
    }

    fn is_running(&mut self) -> bool {
        self.0.lock().unwrap().running
    }
}

#[derive(Clone)]
struct FakeClock {
    now: Arc<Mutex<NaiveDateTime>>,
    slept_until: Arc<Mutex<Option<NaiveDateTime>>>,
}

impl FakeClock {
    fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            slept_until: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait::async_trait]
impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    async fn sleep_until(&self, deadline: NaiveDateTime) {
        *self.slept_until.lock().unwrap() = Some(deadline);
        let mut now = self.now.lock().unwrap();
        if deadline > *now {
            *now = deadline;
        }
    }
}

struct ScriptedGenerator {
    result: GenerationResult,
    runs: Arc<AtomicUsize>,
    ran_at: Arc<Mutex<Option<NaiveDateTime>>>,
    clock: FakeClock,
    panic: bool,
}

#[async_trait::async_trait]
impl GenerationInvoker for ScriptedGenerator {
    async fn run(&self) -> GenerationResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self.ran_at.lock().unwrap() = Some(self.clock.now());
        if self.panic {
            panic!("generator exploded");
        }
        self.result.clone()
    }
}

#[derive(Default)]
struct StoreState {
    cycle: Option<CycleMonth>,
    advances: usize,
    realigns: Vec<CycleMonth>,
    fail: bool,
}

#[derive(Clone, Default)]
struct MemoryStore(Arc<Mutex<StoreState>>);

impl MemoryStore {
    fn unavailable() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "constraints.json missing")
    }
}

impl CycleStore for MemoryStore {
    fn current_cycle(&self) -> Result<CycleMonth, StoreError> {
        let s = self.0.lock().unwrap();
        if s.fail {
            return Err(Self::unavailable().into());
        }
        s.cycle.ok_or_else(|| Self::unavailable().into())
    }

    fn advance_cycle_and_clear_restrictions(&self) -> Result<CycleMonth, StoreError> {
        let mut s = self.0.lock().unwrap();
        if s.fail {
            return Err(Self::unavailable().into());
        }
        let next = s.cycle.ok_or_else(Self::unavailable)?.next();
        s.cycle = Some(next);
        s.advances += 1;
        Ok(next)
    }

    fn realign_cycle(&self, target: CycleMonth) -> Result<CycleMonth, StoreError> {
        let mut s = self.0.lock().unwrap();
        if s.fail {
            return Err(Self::unavailable().into());
        }
        s.cycle = Some(target);
        s.realigns.push(target);
        Ok(target)
    }
}

// ── Harness ───────────────────────────────────────────────────

struct Harness {
    orchestrator: Orchestrator<FakeService, ScriptedGenerator, MemoryStore, FakeClock>,
    sent: Sent,
    service: FakeService,
    store: MemoryStore,
    clock: FakeClock,
    runs: Arc<AtomicUsize>,
    ran_at: Arc<Mutex<Option<NaiveDateTime>>>,
}

struct Setup {
    now: NaiveDateTime,
    store_cycle: Option<CycleMonth>,
    result: GenerationResult,
    webhooks: bool,
    failing_webhooks: bool,
    panic: bool,
}

impl Setup {
    fn at(now: NaiveDateTime) -> Self {
        Self {
            store_cycle: Some(expected_store_cycle(now.date())),
            now,
            result: GenerationResult {
                exit_code: 0,
                output: "OK\n".to_string(),
            },
            webhooks: true,
            failing_webhooks: false,
            panic: false,
        }
    }

    fn build(self) -> Harness {
        let sent: Sent = Arc::default();
        let channel = |sent: &Sent| -> Option<Box<dyn Notifier>> {
            Some(Box::new(RecordingNotifier {
                sent: sent.clone(),
                fail: self.failing_webhooks,
            }))
        };
        let dispatcher = if self.webhooks {
            Dispatcher::new(channel(&sent), channel(&sent))
        } else {
            Dispatcher::empty()
        };

        let service = FakeService::default();
        let store = MemoryStore::default();
        store.0.lock().unwrap().cycle = self.store_cycle;
        let clock = FakeClock::at(self.now);
        let runs = Arc::new(AtomicUsize::new(0));
        let ran_at = Arc::new(Mutex::new(None));
        let generator = ScriptedGenerator {
            result: self.result,
            runs: runs.clone(),
            ran_at: ran_at.clone(),
            clock: clock.clone(),
            panic: self.panic,
        };

        let orchestrator = Orchestrator::new(
            Arc::new(Config::default()),
            service.clone(),
            generator,
            store.clone(),
            dispatcher,
            clock.clone(),
        )
        .unwrap();

        Harness {
            orchestrator,
            sent,
            service,
            store,
            clock,
            runs,
            ran_at,
        }
    }
}

impl Harness {
    fn messages(&self) -> Vec<(Audience, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn to(&self, audience: Audience) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(a, _)| *a == audience)
            .map(|(_, text)| text)
            .collect()
    }

    fn starts(&self) -> usize {
        self.service.0.lock().unwrap().start_calls
    }

    fn stops(&self) -> usize {
        self.service.0.lock().unwrap().stop_calls
    }

    fn running(&self) -> bool {
        self.service.0.lock().unwrap().running
    }

    fn store_cycle(&self) -> Option<CycleMonth> {
        self.store.0.lock().unwrap().cycle
    }

    fn advances(&self) -> usize {
        self.store.0.lock().unwrap().advances
    }

    fn realigns(&self) -> Vec<CycleMonth> {
        self.store.0.lock().unwrap().realigns.clone()
    }
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn month(y: i32, m: u32) -> CycleMonth {
    CycleMonth::new(y, m).unwrap()
}

/// The store cycle a healthy deployment holds on `date` with R = 5.
fn expected_store_cycle(date: NaiveDate) -> CycleMonth {
    oncall_scheduler::expected_cycle(date, 5)
}

// ── Outside the window ────────────────────────────────────────

#[tokio::test]
async fn outside_window_does_nothing() {
    let mut h = Setup::at(at(2026, 3, 10, 10, 30)).build();
    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Idle(CalendarPhase::Outside));
    assert!(h.messages().is_empty());
    assert_eq!(h.starts(), 0);
    assert_eq!(h.stops(), 0);
    assert_eq!(h.advances(), 0);
}

#[tokio::test]
async fn day_with_exactly_r_left_is_still_outside() {
    // March 26th: 5 days left, R = 5.
    let mut h = Setup::at(at(2026, 3, 26, 10, 30)).build();
    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Idle(CalendarPhase::Outside));
    assert!(h.messages().is_empty());
    assert_eq!(h.starts(), 0);
}

#[tokio::test]
async fn last_day_of_month_does_nothing() {
    let mut h = Setup::at(at(2026, 3, 31, 10, 30)).build();
    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Idle(CalendarPhase::PostGeneration));
    assert!(h.messages().is_empty());
    assert_eq!(h.starts(), 0);
    assert_eq!(h.runs.load(Ordering::SeqCst), 0);
}

// ── Reset boundary ────────────────────────────────────────────

#[tokio::test]
async fn boundary_resets_store_exactly_once() {
    let mut setup = Setup::at(at(2026, 3, 25, 10, 30));
    setup.store_cycle = Some(month(2026, 3));
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Reset(month(2026, 4)));
    assert_eq!(h.advances(), 1);
    assert!(h.realigns().is_empty());
    assert!(h.messages().is_empty());
    assert_eq!(h.starts(), 0);
    assert_eq!(h.stops(), 0);
}

#[tokio::test]
async fn second_check_on_boundary_day_does_not_reset_again() {
    let mut setup = Setup::at(at(2026, 3, 25, 10, 30));
    setup.store_cycle = Some(month(2026, 3));
    let mut h = setup.build();

    h.orchestrator.run_daily().await.unwrap();
    let again = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(again, CycleAction::ResetSkipped(month(2026, 4)));
    assert_eq!(h.advances(), 1);
    assert_eq!(h.store_cycle(), Some(month(2026, 4)));
}

#[tokio::test]
async fn december_boundary_wraps_to_january() {
    // December 25th: 6 days left.
    let mut setup = Setup::at(at(2025, 12, 25, 10, 30));
    setup.store_cycle = Some(month(2025, 12));
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Reset(month(2026, 1)));
    assert_eq!(h.store_cycle(), Some(month(2026, 1)));
}

#[tokio::test]
async fn boundary_far_behind_realigns_to_next_month() {
    let mut setup = Setup::at(at(2026, 3, 25, 10, 30));
    setup.store_cycle = Some(month(2026, 1));
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Reset(month(2026, 4)));
    assert_eq!(h.advances(), 0);
    assert_eq!(h.realigns(), vec![month(2026, 4)]);
}

#[tokio::test]
async fn store_failure_aborts_reset_without_crashing() {
    let mut setup = Setup::at(at(2026, 3, 25, 10, 30));
    setup.store_cycle = None;
    let mut h = setup.build();

    let err = h.orchestrator.run_daily().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Store(_)));

    // The guarded entry point logs instead of propagating.
    assert_eq!(h.orchestrator.run_daily_guarded().await, None);
    assert_eq!(h.advances(), 0);
    assert!(h.messages().is_empty());
}

// ── Reminder window ───────────────────────────────────────────

#[tokio::test]
async fn reminder_day_starts_service_and_reminds_team() {
    // March 27th: 4 days left.
    let mut h = Setup::at(at(2026, 3, 27, 10, 30)).build();
    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Reminded { days_left: 4 });
    assert_eq!(h.starts(), 1);
    assert!(h.running());

    let team = h.to(Audience::Team);
    assert_eq!(team.len(), 1);
    assert!(team[0].contains("4 days left"));
    assert!(team[0].contains("April"));
    assert!(team[0].contains("http://localhost:3000"));
    assert!(h.to(Audience::Admin).is_empty());
}

#[tokio::test]
async fn every_window_day_sends_exactly_one_reminder() {
    for (day, left) in [(27, 4), (28, 3), (29, 2)] {
        let mut h = Setup::at(at(2026, 3, day, 10, 30)).build();
        h.orchestrator.run_daily().await.unwrap();
        let team = h.to(Audience::Team);
        assert_eq!(team.len(), 1, "day {day}");
        assert!(team[0].contains(&format!("{left} days left")), "day {day}");
        assert_eq!(h.stops(), 0);
    }
}

#[tokio::test]
async fn unconfigured_webhooks_do_not_block_the_cycle() {
    let mut setup = Setup::at(at(2026, 3, 27, 10, 30));
    setup.webhooks = false;
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();
    assert_eq!(action, CycleAction::Reminded { days_left: 4 });
    assert_eq!(h.starts(), 1);
}

#[tokio::test]
async fn failing_webhooks_do_not_block_the_cycle() {
    let mut setup = Setup::at(at(2026, 3, 30, 10, 30));
    setup.failing_webhooks = true;
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();
    assert_eq!(action, CycleAction::Generated { exit_code: 0 });
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);
    assert_eq!(h.stops(), 1);
}

// ── Generation day ────────────────────────────────────────────

#[tokio::test]
async fn generation_day_success_flow() {
    let mut h = Setup::at(at(2026, 3, 30, 10, 30)).build();
    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Generated { exit_code: 0 });
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);

    // Generation waited for the 17:00 deadline.
    let deadline = at(2026, 3, 30, 17, 0);
    assert_eq!(*h.clock.slept_until.lock().unwrap(), Some(deadline));
    assert_eq!(*h.ran_at.lock().unwrap(), Some(deadline));

    let messages = h.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].0, Audience::Team);
    assert!(messages[0].1.contains("Last chance"));
    assert_eq!(messages[1].0, Audience::Admin);
    assert!(messages[1].1.contains("Generated Successfully"));
    assert!(messages[1].1.contains("OK"));
    assert_eq!(messages[2].0, Audience::Team);
    assert!(messages[2].1.contains("schedule for April is ready"));
    assert!(!messages[2].1.contains("```"));

    assert_eq!(h.starts(), 1);
    assert_eq!(h.stops(), 1);
    assert!(!h.running());
}

#[tokio::test]
async fn generation_failure_reports_to_admin_only() {
    let mut setup = Setup::at(at(2026, 3, 30, 10, 30));
    setup.result = GenerationResult {
        exit_code: 1,
        output: "Traceback: sheet not found".to_string(),
    };
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();
    assert_eq!(action, CycleAction::Generated { exit_code: 1 });

    let admin = h.to(Audience::Admin);
    assert_eq!(admin.len(), 1);
    assert!(admin[0].contains("FAILED"));
    assert!(admin[0].contains("sheet not found"));

    let team = h.to(Audience::Team);
    assert_eq!(team.len(), 1, "only the final notice reaches the team");
    assert!(team[0].contains("Last chance"));

    assert_eq!(h.stops(), 1);
    assert!(!h.running());
}

#[tokio::test]
async fn failure_report_includes_only_the_output_tail() {
    let mut setup = Setup::at(at(2026, 3, 30, 10, 30));
    setup.result = GenerationResult {
        exit_code: 2,
        output: format!("HEAD{}TAIL", "x".repeat(2000)),
    };
    let mut h = setup.build();
    h.orchestrator.run_daily().await.unwrap();

    let admin = h.to(Audience::Admin);
    assert!(admin[0].contains("TAIL"));
    assert!(!admin[0].contains("HEAD"));
}

#[tokio::test]
async fn success_report_includes_only_the_last_800_characters() {
    let mut setup = Setup::at(at(2026, 3, 30, 10, 30));
    setup.result = GenerationResult {
        exit_code: 0,
        output: format!("HEAD{}TAIL", "y".repeat(796)),
    };
    let mut h = setup.build();
    h.orchestrator.run_daily().await.unwrap();

    let admin = h.to(Audience::Admin);
    assert_eq!(admin.len(), 1);
    assert!(admin[0].contains("Generated Successfully"));
    assert!(admin[0].contains("TAIL"));
    assert!(!admin[0].contains("HEAD"), "first characters past the cap are dropped");

    let fenced = admin[0].split("```").nth(1).unwrap();
    assert_eq!(fenced.chars().count(), 800);
    assert!(!h.to(Audience::Team).iter().any(|t| t.contains("TAIL")));
}

#[tokio::test]
async fn generation_after_deadline_runs_immediately() {
    let mut h = Setup::at(at(2026, 3, 30, 18, 15)).build();
    h.orchestrator.run_daily().await.unwrap();

    assert_eq!(*h.clock.slept_until.lock().unwrap(), None);
    assert_eq!(*h.ran_at.lock().unwrap(), Some(at(2026, 3, 30, 18, 15)));
}

#[tokio::test]
async fn leap_february_generates_on_the_28th() {
    let mut h = Setup::at(at(2024, 2, 28, 10, 30)).build();
    let action = h.orchestrator.run_daily().await.unwrap();

    assert_eq!(action, CycleAction::Generated { exit_code: 0 });
    assert!(h.to(Audience::Team)[1].contains("March"));
}

#[tokio::test]
async fn panicking_generation_is_contained() {
    let mut setup = Setup::at(at(2026, 3, 30, 10, 30));
    setup.panic = true;
    let mut h = setup.build();

    assert_eq!(h.orchestrator.run_daily_guarded().await, None);
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);

    // The orchestrator is still usable afterwards.
    *h.clock.now.lock().unwrap() = at(2026, 3, 31, 10, 30);
    assert_eq!(
        h.orchestrator.run_daily_guarded().await,
        Some(CycleAction::Idle(CalendarPhase::PostGeneration))
    );
}

// ── Drift ─────────────────────────────────────────────────────

#[tokio::test]
async fn missed_reset_is_realigned_on_next_check() {
    // Window open but the store still holds March: the boundary was missed.
    let mut setup = Setup::at(at(2026, 3, 27, 10, 30));
    setup.store_cycle = Some(month(2026, 3));
    let mut h = setup.build();

    h.orchestrator.run_daily().await.unwrap();
    assert_eq!(h.realigns(), vec![month(2026, 4)]);
    assert_eq!(h.store_cycle(), Some(month(2026, 4)));

    h.orchestrator.run_daily().await.unwrap();
    assert_eq!(h.realigns().len(), 1);
}

#[tokio::test]
async fn store_ahead_of_calendar_is_left_alone() {
    let mut setup = Setup::at(at(2026, 3, 10, 10, 30));
    setup.store_cycle = Some(month(2026, 4));
    let mut h = setup.build();

    h.orchestrator.run_daily().await.unwrap();
    assert!(h.realigns().is_empty());
    assert_eq!(h.store_cycle(), Some(month(2026, 4)));
}

#[tokio::test]
async fn unreadable_store_does_not_block_reminders() {
    let mut setup = Setup::at(at(2026, 3, 27, 10, 30));
    setup.store_cycle = None;
    let mut h = setup.build();

    let action = h.orchestrator.run_daily().await.unwrap();
    assert_eq!(action, CycleAction::Reminded { days_left: 4 });
    assert_eq!(h.to(Audience::Team).len(), 1);
}

// ── Startup reconciliation ────────────────────────────────────

#[tokio::test]
async fn startup_inside_window_starts_service_silently() {
    let mut h = Setup::at(at(2026, 3, 28, 8, 0)).build();
    let action = h.orchestrator.reconcile_startup();

    assert_eq!(
        action,
        CycleAction::ServiceStarted(CalendarPhase::ReminderWindow(3))
    );
    assert_eq!(h.starts(), 1);
    assert!(h.messages().is_empty());
}

#[tokio::test]
async fn startup_on_generation_day_starts_service_without_generating() {
    let mut h = Setup::at(at(2026, 3, 30, 20, 0)).build();
    let action = h.orchestrator.reconcile_startup();

    assert_eq!(action, CycleAction::ServiceStarted(CalendarPhase::GenerationDay));
    assert_eq!(h.starts(), 1);
    assert_eq!(h.runs.load(Ordering::SeqCst), 0);
    assert!(h.messages().is_empty());
}

#[tokio::test]
async fn startup_on_boundary_does_not_reset() {
    let mut setup = Setup::at(at(2026, 3, 25, 8, 0));
    setup.store_cycle = Some(month(2026, 3));
    let mut h = setup.build();

    let action = h.orchestrator.reconcile_startup();
    assert_eq!(action, CycleAction::Idle(CalendarPhase::ResetBoundary));
    assert_eq!(h.advances(), 0);
    assert!(h.realigns().is_empty());
    assert_eq!(h.starts(), 0);
}

#[tokio::test]
async fn startup_outside_window_leaves_service_off() {
    for when in [at(2026, 3, 10, 8, 0), at(2026, 3, 31, 8, 0)] {
        let mut h = Setup::at(when).build();
        h.orchestrator.reconcile_startup();
        assert_eq!(h.starts(), 0);
        assert!(h.messages().is_empty());
    }
}

#[tokio::test]
async fn shutdown_stops_the_service() {
    let mut h = Setup::at(at(2026, 3, 28, 10, 30)).build();
    h.orchestrator.run_daily().await.unwrap();
    assert!(h.running());

    h.orchestrator.shutdown();
    assert!(!h.running());
}

// ── A full month ──────────────────────────────────────────────

#[tokio::test]
async fn full_march_cycle() {
    let mut setup = Setup::at(at(2026, 3, 1, 10, 30));
    setup.store_cycle = Some(month(2026, 3));
    let mut h = setup.build();

    for day in 1..=31 {
        *h.clock.now.lock().unwrap() = at(2026, 3, day, 10, 30);
        h.orchestrator.run_daily().await.unwrap();
    }

    assert_eq!(h.advances(), 1);
    assert!(h.realigns().is_empty());
    assert_eq!(h.store_cycle(), Some(month(2026, 4)));
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);
    assert_eq!(h.stops(), 1);
    assert!(!h.running());

    let team = h.to(Audience::Team);
    // three reminders, one final notice, one success announcement
    assert_eq!(team.len(), 5);
    assert_eq!(h.to(Audience::Admin).len(), 1);

    // generation day is the only day the generation time is reached
    assert_eq!(
        h.ran_at.lock().unwrap().map(|t| t.time()),
        NaiveTime::from_hms_opt(17, 0, 0)
    );
}
