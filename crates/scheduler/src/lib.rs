//! Monthly on-call constraint cycle.
//!
//! A long-running daemon that, once a day, works out where the calendar sits
//! in the monthly cycle and acts on it:
//! - resets the constraint store the day before the window opens
//! - runs the collection service and reminds the team while it is open
//! - generates the schedule on the second-to-last day and reports the result

pub mod clock;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod phase;
pub mod process;
pub mod service;
pub mod trigger;

pub use clock::{Clock, SystemClock, Zone};
pub use error::LifecycleError;
pub use generation::{GenerationInvoker, GenerationResult, ProcessGenerationInvoker};
pub use orchestrator::{CycleAction, Orchestrator};
pub use phase::{days_left, expected_cycle, resolve_phase, CalendarPhase};
pub use service::{CollectionService, ProcessCollectionService};
pub use trigger::{run_daemon, DailyTrigger};
