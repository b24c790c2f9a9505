//! Calendar phase resolution.
//!
//! Everything the orchestrator does on a given day is decided by how many
//! days are left in the month relative to the reminder window length `R`:
//!
//! ```text
//! days left:  ... R+2 | R+1   | R .. 2          | 1          | 0
//! phase:      Outside | Reset | ReminderWindow* | Generation | PostGeneration
//! ```
//!
//! `*` The day with exactly `R` days left is still `Outside`; reminders start
//! at `R - 1`.

use chrono::{Datelike, NaiveDate};
use oncall_core::CycleMonth;

/// Where a calendar day falls in the monthly cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPhase {
    /// Nothing to do.
    Outside,
    /// The day before the window opens: roll the store over.
    ResetBoundary,
    /// Collection open; carries the days left in the month.
    ReminderWindow(u32),
    /// Second-to-last day: final notice, then generation.
    GenerationDay,
    /// Last day of the month; generation already ran.
    PostGeneration,
}

/// Days remaining in `date`'s month: 0 on the last day.
pub fn days_left(date: NaiveDate) -> u32 {
    CycleMonth::of(date).days() - date.day()
}

/// Resolve the phase for `date` given a reminder window of `reminder_days`.
pub fn resolve_phase(date: NaiveDate, reminder_days: u32) -> CalendarPhase {
    phase_for_days_left(days_left(date), reminder_days)
}

/// Phase table keyed on days left. Rules are checked in order.
pub fn phase_for_days_left(days_left: u32, reminder_days: u32) -> CalendarPhase {
    if days_left == reminder_days.saturating_add(1) {
        CalendarPhase::ResetBoundary
    } else if days_left >= reminder_days {
        CalendarPhase::Outside
    } else if days_left == 1 {
        CalendarPhase::GenerationDay
    } else if days_left == 0 {
        CalendarPhase::PostGeneration
    } else {
        CalendarPhase::ReminderWindow(days_left)
    }
}

/// The month the constraint store should be collecting for on `date`.
///
/// Before the reset boundary that is the current month (its schedule was
/// generated last month); from the boundary onward it is the next month.
pub fn expected_cycle(date: NaiveDate, reminder_days: u32) -> CycleMonth {
    let current = CycleMonth::of(date);
    if days_left(date) <= reminder_days.saturating_add(1) {
        current.next()
    } else {
        current
    }
}
