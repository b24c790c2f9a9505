//! Cycle rollover: advance the collected month and wipe restrictions.

use chrono::Utc;
use oncall_core::CycleMonth;
use tracing::info;

use crate::error::Result;
use crate::file::ConstraintFile;

/// The slice of the constraint store the lifecycle orchestrator touches.
pub trait CycleStore: Send + Sync {
    /// Month the store is currently collecting for.
    fn current_cycle(&self) -> Result<CycleMonth>;

    /// Move to the following month (12 wraps to 1 with year + 1) and clear
    /// every developer's restrictions in the same atomic write.
    fn advance_cycle_and_clear_restrictions(&self) -> Result<CycleMonth>;

    /// Jump straight to `target` and clear every developer's restrictions.
    /// Used when a reset boundary was missed.
    fn realign_cycle(&self, target: CycleMonth) -> Result<CycleMonth>;
}

impl CycleStore for ConstraintFile {
    fn current_cycle(&self) -> Result<CycleMonth> {
        self.read()?.cycle()
    }

    fn advance_cycle_and_clear_restrictions(&self) -> Result<CycleMonth> {
        let mut snapshot = self.read()?;
        let next = snapshot.cycle()?.next();
        let cleared = snapshot.restriction_count();
        let now = Utc::now();
        snapshot.start_cycle(next, now);
        self.write(&mut snapshot, now)?;
        info!(cycle = %next, cleared, "constraints reset, ready to collect");
        Ok(next)
    }

    fn realign_cycle(&self, target: CycleMonth) -> Result<CycleMonth> {
        let mut snapshot = self.read()?;
        let previous = snapshot.cycle()?;
        let cleared = snapshot.restriction_count();
        let now = Utc::now();
        snapshot.start_cycle(target, now);
        self.write(&mut snapshot, now)?;
        info!(from = %previous, to = %target, cleared, "constraints realigned to current cycle");
        Ok(target)
    }
}
