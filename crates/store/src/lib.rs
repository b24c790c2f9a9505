//! Constraint store shared between the scheduler and the collection web tier.
//!
//! The store is a single JSON file holding the month being collected for and
//! every developer's restriction list. All writers go through
//! [`ConstraintFile`], which replaces the file atomically (write to a
//! temporary sibling, then rename) so readers never see a partial snapshot.

pub mod error;
pub mod file;
pub mod reset;
pub mod snapshot;

pub use error::StoreError;
pub use file::ConstraintFile;
pub use reset::CycleStore;
pub use snapshot::{ConstraintSnapshot, Developer, DeveloperSummary};
