//! File-backed constraint store with atomic replace-on-write.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use oncall_core::CycleMonth;
use tracing::{debug, info};

use crate::error::Result;
use crate::snapshot::{ConstraintSnapshot, DeveloperSummary};

/// Handle to the shared constraints JSON file.
///
/// Every mutation is read-modify-write: the snapshot is loaded, changed in
/// memory, and only then persisted through [`ConstraintFile::write`]. A failed
/// read, validation, or write therefore leaves the previous file untouched.
#[derive(Debug, Clone)]
pub struct ConstraintFile {
    path: PathBuf,
}

impl ConstraintFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "constraints.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Create the file for the month after `now` if it does not exist yet.
    ///
    /// Returns `true` when a new file was written.
    pub fn initialize<'a>(
        &self,
        roster: impl IntoIterator<Item = (&'a str, &'a str)>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let cycle = CycleMonth::of(now.date_naive()).next();
        let mut snapshot = ConstraintSnapshot::new(cycle, roster, now);
        self.write(&mut snapshot, now)?;
        info!(path = %self.path.display(), cycle = %cycle, "created default constraints file");
        Ok(true)
    }

    /// Load and parse the current snapshot.
    pub fn read(&self) -> Result<ConstraintSnapshot> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Stamp `last_updated` and atomically replace the file.
    ///
    /// Writes to `<file>.tmp` first, then renames over the final path so a
    /// concurrent reader sees either the old or the new snapshot.
    pub fn write(&self, snapshot: &mut ConstraintSnapshot, now: DateTime<Utc>) -> Result<()> {
        snapshot.last_updated = Some(now);
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "wrote constraints file");
        Ok(())
    }

    /// Read, apply `edit`, and write back. Nothing is written if `edit` fails.
    pub fn update<T>(
        &self,
        edit: impl FnOnce(&mut ConstraintSnapshot) -> Result<T>,
    ) -> Result<(ConstraintSnapshot, T)> {
        let mut snapshot = self.read()?;
        let value = edit(&mut snapshot)?;
        self.write(&mut snapshot, Utc::now())?;
        Ok((snapshot, value))
    }

    pub fn add_restriction(&self, developer: &str, restriction: &str) -> Result<Vec<String>> {
        let (snapshot, ()) = self.update(|s| s.add_restriction(developer, restriction))?;
        Ok(snapshot.developer(developer)?.restrictions.clone())
    }

    pub fn remove_restriction(&self, developer: &str, index: usize) -> Result<Vec<String>> {
        let (snapshot, _removed) = self.update(|s| s.remove_restriction(developer, index))?;
        Ok(snapshot.developer(developer)?.restrictions.clone())
    }

    pub fn clear_restrictions(&self, developer: &str) -> Result<()> {
        self.update(|s| s.clear_restrictions(developer))?;
        Ok(())
    }

    /// Manually set the collected month and/or year.
    pub fn set_cycle(&self, month: Option<u32>, year: Option<i32>) -> Result<CycleMonth> {
        let (snapshot, ()) = self.update(|s| s.set_cycle(month, year))?;
        snapshot.cycle()
    }

    pub fn developer_summaries(&self) -> Result<Vec<DeveloperSummary>> {
        Ok(self.read()?.summaries())
    }
}
