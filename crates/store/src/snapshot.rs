//! In-memory model of the constraints file.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use oncall_core::CycleMonth;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// One developer's submitted unavailability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub email: String,
    /// Free-form entries such as `"12/02 Day"`, in submission order.
    #[serde(default)]
    pub restrictions: Vec<String>,
}

/// Full contents of the constraints file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSnapshot {
    /// Month being collected for (1-12).
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Developer name → constraints. Insertion order is preserved on disk.
    #[serde(default)]
    pub developers: IndexMap<String, Developer>,
}

/// Per-developer overview for listing screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeveloperSummary {
    pub name: String,
    pub email: String,
    pub restriction_count: usize,
}

impl ConstraintSnapshot {
    /// An empty snapshot collecting for `cycle` with the given roster.
    pub fn new<'a>(
        cycle: CycleMonth,
        roster: impl IntoIterator<Item = (&'a str, &'a str)>,
        now: DateTime<Utc>,
    ) -> Self {
        let developers = roster
            .into_iter()
            .map(|(name, email)| {
                (
                    name.to_string(),
                    Developer {
                        email: email.to_string(),
                        restrictions: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            month: cycle.month,
            year: cycle.year,
            last_updated: Some(now),
            developers,
        }
    }

    /// The recorded cycle, validating the stored month number.
    pub fn cycle(&self) -> Result<CycleMonth> {
        CycleMonth::new(self.year, self.month).ok_or(StoreError::InvalidMonth(self.month))
    }

    /// Move to `cycle` and empty every developer's restriction list.
    pub fn start_cycle(&mut self, cycle: CycleMonth, now: DateTime<Utc>) {
        for developer in self.developers.values_mut() {
            developer.restrictions.clear();
        }
        self.month = cycle.month;
        self.year = cycle.year;
        self.last_updated = Some(now);
    }

    /// Total restrictions across all developers.
    pub fn restriction_count(&self) -> usize {
        self.developers.values().map(|d| d.restrictions.len()).sum()
    }

    pub fn developer(&self, name: &str) -> Result<&Developer> {
        self.developers
            .get(name)
            .ok_or_else(|| StoreError::DeveloperNotFound(name.to_string()))
    }

    fn developer_mut(&mut self, name: &str) -> Result<&mut Developer> {
        self.developers
            .get_mut(name)
            .ok_or_else(|| StoreError::DeveloperNotFound(name.to_string()))
    }

    /// Append a restriction. Duplicates are rejected.
    pub fn add_restriction(&mut self, name: &str, restriction: &str) -> Result<()> {
        let restriction = restriction.trim();
        if restriction.is_empty() {
            return Err(StoreError::EmptyRestriction);
        }
        let developer = self.developer_mut(name)?;
        if developer.restrictions.iter().any(|r| r == restriction) {
            return Err(StoreError::DuplicateRestriction {
                developer: name.to_string(),
                restriction: restriction.to_string(),
            });
        }
        developer.restrictions.push(restriction.to_string());
        Ok(())
    }

    /// Remove the restriction at `index`, returning it.
    pub fn remove_restriction(&mut self, name: &str, index: usize) -> Result<String> {
        let developer = self.developer_mut(name)?;
        if index >= developer.restrictions.len() {
            return Err(StoreError::InvalidIndex {
                developer: name.to_string(),
                index,
            });
        }
        Ok(developer.restrictions.remove(index))
    }

    pub fn clear_restrictions(&mut self, name: &str) -> Result<()> {
        self.developer_mut(name)?.restrictions.clear();
        Ok(())
    }

    /// Overwrite month and/or year. The month is validated before anything changes.
    pub fn set_cycle(&mut self, month: Option<u32>, year: Option<i32>) -> Result<()> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(StoreError::InvalidMonth(m));
            }
        }
        if let Some(m) = month {
            self.month = m;
        }
        if let Some(y) = year {
            self.year = y;
        }
        Ok(())
    }

    pub fn summaries(&self) -> Vec<DeveloperSummary> {
        self.developers
            .iter()
            .map(|(name, dev)| DeveloperSummary {
                name: name.clone(),
                email: dev.email.clone(),
                restriction_count: dev.restrictions.len(),
            })
            .collect()
    }
}
