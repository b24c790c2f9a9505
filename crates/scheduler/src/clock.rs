//! Wall-clock access for the orchestrator.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// The time zone calendar decisions are made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The process's local zone (`TZ`).
    #[default]
    Host,
    Named(Tz),
}

impl Zone {
    pub fn from_config(tz: Option<Tz>) -> Self {
        tz.map_or(Zone::Host, Zone::Named)
    }

    /// Wall-clock time in this zone at `instant`.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Zone::Host => instant.with_timezone(&Local).naive_local(),
            Zone::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Host => f.write_str("host"),
            Zone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// Source of "now" and of waiting until a wall-clock time.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current date and time in the scheduling zone.
    fn now(&self) -> NaiveDateTime;

    /// Wait until `deadline` (scheduling zone). Returns immediately if it has passed.
    async fn sleep_until(&self, deadline: NaiveDateTime);
}

/// The host clock, read in a configured [`Zone`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    zone: Zone,
}

impl SystemClock {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }
}

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        self.zone.local(Utc::now())
    }

    async fn sleep_until(&self, deadline: NaiveDateTime) {
        if let Ok(remaining) = (deadline - self.now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }
}
