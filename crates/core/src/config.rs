use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

/// Full scheduler configuration, loaded once per process lifetime.
///
/// Parsed from `scheduler.toml`; every field has a default so a partial
/// (or missing) file still yields a usable config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cycle: CycleConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,

    /// The externally-facing constraint collection web service.
    #[serde(default = "default_collection_service")]
    pub collection_service: ProcessConfig,

    /// The schedule generation program.
    #[serde(default = "default_generation")]
    pub generation: ProcessConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cycle: CycleConfig::default(),
            trigger: TriggerConfig::default(),
            collection_service: default_collection_service(),
            generation: default_generation(),
            store: StoreConfig::default(),
        }
    }
}

// ── Cycle ─────────────────────────────────────────────────────

/// Monthly cycle parameters and notification endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Length of the reminder window before month end, in days.
    #[serde(default = "default_reminder_days")]
    pub reminder_days: u32,

    /// Public URL of the collection form, included in reminders.
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Team broadcast webhook. `None` degrades team messages to log-only.
    #[serde(default, alias = "slack_webhook_team")]
    pub team_webhook: Option<String>,

    /// Admin direct-message webhook. `None` degrades admin messages to log-only.
    #[serde(default, alias = "slack_webhook_admin")]
    pub admin_webhook: Option<String>,
}

fn default_reminder_days() -> u32 {
    5
}

fn default_app_url() -> String {
    "http://localhost:3000".into()
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            reminder_days: default_reminder_days(),
            app_url: default_app_url(),
            team_webhook: None,
            admin_webhook: None,
        }
    }
}

// ── Trigger ───────────────────────────────────────────────────

/// Longest reminder window: a month never has more days left than this.
pub const MAX_REMINDER_DAYS: u32 = 31;

/// When the daily check fires and when generation runs, in the trigger's
/// time zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// 5-field cron expression for the daily check.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Local wall-clock deadline (`HH:MM`) for schedule generation.
    #[serde(default = "default_generation_at")]
    pub generation_at: String,

    /// IANA zone name (e.g. `Asia/Jerusalem`); the host zone when unset.
    #[serde(default)]
    pub timezone: Option<String>,
}

fn default_cron() -> String {
    "30 10 * * *".into()
}

fn default_generation_at() -> String {
    "17:00".into()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            generation_at: default_generation_at(),
            timezone: None,
        }
    }
}

impl TriggerConfig {
    /// Parse `timezone`. `None` means the host's local zone.
    pub fn time_zone(&self) -> Result<Option<Tz>, ConfigError> {
        let Some(name) = self.timezone.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        name.parse::<Tz>().map(Some).map_err(|e| {
            ConfigError::Invalid(format!("trigger.timezone '{name}' is not a known zone: {e}"))
        })
    }

    /// Parse `generation_at` into a wall-clock time.
    pub fn generation_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.generation_at.trim(), "%H:%M").map_err(|e| {
            ConfigError::Invalid(format!(
                "trigger.generation_at '{}' is not HH:MM: {e}",
                self.generation_at
            ))
        })
    }
}

// ── Processes ─────────────────────────────────────────────────

/// An external program the scheduler spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; inherits the scheduler's when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables passed to the process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_collection_service() -> ProcessConfig {
    ProcessConfig {
        program: "node".into(),
        args: vec!["server.js".into()],
        working_dir: Some(PathBuf::from("constraints-app")),
        env: HashMap::new(),
    }
}

fn default_generation() -> ProcessConfig {
    ProcessConfig {
        program: "python3".into(),
        args: vec!["on_call_scheduler_with_sheets.py".into()],
        working_dir: None,
        env: HashMap::new(),
    }
}

impl ProcessConfig {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            env: HashMap::new(),
        }
    }

    /// Command line for log output.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the shared constraints JSON file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/constraints.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ── Loading & Validation ──────────────────────────────────────

impl Config {
    /// Parse config from a TOML string, apply env overrides, and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load config from `path`, falling back to defaults when the file is missing.
    ///
    /// A missing file is not an error: notifications simply degrade to
    /// log-only. A present but malformed file is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::from_file(path)?;
            tracing::info!(path = %path.display(), "loaded scheduler config");
            return Ok(config);
        }

        tracing::warn!(
            path = %path.display(),
            "config file not found, using defaults (notifications disabled unless set via env)"
        );
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Convention: `ONCALL_SECTION_KEY` overrides `section.key`.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(env_opt);
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ONCALL_CYCLE_REMINDER_DAYS") {
            match v.parse::<u32>() {
                Ok(days) => self.cycle.reminder_days = days,
                Err(_) => tracing::warn!(value = %v, "ignoring non-numeric ONCALL_CYCLE_REMINDER_DAYS"),
            }
        }
        if let Some(v) = lookup("ONCALL_CYCLE_APP_URL") {
            self.cycle.app_url = v;
        }
        if let Some(v) = lookup("ONCALL_CYCLE_TEAM_WEBHOOK") {
            self.cycle.team_webhook = Some(v);
        }
        if let Some(v) = lookup("ONCALL_CYCLE_ADMIN_WEBHOOK") {
            self.cycle.admin_webhook = Some(v);
        }
        if let Some(v) = lookup("ONCALL_TRIGGER_CRON") {
            self.trigger.cron = v;
        }
        if let Some(v) = lookup("ONCALL_TRIGGER_GENERATION_AT") {
            self.trigger.generation_at = v;
        }
        if let Some(v) = lookup("ONCALL_TRIGGER_TIMEZONE") {
            self.trigger.timezone = Some(v);
        }
        if let Some(v) = lookup("ONCALL_STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
    }

    /// Validate value ranges. The cron expression is checked when the
    /// trigger is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle.reminder_days == 0 {
            return Err(ConfigError::Invalid(
                "cycle.reminder_days must be at least 1".into(),
            ));
        }
        if self.cycle.reminder_days > MAX_REMINDER_DAYS {
            return Err(ConfigError::Invalid(format!(
                "cycle.reminder_days must be at most {MAX_REMINDER_DAYS}, got {}",
                self.cycle.reminder_days
            )));
        }
        if self.cycle.reminder_days < 2 {
            tracing::warn!(
                reminder_days = self.cycle.reminder_days,
                "reminder window shorter than 2 days: no reminder or generation day is reachable"
            );
        }
        self.trigger.generation_time()?;
        self.trigger.time_zone()?;
        for (name, process) in [
            ("collection_service", &self.collection_service),
            ("generation", &self.generation),
        ] {
            if process.program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name}.program must not be empty")));
            }
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let presence = |w: &Option<String>| if w.is_some() { "set" } else { "missing" };
        tracing::info!("Config loaded:");
        tracing::info!("  team webhook:   {}", presence(&self.cycle.team_webhook));
        tracing::info!("  admin webhook:  {}", presence(&self.cycle.admin_webhook));
        tracing::info!("  app url:        {}", self.cycle.app_url);
        tracing::info!("  reminder window: last {} days of month", self.cycle.reminder_days);
        tracing::info!(
            "  daily check:    '{}' ({})",
            self.trigger.cron,
            self.trigger.timezone.as_deref().unwrap_or("host time zone")
        );
        tracing::info!("  generation at:  {}", self.trigger.generation_at);
        tracing::info!("  collection svc: {}", self.collection_service.display());
        tracing::info!("  generation:     {}", self.generation.display());
        tracing::info!("  store:          {}", self.store.path.display());
    }
}
