use oncall_core::ConfigError;
use oncall_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the lifecycle orchestrator and its collaborators.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("constraint store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("invalid cron expression '{expression}': {reason}")]
    Cron { expression: String, reason: String },

    #[error("signal handling error: {0}")]
    Signal(std::io::Error),
}
