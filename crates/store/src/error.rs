use thiserror::Error;

/// Errors raised while reading, validating, or writing the constraint store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid month {0} (expected 1-12)")]
    InvalidMonth(u32),

    #[error("developer not found: {0}")]
    DeveloperNotFound(String),

    #[error("restriction already exists for {developer}: {restriction}")]
    DuplicateRestriction {
        developer: String,
        restriction: String,
    },

    #[error("invalid restriction index {index} for {developer}")]
    InvalidIndex { developer: String, index: usize },

    #[error("restriction must not be empty")]
    EmptyRestriction,
}

pub type Result<T> = std::result::Result<T, StoreError>;
