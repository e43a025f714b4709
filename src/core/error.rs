use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuestlineError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),

    // Ledger business rules
    #[error("Invalid amount: {0} (must be > 0)")]
    InvalidAmount(i64),
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: i64, need: i64 },

    // Progression business rules
    #[error("No levels configured")]
    NoLevelsConfigured,
    #[error("Invalid experience amount: {0} (must be > 0)")]
    InvalidExperienceAmount(i64),

    // Task claim business rules
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("Task not completed: {task_key} has {progress}/{threshold}")]
    TaskNotCompleted {
        task_key: String,
        progress: i64,
        threshold: i64,
    },
    #[error("Already claimed: {task_key} for period {period_key}")]
    AlreadyClaimed {
        task_key: String,
        period_key: String,
    },

    /// The backing store could not serialize a concurrent mutation.
    /// The one error a caller is expected to retry (bounded, with backoff).
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

impl QuestlineError {
    /// Whether the caller should retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuestlineError::ConcurrencyConflict(_))
    }
}
