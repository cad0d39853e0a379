//! # Daily Prompt Error Types
//!
//! Every failure a run can end with. Each variant maps to a stable error
//! code, a category, a process exit code and a list of recovery hints so the
//! operator can tell from the run output alone whether the log and the inbox
//! are in sync.
//!
//! ## Error Categories
//!
//! - **Configuration**: missing or invalid settings, detected before any
//!   network call
//! - **Generation**: the model call failed or returned unusable text; the log
//!   is untouched
//! - **Delivery**: the email could not be sent; reported after the entry is
//!   committed
//! - **Persistence**: the history file could not be read or written
//! - **Concurrency**: another run holds the history lock

use std::path::PathBuf;

use daily_prompt_common::fs::{LockError, SafeWriteError};
use daily_prompt_common::BackendError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCategory {
    Configuration,
    Generation,
    Delivery,
    Persistence,
    Concurrency,
}

/// Result type for all run operations.
pub type DailyPromptResult<T> = Result<T, DailyPromptError>;

#[derive(Debug, Error)]
pub enum DailyPromptError {
    /// E_CONFIG - A setting is missing or cannot be parsed.
    #[error("Invalid configuration for '{key}': {reason}")]
    Configuration {
        /// Environment variable or TOML key at fault
        key: String,
        reason: String,
    },

    /// E_GENERATION - The generation service could not be reached or refused
    /// the request.
    #[error("Generation service failed after {attempts} attempt(s): {source}")]
    GenerationService {
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// E_MALFORMED_OUTPUT - The model answered, but not with five usable
    /// questions.
    #[error("Generation output rejected after {attempts} attempt(s): {reason}")]
    MalformedOutput {
        attempts: u32,
        reason: String,
        /// Shortened raw output for the run log
        excerpt: String,
    },

    /// E_DELIVERY - The email provider failed or rejected the message.
    #[error("Delivery failed: {source}")]
    DeliveryService {
        #[source]
        source: BackendError,
    },

    /// E_PERSISTENCE - Reading or writing the history file failed.
    #[error("I/O error in {operation}: {source}")]
    Persistence {
        operation: String,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// E_RECORD_TOO_LARGE - A serialized entry exceeds the record ceiling.
    #[error("History record of {size} bytes exceeds the {limit} byte limit")]
    RecordTooLarge { size: usize, limit: usize },

    /// E_LOCKED - Another run is in progress for the same history file.
    #[error("History log is locked by another run ({})", path.display())]
    Locked { path: PathBuf },

    /// E_INTERNAL - Should not happen; indicates a bug.
    #[error("Internal error in {component}: {message}")]
    Internal { component: String, message: String },
}

impl DailyPromptError {
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn io<P, S>(path: P, operation: S, source: std::io::Error) -> Self
    where
        P: Into<Option<PathBuf>>,
        S: Into<String>,
    {
        Self::Persistence {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    pub fn internal(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "E_CONFIG",
            Self::GenerationService { .. } => "E_GENERATION",
            Self::MalformedOutput { .. } => "E_MALFORMED_OUTPUT",
            Self::DeliveryService { .. } => "E_DELIVERY",
            Self::Persistence { .. } => "E_PERSISTENCE",
            Self::RecordTooLarge { .. } => "E_RECORD_TOO_LARGE",
            Self::Locked { .. } => "E_LOCKED",
            Self::Internal { .. } => "E_INTERNAL",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::GenerationService { .. } | Self::MalformedOutput { .. } => {
                ErrorCategory::Generation
            }
            Self::DeliveryService { .. } => ErrorCategory::Delivery,
            Self::Persistence { .. } | Self::RecordTooLarge { .. } | Self::Internal { .. } => {
                ErrorCategory::Persistence
            }
            Self::Locked { .. } => ErrorCategory::Concurrency,
        }
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Delivery => 3,
            _ => 1,
        }
    }

    /// Actionable steps, most likely first.
    pub fn recovery_hints(&self) -> Vec<String> {
        match self {
            Self::Configuration { key, .. } => vec![
                format!("Set '{key}' in the environment or in daily-prompt.toml"),
                "Run with --log-level debug to see which configuration file was loaded"
                    .to_string(),
            ],
            Self::GenerationService { source, .. } => {
                let mut hints = vec![
                    "The history log was not modified; re-running is safe".to_string(),
                ];
                if let BackendError::Status { status, .. } = source {
                    match status {
                        401 | 403 => hints.insert(0, "Check OPENAI_API_KEY".to_string()),
                        429 => hints.insert(
                            0,
                            "Rate limited; retry later or raise GENERATION_ATTEMPTS".to_string(),
                        ),
                        404 => {
                            hints.insert(0, "Check OPENAI_MODEL and OPENAI_BASE_URL".to_string())
                        }
                        _ => {}
                    }
                }
                hints
            }
            Self::MalformedOutput { .. } => vec![
                "The history log was not modified; re-running is safe".to_string(),
                "Raise GENERATION_ATTEMPTS to allow bounded retries".to_string(),
            ],
            Self::DeliveryService { .. } => vec![
                "The entry was committed to the history log; do not re-run for today".to_string(),
                "Check BREVO_API_KEY and the sender/recipient addresses".to_string(),
                "Use `daily-prompt show --tail 1` to read the committed entry".to_string(),
            ],
            Self::Persistence { path, .. } => {
                let mut hints = vec![
                    "Check permissions and free space for the history directory".to_string(),
                ];
                if let Some(path) = path {
                    hints.insert(0, format!("Inspect '{}'", path.display()));
                }
                hints
            }
            Self::RecordTooLarge { .. } => vec![
                "The model produced unusually long questions; re-run to generate a new entry"
                    .to_string(),
            ],
            Self::Locked { path } => vec![
                "Wait for the other run to finish".to_string(),
                format!(
                    "If no run is active, the lock is stale and is released when its owner \
                     exits ({})",
                    path.display()
                ),
            ],
            Self::Internal { .. } => {
                vec!["Re-run with --log-level debug and report the output".to_string()]
            }
        }
    }
}

impl From<SafeWriteError> for DailyPromptError {
    fn from(err: SafeWriteError) -> Self {
        match err {
            SafeWriteError::Io {
                operation,
                path,
                source,
            } => Self::io(path, operation, source),
            SafeWriteError::TooLarge { size, limit } => Self::RecordTooLarge { size, limit },
            SafeWriteError::MultiLine => {
                Self::internal("history", "serialized record contains a line break")
            }
        }
    }
}

impl From<LockError> for DailyPromptError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { path } => Self::Locked { path },
            LockError::Io { path, source } => Self::io(path, "acquire run lock", source),
        }
    }
}
