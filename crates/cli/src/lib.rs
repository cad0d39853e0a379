//! # Daily Prompt CLI Library
//!
//! Run logic behind the `daily-prompt` binary.

pub mod core;

pub use core::{
    AppConfig, DailyPromptError, DailyPromptResult, DailyRunner, Delivery, ErrorCategory,
    HistoryLog, LoadReport, RunOutcome, RunSettings,
};
