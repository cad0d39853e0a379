// # -----------------------------
// # crates/common/src/lib.rs
// # -----------------------------
//! Shared building blocks for the daily prompt workspace.
//!
//! - [`language`] and [`entry`] hold the journal data model.
//! - [`backend`] defines the seams to the generation and delivery services.
//! - [`fs`] provides the append-only writer and the run lock used for the
//!   history log.

pub mod backend;
pub mod entry;
pub mod fs;
pub mod language;

pub use backend::{
    excerpt, BackendError, Contact, GenerationPrompt, Mailer, OutgoingMessage, TextGenerator,
};
pub use entry::{HistoryEntry, QuestionSet, QuestionSetError};
pub use language::Language;
