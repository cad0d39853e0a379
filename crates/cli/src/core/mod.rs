//! # Daily Prompt Core
//!
//! One invocation produces at most one journal entry:
//!
//! - **History**: load the JSON Lines log and take its most recent entries
//! - **Generation**: ask the model for the next question in five languages
//!   and validate the answer strictly
//! - **Persistence**: append the entry to the log under an exclusive lock
//! - **Delivery**: email the rendered entry
//!
//! The entry is committed before delivery is attempted. A delivery failure
//! after the commit is reported as [`RunOutcome::CommittedDeliveryFailed`]
//! and never rolls the log back.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use chrono_tz::Tz;
use daily_prompt_common::fs::RunLock;
use daily_prompt_common::{
    excerpt, BackendError, Contact, GenerationPrompt, HistoryEntry, Mailer, OutgoingMessage,
    QuestionSet, TextGenerator,
};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod config;
pub mod errors;
pub mod history;
pub mod prompt;
pub mod render;
pub mod response;

pub use config::AppConfig;
pub use errors::{DailyPromptError, DailyPromptResult, ErrorCategory};
pub use history::{HistoryLog, LoadReport, SkippedLine};

use response::OutputError;

/// Pause between generation attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Settings for a single run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub history_path: PathBuf,
    pub tail_len: usize,
    pub timezone: Tz,
    pub generation_attempts: u32,
    pub retry_delay: Duration,
    pub subject_prefix: String,
    /// Generate and render only: nothing is appended or sent.
    pub dry_run: bool,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Self {
        Self {
            history_path: config.history_path.clone(),
            tail_len: config.history_tail,
            timezone: config.timezone,
            generation_attempts: config.generation.attempts,
            retry_delay: DEFAULT_RETRY_DELAY,
            subject_prefix: config.delivery.subject_prefix.clone(),
            dry_run,
        }
    }
}

/// Mailer plus the parties of every message.
pub struct Delivery {
    pub mailer: Box<dyn Mailer>,
    pub sender: Contact,
    pub recipient: Contact,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Entry appended and emailed.
    Delivered { entry: HistoryEntry, subject: String },
    /// Entry appended, but the email could not be sent.
    CommittedDeliveryFailed {
        entry: HistoryEntry,
        error: DailyPromptError,
    },
    /// The log already holds an entry for today; nothing was done.
    AlreadyGenerated { date: NaiveDate },
    DryRun {
        entry: HistoryEntry,
        subject: String,
        body: String,
    },
}

enum GenerationFailure {
    Service(BackendError),
    Malformed { error: OutputError, raw: String },
}

/// Drives one daily run against a history file and two services.
pub struct DailyRunner {
    settings: RunSettings,
    generator: Box<dyn TextGenerator>,
    delivery: Option<Delivery>,
}

impl DailyRunner {
    pub fn new(
        settings: RunSettings,
        generator: Box<dyn TextGenerator>,
        delivery: Option<Delivery>,
    ) -> Self {
        Self {
            settings,
            generator,
            delivery,
        }
    }

    /// Runs once for the calendar day of `now` in the target time zone.
    pub async fn run(&self, now: DateTime<Utc>) -> DailyPromptResult<RunOutcome> {
        let span = info_span!("run", run_id = %Uuid::new_v4(), dry_run = self.settings.dry_run);
        self.run_inner(now).instrument(span).await
    }

    async fn run_inner(&self, now: DateTime<Utc>) -> DailyPromptResult<RunOutcome> {
        let settings = &self.settings;
        let delivery = match (&self.delivery, settings.dry_run) {
            (Some(delivery), _) => Some(delivery),
            (None, true) => None,
            (None, false) => {
                return Err(DailyPromptError::config(
                    "BREVO_API_KEY",
                    "delivery is not configured",
                ))
            }
        };

        let today = render::local_date(now, settings.timezone);
        let path = &settings.history_path;

        let _lock = if settings.dry_run {
            None
        } else {
            Some(RunLock::acquire(path)?)
        };

        let (mut log, report) = if settings.dry_run {
            HistoryLog::read(path, settings.timezone)?
        } else {
            HistoryLog::load(path, settings.timezone)?
        };
        if report.created {
            info!(path = %path.display(), "created empty history log");
        }
        if !report.is_clean() {
            warn!(
                path = %path.display(),
                skipped = report.skipped.len(),
                "history log contains malformed lines"
            );
        }

        if !settings.dry_run && log.has_entry_for(today) {
            info!(date = %today, "already generated");
            return Ok(RunOutcome::AlreadyGenerated { date: today });
        }

        let tail = log.tail(settings.tail_len);
        info!(
            date = %today,
            entries = log.len(),
            tail_len = tail.len(),
            "requesting next entry"
        );
        let request = prompt::build_request(tail, today);
        let questions = self.generate(&request).await?;

        let entry = HistoryEntry::new(today, now.trunc_subsecs(0), questions);
        let subject = render::subject(&settings.subject_prefix, today);
        let body = render::body(&entry);

        let Some(delivery) = delivery else {
            info!(date = %today, "dry run; nothing appended or sent");
            return Ok(RunOutcome::DryRun {
                entry,
                subject,
                body,
            });
        };

        if log.reload_if_changed()? && log.has_entry_for(today) {
            info!(date = %today, "already generated by a concurrent run");
            return Ok(RunOutcome::AlreadyGenerated { date: today });
        }

        let receipt = log.append(entry.clone())?;
        info!(
            path = %path.display(),
            offset = receipt.offset,
            bytes = receipt.bytes_written,
            "entry committed"
        );

        let message = OutgoingMessage {
            sender: delivery.sender.clone(),
            recipient: delivery.recipient.clone(),
            subject: subject.clone(),
            text_body: body,
        };
        match delivery.mailer.send(&message).await {
            Ok(()) => {
                info!(mailer = delivery.mailer.name(), subject = %subject, "entry delivered");
                Ok(RunOutcome::Delivered { entry, subject })
            }
            Err(source) => {
                let service = source.service();
                let error = DailyPromptError::DeliveryService { source };
                error!(service, error = %error, "delivery failed; entry remains committed");
                Ok(RunOutcome::CommittedDeliveryFailed { entry, error })
            }
        }
    }

    async fn generate(&self, request: &GenerationPrompt) -> DailyPromptResult<QuestionSet> {
        let attempts = self.settings.generation_attempts.max(1);
        let mut last_failure = None;

        for attempt in 1..=attempts {
            debug!(attempt, generator = self.generator.name(), "calling generation service");
            let failure = match self.generator.generate(request).await {
                Ok(raw) => match response::parse_questions(&raw) {
                    Ok(questions) => return Ok(questions),
                    Err(error) => {
                        warn!(attempt, error = %error, "generation output rejected");
                        GenerationFailure::Malformed { error, raw }
                    }
                },
                Err(source) => {
                    warn!(
                        attempt,
                        service = source.service(),
                        error = %source,
                        "generation request failed"
                    );
                    GenerationFailure::Service(source)
                }
            };
            last_failure = Some(failure);

            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        Err(match last_failure {
            Some(GenerationFailure::Service(source)) => {
                DailyPromptError::GenerationService { attempts, source }
            }
            Some(GenerationFailure::Malformed { error, raw }) => DailyPromptError::MalformedOutput {
                attempts,
                reason: error.to_string(),
                excerpt: excerpt(&raw),
            },
            None => DailyPromptError::internal("generation", "no attempt was made"),
        })
    }
}
