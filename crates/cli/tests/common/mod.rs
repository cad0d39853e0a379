//! Common helpers for daily-prompt integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use daily_prompt_cli::core::{Delivery, RunSettings};
use daily_prompt_common::{
    BackendError, Contact, GenerationPrompt, HistoryEntry, Mailer, OutgoingMessage, QuestionSet,
    TextGenerator,
};

pub struct Tmp {
    pub dir: tempfile::TempDir,
}

impl Tmp {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn history(&self) -> PathBuf {
        self.path().join("data").join("journal_questions.jsonl")
    }

    pub fn write(&self, rel: &str, data: &str) {
        let p = self.path().join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(p, data).unwrap();
    }

    pub fn read_bytes(&self, path: &Path) -> Vec<u8> {
        fs::read(path).unwrap()
    }
}

/// 05:00 UTC on 13 February 2026, 08:00 in Moscow.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 13, 5, 0, 12).unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 13).unwrap()
}

pub fn settings(history: PathBuf) -> RunSettings {
    RunSettings {
        history_path: history,
        tail_len: 120,
        timezone: chrono_tz::Europe::Moscow,
        generation_attempts: 1,
        retry_delay: Duration::ZERO,
        subject_prefix: "Daily Prompt".to_string(),
        dry_run: false,
    }
}

pub const LABELED_OUTPUT: &str = "sr: Šta danas gradiš?\n\
                                  tr: Bugün ne inşa ediyorsun?\n\
                                  fr: Que construis-tu aujourd'hui ?\n\
                                  ru: Что ты строишь сегодня?\n\
                                  en: What are you building today?";

pub fn entry_for(date: NaiveDate, english: &str) -> HistoryEntry {
    let generated_at = Utc.from_utc_datetime(&date.and_hms_opt(5, 0, 0).unwrap());
    let questions = QuestionSet::from_ordered([
        format!("Pitanje za {date}?"),
        format!("{date} için soru?"),
        format!("Question du {date} ?"),
        format!("Вопрос на {date}?"),
        english.to_string(),
    ])
    .unwrap();
    HistoryEntry::new(date, generated_at, questions)
}

/// Writes `count` consecutive daily entries ending the day before `today()`.
pub fn seed_history(path: &Path, count: usize) -> Vec<HistoryEntry> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let entries: Vec<HistoryEntry> = (0..count)
        .map(|i| {
            let date = today() - chrono::Duration::days((count - i) as i64);
            entry_for(date, &format!("Question {i}?"))
        })
        .collect();
    let mut data = String::new();
    for entry in &entries {
        data.push_str(&serde_json::to_string(entry).unwrap());
        data.push('\n');
    }
    fs::write(path, data).unwrap();
    entries
}

/// Generator that replays scripted answers and records every request.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    answers: Arc<Mutex<VecDeque<Result<String, BackendError>>>>,
    pub requests: Arc<Mutex<Vec<GenerationPrompt>>>,
}

impl ScriptedGenerator {
    pub fn new(answers: Vec<Result<String, BackendError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            requests: Arc::default(),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> GenerationPrompt {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(prompt.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::EmptyOutput { service: "scripted" }))
    }
}

/// Mailer that records messages and optionally fails.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    pub fail_with_status: Option<u16>,
}

impl RecordingMailer {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), BackendError> {
        if let Some(status) = self.fail_with_status {
            return Err(BackendError::status("recording", status, "rejected"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn delivery(mailer: &RecordingMailer) -> Delivery {
    Delivery {
        mailer: Box::new(mailer.clone()),
        sender: Contact {
            name: "Journal".to_string(),
            email: "journal@example.com".to_string(),
        },
        recipient: Contact {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
        },
    }
}
