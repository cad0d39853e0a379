//! # History Log
//!
//! Append-only JSON Lines store of past journal entries.
//!
//! Lines are read in file order. Blank lines are ignored; lines that cannot be
//! turned into a [`HistoryEntry`] are skipped and reported in a
//! [`LoadReport`] so a single damaged record never blocks the daily run.
//! Records written by the earlier five-line format (`date_utc` + `question`)
//! are accepted and converted on load; new records always use the current
//! format.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use daily_prompt_common::fs::{AppendReceipt, SafeFileWriter};
use daily_prompt_common::{HistoryEntry, QuestionSet};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::errors::{DailyPromptError, DailyPromptResult};

/// A line the loader could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the file.
    pub line_number: usize,
    pub reason: String,
}

/// Summary of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Entries converted from the five-line format.
    pub legacy: usize,
    pub skipped: Vec<SkippedLine>,
    /// The file did not exist and was created empty.
    pub created: bool,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Deserialize)]
struct LegacyRecord {
    date_utc: String,
    question: String,
}

/// History entries bound to the file they were read from.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    timezone: Tz,
    entries: Vec<HistoryEntry>,
    /// File length observed by the last load.
    loaded_len: u64,
    writer: SafeFileWriter,
}

impl HistoryLog {
    /// Reads the log at `path`, creating an empty file (and its parent
    /// directories) when it does not exist yet.
    pub fn load(path: impl Into<PathBuf>, timezone: Tz) -> DailyPromptResult<(Self, LoadReport)> {
        let path = path.into();
        let writer = SafeFileWriter::new();
        let created = writer.ensure_file(&path)?;
        if created {
            info!(path = %path.display(), "created empty history log");
        }
        let (log, mut report) = Self::read_with(path, timezone, writer)?;
        report.created = created;
        Ok((log, report))
    }

    /// Reads the log without creating anything. A missing file reads as an
    /// empty log.
    pub fn read(path: impl Into<PathBuf>, timezone: Tz) -> DailyPromptResult<(Self, LoadReport)> {
        Self::read_with(path.into(), timezone, SafeFileWriter::new())
    }

    fn read_with(
        path: PathBuf,
        timezone: Tz,
        writer: SafeFileWriter,
    ) -> DailyPromptResult<(Self, LoadReport)> {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(DailyPromptError::io(path, "read history log", e)),
        };
        let loaded_len = bytes.len() as u64;
        let (entries, report) = parse_log(&path, &bytes, timezone)?;

        debug!(
            path = %path.display(),
            loaded = report.loaded,
            legacy = report.legacy,
            skipped = report.skipped.len(),
            "history loaded"
        );

        Ok((
            Self {
                path,
                timezone,
                entries,
                loaded_len,
                writer,
            },
            report,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// The last `min(k, len)` entries in file order.
    pub fn tail(&self, k: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(k);
        &self.entries[start..]
    }

    /// Whether the most recent entry is for `date`.
    pub fn has_entry_for(&self, date: NaiveDate) -> bool {
        self.last().is_some_and(|entry| entry.date == date)
    }

    /// Dates that occur on more than one entry, with their counts.
    pub fn duplicate_dates(&self) -> Vec<(NaiveDate, usize)> {
        let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.date).or_default() += 1;
        }
        counts.into_iter().filter(|(_, n)| *n > 1).collect()
    }

    /// Re-reads the file when its length differs from the last load.
    /// Returns `true` when the file had changed.
    pub fn reload_if_changed(&mut self) -> DailyPromptResult<bool> {
        let current_len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(DailyPromptError::io(self.path.clone(), "stat history log", e)),
        };
        if current_len == self.loaded_len {
            return Ok(false);
        }

        warn!(
            path = %self.path.display(),
            expected = self.loaded_len,
            found = current_len,
            "history log changed during the run; reloading"
        );
        let bytes = fs::read(&self.path)
            .map_err(|e| DailyPromptError::io(self.path.clone(), "read history log", e))?;
        let (entries, _) = parse_log(&self.path, &bytes, self.timezone)?;
        self.entries = entries;
        self.loaded_len = bytes.len() as u64;
        Ok(true)
    }

    /// Appends `entry` as one line and records it in memory.
    pub fn append(&mut self, entry: HistoryEntry) -> DailyPromptResult<AppendReceipt> {
        let record = serde_json::to_string(&entry)
            .map_err(|e| DailyPromptError::internal("history", e.to_string()))?;
        let receipt = self.writer.append_line(&self.path, &record)?;
        if receipt.repaired_tail {
            warn!(path = %self.path.display(), "previous record lacked a trailing newline");
        }

        self.loaded_len = receipt.offset + receipt.bytes_written as u64;
        self.entries.push(entry);
        Ok(receipt)
    }
}

fn parse_log(
    path: &Path,
    bytes: &[u8],
    timezone: Tz,
) -> DailyPromptResult<(Vec<HistoryEntry>, LoadReport)> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        DailyPromptError::io(
            path.to_path_buf(),
            "decode history log",
            io::Error::new(io::ErrorKind::InvalidData, e),
        )
    })?;

    let mut entries = Vec::new();
    let mut report = LoadReport::default();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_number = index + 1;
        match parse_line(line, timezone) {
            Ok((entry, legacy)) => {
                if legacy {
                    report.legacy += 1;
                }
                entries.push(entry);
            }
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    line = line_number,
                    %reason,
                    "skipping malformed history line"
                );
                report.skipped.push(SkippedLine {
                    line_number,
                    reason,
                });
            }
        }
    }

    report.loaded = entries.len();
    Ok((entries, report))
}

/// Parses one non-blank line. The flag is `true` for the five-line format.
fn parse_line(line: &str, timezone: Tz) -> Result<(HistoryEntry, bool), String> {
    let value: Value = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {e}"))?;
    let Some(object) = value.as_object() else {
        return Err("record is not a JSON object".to_string());
    };

    if object.contains_key("questions") {
        let entry: HistoryEntry =
            serde_json::from_value(value).map_err(|e| format!("invalid record: {e}"))?;
        return Ok((entry, false));
    }

    if object.contains_key("date_utc") {
        let legacy: LegacyRecord =
            serde_json::from_value(value).map_err(|e| format!("invalid legacy record: {e}"))?;
        return convert_legacy(legacy, timezone).map(|entry| (entry, true));
    }

    Err("unrecognised record shape".to_string())
}

fn convert_legacy(record: LegacyRecord, timezone: Tz) -> Result<HistoryEntry, String> {
    let generated_at = DateTime::parse_from_rfc3339(record.date_utc.trim())
        .map_err(|e| format!("invalid date_utc '{}': {e}", record.date_utc))?
        .with_timezone(&Utc);

    let lines: Vec<String> = record
        .question
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    let texts: [String; 5] = lines
        .try_into()
        .map_err(|lines: Vec<String>| format!("expected 5 question lines, found {}", lines.len()))?;
    let questions = QuestionSet::from_ordered(texts).map_err(|e| e.to_string())?;

    let date = generated_at.with_timezone(&timezone).date_naive();
    Ok(HistoryEntry::new(date, generated_at, questions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use daily_prompt_common::Language;
    use tempfile::tempdir;

    const TZ: Tz = chrono_tz::Europe::Moscow;

    fn entry(day: u32, english: &str) -> HistoryEntry {
        let generated_at =
            Utc.with_ymd_and_hms(2026, 2, 1, 5, 0, 0).unwrap() + Duration::days(day as i64);
        let questions = QuestionSet::from_ordered([
            format!("Pitanje {day}?"),
            format!("Soru {day}?"),
            format!("Question {day} ?"),
            format!("Вопрос {day}?"),
            english.to_string(),
        ])
        .unwrap();
        HistoryEntry::new(generated_at.with_timezone(&TZ).date_naive(), generated_at, questions)
    }

    #[test]
    fn missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("journal.jsonl");

        let (log, report) = HistoryLog::load(&path, TZ).unwrap();
        assert!(log.is_empty());
        assert!(report.created);
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap().len(), 0);
    }

    #[test]
    fn read_does_not_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");
        let (log, report) = HistoryLog::read(&path, TZ).unwrap();
        assert!(log.is_empty());
        assert!(!report.created);
        assert!(!path.exists());
    }

    #[test]
    fn tail_is_an_ordered_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let (mut log, _) = HistoryLog::load(&path, TZ).unwrap();
        for day in 0..200 {
            log.append(entry(day, &format!("Question number {day}?"))).unwrap();
        }

        let (log, _) = HistoryLog::load(&path, TZ).unwrap();
        assert_eq!(log.len(), 200);
        let tail = log.tail(50);
        assert_eq!(tail.len(), 50);
        assert_eq!(tail, &log.entries()[150..]);
        assert_eq!(tail[0].english(), "Question number 150?");
        assert_eq!(tail[49].english(), "Question number 199?");

        assert!(log.tail(0).is_empty());
        assert_eq!(log.tail(1000).len(), 200);
    }

    #[test]
    fn append_preserves_unicode_and_prior_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let (mut log, _) = HistoryLog::load(&path, TZ).unwrap();
        log.append(entry(0, "First?")).unwrap();
        let before = fs::read(&path).unwrap();

        let questions = QuestionSet::from_ordered([
            "Šta ćeš žrtvovati zbog dugoročnog cilja?".to_string(),
            "Uzun vadeli hedefin için neyden vazgeçeceksin?".to_string(),
            "À quoi renonceras-tu pour ton objectif à long terme ?".to_string(),
            "От чего ты откажешься ради долгосрочной цели?".to_string(),
            "What will you give up for your long-term goal?".to_string(),
        ])
        .unwrap();
        let last = HistoryEntry::new(
            NaiveDate::from_ymd_opt(2026, 2, 13).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 13, 5, 0, 12).unwrap(),
            questions,
        );
        log.append(last.clone()).unwrap();

        let after = fs::read(&path).unwrap();
        assert_eq!(&after[..before.len()], &before[..]);
        let raw = String::from_utf8(after).unwrap();
        assert!(raw.contains("От чего"), "non-Latin text must not be escaped");

        let (reloaded, report) = HistoryLog::load(&path, TZ).unwrap();
        assert!(report.is_clean());
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.last(), Some(&last));
        assert_eq!(reloaded.entries()[0], entry(0, "First?"));
    }

    #[test]
    fn malformed_lines_are_skipped_and_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let good = serde_json::to_string(&entry(1, "Good?")).unwrap();
        let missing_ru = r#"{"date":"2026-02-02","generated_at":"2026-02-02T05:00:00Z","questions":{"sr":"a?","tr":"b?","fr":"c?","en":"e?"}}"#;
        fs::write(
            &path,
            format!("{good}\nnot json\n\n{missing_ru}\n{{\"foo\":1}}\n{good}\n"),
        )
        .unwrap();

        let (log, report) = HistoryLog::load(&path, TZ).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(report.loaded, 2);
        let lines: Vec<usize> = report.skipped.iter().map(|s| s.line_number).collect();
        assert_eq!(lines, vec![2, 4, 5]);
        assert!(report.skipped[1].reason.contains("ru"));

        let (_, again) = HistoryLog::load(&path, TZ).unwrap();
        assert_eq!(again, report);
    }

    #[test]
    fn legacy_records_are_converted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let legacy = serde_json::json!({
            "date_utc": "2026-02-12T22:30:00Z",
            "question": "Šta gradiš?\nNe inşa ediyorsun?\nQue construis-tu ?\nЧто ты строишь?\nWhat are you building?"
        });
        let short =
            serde_json::json!({"date_utc": "2026-02-13T05:00:00Z", "question": "Only one?"});
        fs::write(&path, format!("{legacy}\n{short}\n")).unwrap();

        let (log, report) = HistoryLog::load(&path, TZ).unwrap();
        assert_eq!(report.legacy, 1);
        assert_eq!(report.skipped.len(), 1);
        let entry = &log.entries()[0];
        // 22:30 UTC is already the next day in Moscow.
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2026, 2, 13).unwrap());
        assert_eq!(entry.questions.get(Language::Ru), "Что ты строишь?");
        assert_eq!(entry.english(), "What are you building?");
    }

    #[test]
    fn torn_tail_is_repaired_on_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let good = serde_json::to_string(&entry(1, "Good?")).unwrap();
        fs::write(&path, format!("{good}\n{{\"date\":\"2026-")).unwrap();

        let (mut log, report) = HistoryLog::load(&path, TZ).unwrap();
        assert_eq!(report.skipped.len(), 1);
        let receipt = log.append(entry(2, "Next?")).unwrap();
        assert!(receipt.repaired_tail);

        let (reloaded, report) = HistoryLog::load(&path, TZ).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.last().unwrap().english(), "Next?");
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn duplicate_dates_and_last_date_guard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let (mut log, _) = HistoryLog::load(&path, TZ).unwrap();
        log.append(entry(1, "A?")).unwrap();
        log.append(entry(1, "B?")).unwrap();
        log.append(entry(2, "C?")).unwrap();

        let dupes = log.duplicate_dates();
        assert_eq!(dupes, vec![(entry(1, "A?").date, 2)]);
        assert!(log.has_entry_for(entry(2, "C?").date));
        assert!(!log.has_entry_for(entry(1, "A?").date));
    }

    #[test]
    fn reload_picks_up_concurrent_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let (mut log, _) = HistoryLog::load(&path, TZ).unwrap();
        assert!(!log.reload_if_changed().unwrap());

        let (mut other, _) = HistoryLog::load(&path, TZ).unwrap();
        other.append(entry(3, "Elsewhere?")).unwrap();

        assert!(log.reload_if_changed().unwrap());
        assert_eq!(log.len(), 1);
        assert!(log.has_entry_for(entry(3, "x").date));
    }

    #[test]
    fn invalid_utf8_is_a_persistence_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();
        let err = HistoryLog::load(&path, TZ).unwrap_err();
        assert_eq!(err.error_code(), "E_PERSISTENCE");
    }
}
