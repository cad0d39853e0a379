//! Email rendering.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use daily_prompt_common::HistoryEntry;

/// Calendar day of `now` in `tz`.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// `13 February, 2026`
pub fn human_date(date: NaiveDate) -> String {
    date.format("%-d %B, %Y").to_string()
}

pub fn subject(prefix: &str, date: NaiveDate) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        human_date(date)
    } else {
        format!("{prefix} — {}", human_date(date))
    }
}

/// Date header, a blank line, then one bullet per language in display order.
pub fn body(entry: &HistoryEntry) -> String {
    let mut out = human_date(entry.date);
    out.push_str("\n\n");
    for (lang, text) in entry.questions.iter() {
        out.push_str(&format!("• {}: {}\n", lang.native_name(), text));
    }
    out
}
