//! Journal entry model.
//!
//! A [`QuestionSet`] can only be built through validation, so a value of this
//! type always carries one non-empty, single-line question per [`Language`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::language::Language;

/// Reasons a set of questions is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionSetError {
    #[error("missing question for language '{0}'")]
    Missing(Language),

    #[error("empty question for language '{0}'")]
    Empty(Language),

    #[error("question for language '{0}' spans several lines")]
    MultiLine(Language),

    #[error("language '{0}' given more than once")]
    Duplicate(Language),
}

/// One question per language, iterated in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Language, String>",
    into = "BTreeMap<Language, String>"
)]
pub struct QuestionSet {
    texts: BTreeMap<Language, String>,
}

impl QuestionSet {
    /// Builds a set from `(language, text)` pairs. Texts are trimmed; every
    /// language must appear exactly once.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, QuestionSetError>
    where
        I: IntoIterator<Item = (Language, S)>,
        S: Into<String>,
    {
        let mut texts = BTreeMap::new();
        for (lang, text) in pairs {
            let text = text.into();
            if texts.insert(lang, text).is_some() {
                return Err(QuestionSetError::Duplicate(lang));
            }
        }
        Self::try_from(texts)
    }

    /// Builds a set from exactly five texts given in display order.
    pub fn from_ordered(texts: [String; 5]) -> Result<Self, QuestionSetError> {
        Self::from_pairs(Language::ALL.into_iter().zip(texts))
    }

    pub fn get(&self, lang: Language) -> &str {
        // Construction guarantees every language is present.
        self.texts.get(&lang).map(String::as_str).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Language, &str)> {
        self.texts.iter().map(|(lang, text)| (*lang, text.as_str()))
    }
}

impl TryFrom<BTreeMap<Language, String>> for QuestionSet {
    type Error = QuestionSetError;

    fn try_from(raw: BTreeMap<Language, String>) -> Result<Self, Self::Error> {
        let mut texts = BTreeMap::new();
        for lang in Language::ALL {
            let text = raw.get(&lang).ok_or(QuestionSetError::Missing(lang))?.trim();
            if text.is_empty() {
                return Err(QuestionSetError::Empty(lang));
            }
            if text.contains(|c: char| c == '\n' || c == '\r') {
                return Err(QuestionSetError::MultiLine(lang));
            }
            texts.insert(lang, text.to_string());
        }
        Ok(Self { texts })
    }
}

impl From<QuestionSet> for BTreeMap<Language, String> {
    fn from(set: QuestionSet) -> Self {
        set.texts
    }
}

/// One journal day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Calendar day in the target time zone.
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub questions: QuestionSet,
}

impl HistoryEntry {
    pub fn new(date: NaiveDate, generated_at: DateTime<Utc>, questions: QuestionSet) -> Self {
        Self {
            date,
            generated_at,
            questions,
        }
    }

    /// English question, used when summarising the history for the model.
    pub fn english(&self) -> &str {
        self.questions.get(Language::En)
    }
}
