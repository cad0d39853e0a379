use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages every journal entry is written in.
///
/// Variant order is the display order (sr, tr, fr, ru, en); `Ord` follows it,
/// so ordered maps keyed by `Language` iterate in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Sr,
    Tr,
    Fr,
    Ru,
    En,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Sr,
        Language::Tr,
        Language::Fr,
        Language::Ru,
        Language::En,
    ];

    /// Lowercase code used in the log file and in model output labels.
    pub fn code(self) -> &'static str {
        match self {
            Language::Sr => "sr",
            Language::Tr => "tr",
            Language::Fr => "fr",
            Language::Ru => "ru",
            Language::En => "en",
        }
    }

    /// English name, as used in the generation instructions.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::Sr => "Serbian (Latin script)",
            Language::Tr => "Turkish",
            Language::Fr => "French",
            Language::Ru => "Russian",
            Language::En => "English",
        }
    }

    /// Name of the language in the language itself, used in the email body.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::Sr => "Srpski",
            Language::Tr => "Türkçe",
            Language::Fr => "Français",
            Language::Ru => "Русский",
            Language::En => "English",
        }
    }

    /// Resolves a label written by a model or an operator: either the code
    /// (`sr`) or the plain English name (`serbian`), case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|lang| {
            normalized == lang.code()
                || normalized
                    == lang
                        .english_name()
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_ascii_lowercase()
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
