//! Validation of raw generation output.
//!
//! Two shapes are accepted. In the labeled form every line starts with a
//! language label (`sr:`, `EN -`, `Russian:`) and each language appears once,
//! in any order. In the unlabeled form there are exactly five lines, taken as
//! sr, tr, fr, ru, en. Anything else is refused as a whole.

use daily_prompt_common::{Language, QuestionSet, QuestionSetError};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static LABELED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[-*•]\s+|\d+[.)]\s+)?\**\s*([A-Za-z]{2,10})\s*\**\s*(?:[:：]|\s+[-–—]\s+)\**\s*(.*)$",
    )
    .expect("label pattern compiles")
});

static EMBEDDED_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:sr|tr|fr|ru|en):\s").expect("embedded label pattern compiles")
});

/// Bullet or `1.` / `1)` numbering in front of a line.
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]\s+|\d+[.)]\s+)").expect("list marker pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("output is empty")]
    Empty,

    #[error("expected 5 question lines, found {0}")]
    LineCount(usize),

    #[error("line {0} has no language label")]
    Unlabeled(usize),

    #[error("line {line} has unknown language label '{label}'")]
    UnknownLabel { line: usize, label: String },

    #[error("line {0} combines several languages")]
    Combined(usize),

    #[error("empty question for language '{0}'")]
    EmptyQuestion(Language),

    #[error(transparent)]
    Invalid(#[from] QuestionSetError),
}

/// Parses model output into a validated set of five questions.
pub fn parse_questions(raw: &str) -> Result<QuestionSet, OutputError> {
    let lines: Vec<(usize, &str)> = raw
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with("```"))
        .collect();

    if lines.is_empty() {
        return Err(OutputError::Empty);
    }

    let labeled = lines.iter().any(|(_, line)| known_label(line).is_some());
    let pairs = if labeled {
        parse_labeled(&lines)?
    } else {
        parse_unlabeled(&lines)?
    };

    let mut normalized = Vec::with_capacity(pairs.len());
    for (lang, line_no, text) in pairs {
        if EMBEDDED_LABEL.is_match(text) {
            return Err(OutputError::Combined(line_no));
        }
        let text = normalize(text).ok_or(OutputError::EmptyQuestion(lang))?;
        normalized.push((lang, text));
    }

    Ok(QuestionSet::from_pairs(normalized)?)
}

fn known_label(line: &str) -> Option<(Language, &str)> {
    let caps = LABELED_LINE.captures(line)?;
    let lang = Language::from_label(caps.get(1)?.as_str())?;
    Some((lang, caps.get(2).map_or("", |m| m.as_str())))
}

fn parse_labeled<'a>(
    lines: &[(usize, &'a str)],
) -> Result<Vec<(Language, usize, &'a str)>, OutputError> {
    let mut pairs = Vec::with_capacity(lines.len());
    for &(line_no, line) in lines {
        if let Some((lang, text)) = known_label(line) {
            pairs.push((lang, line_no, text));
            continue;
        }
        return Err(match LABELED_LINE.captures(line).and_then(|c| c.get(1)) {
            Some(label) => OutputError::UnknownLabel {
                line: line_no,
                label: label.as_str().to_string(),
            },
            None => OutputError::Unlabeled(line_no),
        });
    }
    Ok(pairs)
}

fn parse_unlabeled<'a>(
    lines: &[(usize, &'a str)],
) -> Result<Vec<(Language, usize, &'a str)>, OutputError> {
    if lines.len() != Language::ALL.len() {
        return Err(OutputError::LineCount(lines.len()));
    }
    Ok(Language::ALL
        .into_iter()
        .zip(lines)
        .map(|(lang, &(line_no, text))| {
            let text = LIST_MARKER.find(text).map_or(text, |m| &text[m.end()..]);
            (lang, line_no, text)
        })
        .collect())
}

/// Collapses whitespace and makes the line end with its first `?`.
fn normalize(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let question = match collapsed.find('?') {
        Some(pos) => collapsed[..=pos].to_string(),
        None => format!("{}?", collapsed.trim_end_matches('.').trim_end()),
    };
    let has_content = question
        .chars()
        .any(|c| !c.is_whitespace() && c != '?' && c != '.');
    has_content.then_some(question)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELED: &str = "sr: Šta danas gradiš?\n\
                           tr: Bugün ne inşa ediyorsun?\n\
                           fr: Que construis-tu aujourd'hui ?\n\
                           ru: Что ты строишь сегодня?\n\
                           en: What are you building today?";

    #[test]
    fn labeled_output_is_accepted() {
        let set = parse_questions(LABELED).unwrap();
        assert_eq!(set.get(Language::Sr), "Šta danas gradiš?");
        assert_eq!(set.get(Language::Fr), "Que construis-tu aujourd'hui ?");
        assert_eq!(set.get(Language::En), "What are you building today?");
    }

    #[test]
    fn label_variants_and_fences_are_tolerated() {
        let raw = "```\n\
                   **SR:** Šta danas gradiš?\n\
                   Turkish - Bugün ne inşa ediyorsun?\n\
                   - FR: Que construis-tu aujourd'hui ?\n\
                   \n\
                   4. russian: Что ты строишь сегодня?\n\
                   en :  What   are you building today\n\
                   ```";
        let set = parse_questions(raw).unwrap();
        assert_eq!(set.get(Language::Tr), "Bugün ne inşa ediyorsun?");
        assert_eq!(set.get(Language::Ru), "Что ты строишь сегодня?");
        assert_eq!(set.get(Language::En), "What are you building today?");
    }

    #[test]
    fn labeled_order_does_not_matter() {
        let reversed: Vec<&str> = LABELED.lines().rev().collect();
        let set = parse_questions(&reversed.join("\n")).unwrap();
        assert_eq!(set, parse_questions(LABELED).unwrap());
    }

    #[test]
    fn unlabeled_five_lines_follow_display_order() {
        let raw = "Šta odlažeš?\nNeyi erteliyorsun?\nQue reportes-tu ?\nЧто ты откладываешь?\nWhat are you postponing.";
        let set = parse_questions(raw).unwrap();
        assert_eq!(set.get(Language::Ru), "Что ты откладываешь?");
        assert_eq!(set.get(Language::En), "What are you postponing?");
    }

    #[test]
    fn numbered_unlabeled_lines_lose_their_markers() {
        let raw = "1. Šta danas gradiš?\n\
                   2) Bugün ne inşa ediyorsun?\n\
                   - Que construis-tu aujourd'hui ?\n\
                   • Что ты строишь сегодня?\n\
                   5. What are you building?";
        let set = parse_questions(raw).unwrap();
        assert_eq!(set.get(Language::Sr), "Šta danas gradiš?");
        assert_eq!(set.get(Language::Tr), "Bugün ne inşa ediyorsun?");
        assert_eq!(set.get(Language::Fr), "Que construis-tu aujourd'hui ?");
        assert_eq!(set.get(Language::Ru), "Что ты строишь сегодня?");
        assert_eq!(set.get(Language::En), "What are you building?");
    }

    #[test]
    fn missing_language_is_rejected() {
        let four: Vec<&str> = LABELED.lines().take(4).collect();
        let err = parse_questions(&four.join("\n")).unwrap_err();
        assert_eq!(err, OutputError::Invalid(QuestionSetError::Missing(Language::En)));

        let err = parse_questions("a?\nb?\nc?\nd?").unwrap_err();
        assert_eq!(err, OutputError::LineCount(4));
    }

    #[test]
    fn duplicate_and_unknown_labels_are_rejected() {
        let dup = format!("{LABELED}\nen: Another one?");
        assert_eq!(
            parse_questions(&dup).unwrap_err(),
            OutputError::Invalid(QuestionSetError::Duplicate(Language::En))
        );

        let unknown = LABELED.replace("tr:", "de:");
        assert!(matches!(
            parse_questions(&unknown).unwrap_err(),
            OutputError::UnknownLabel { line: 2, .. }
        ));

        let stray = format!("{LABELED}\nHope this helps!");
        assert_eq!(parse_questions(&stray).unwrap_err(), OutputError::Unlabeled(6));
    }

    #[test]
    fn combined_blob_is_rejected() {
        let raw = "sr: Šta? tr: Ne? fr: Quoi ? ru: Что? en: What?";
        assert_eq!(parse_questions(raw).unwrap_err(), OutputError::Combined(1));
    }

    #[test]
    fn empty_question_is_rejected() {
        let raw = LABELED.replace("Что ты строишь сегодня?", "");
        assert_eq!(
            parse_questions(&raw).unwrap_err(),
            OutputError::EmptyQuestion(Language::Ru)
        );
        assert_eq!(parse_questions("  \n```\n```").unwrap_err(), OutputError::Empty);
    }

    #[test]
    fn normalization_keeps_text_up_to_first_question_mark() {
        assert_eq!(normalize("Why?  And why not?").as_deref(), Some("Why?"));
        assert_eq!(normalize("What  matters  now.").as_deref(), Some("What matters now?"));
        assert_eq!(normalize(" ? "), None);
    }
}
