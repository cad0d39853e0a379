//! Generation request assembly.

use chrono::NaiveDate;
use daily_prompt_common::{GenerationPrompt, HistoryEntry, Language};

const NO_HISTORY: &str = "(no prior questions yet)";

/// Fixed system text sent with every request.
pub fn instructions() -> String {
    let mut text = String::from(
        "You generate ONE daily journaling question.\n\n\
         The question must be written in FIVE languages in the following order:\n",
    );
    for (i, lang) in Language::ALL.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, lang.english_name()));
    }
    text.push_str(
        "\nFormatting rules:\n\
         - Each language must appear on its own line, prefixed with its lowercase code and a colon: \
         sr:, tr:, fr:, ru:, en:.\n\
         - No bullet points, no numbering, no other labels.\n\
         - Output only the five labeled questions, nothing else.\n\
         - Each line must be a single sentence ending with '?'.\n\
         - The content across languages must be semantically equivalent.\n\n\
         Content constraints:\n\
         - Themes: self-actualization, philosophy, disciplined execution, long-term goals.\n\
         - Must be intellectually serious and specific.\n\
         - Avoid therapy clichés and motivational fluff.\n\
         - Do not repeat prior questions verbatim or near-verbatim, and avoid repeating their structure or wording.\n\
         - Maintain long-term conceptual progression across days.\n",
    );
    text
}

/// Builds the request for `today` from the recent history, most recent last.
pub fn build_request(tail: &[HistoryEntry], today: NaiveDate) -> GenerationPrompt {
    let context = if tail.is_empty() {
        NO_HISTORY.to_string()
    } else {
        tail.iter()
            .map(|entry| format!("- [{}] {}", entry.date.format("%Y-%m-%d"), entry.english()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let input = format!(
        "Date today: {}\n\n\
         Here are previous journal questions (most recent last). \
         Do NOT repeat them; continue the sequence.\n\
         {context}\n\n\
         Now generate the next question in the sequence.",
        today.format("%Y-%m-%d"),
    );

    GenerationPrompt {
        instructions: instructions(),
        input,
    }
}
