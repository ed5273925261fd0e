// Prompt construction shared by the remote providers.

use crate::output::truncate_chars;

/// Per-comment cap so one wall of text can't crowd out the rest of the batch.
const MAX_COMMENT_CHARS: usize = 500;

pub const JSON_SYSTEM_PROMPT: &str = "You analyze social media comments and identify the main \
topics people are discussing. Respond with JSON only, no prose.";

pub const LIST_SYSTEM_PROMPT: &str = "You analyze social media comments and identify the main \
topics people are discussing. Be concise.";

/// Prompt asking for a strict JSON payload (primary provider).
pub fn json_prompt(comments: &[String], max_topics: usize) -> String {
    format!(
        "Identify up to {max_topics} distinct topics in the comments below.\n\
         Return a JSON object of the form:\n\
         {{\"topics\": [{{\"label\": string, \"description\": string, \"keywords\": [string], \
         \"relevance_score\": number 0-1, \"confidence_score\": number 0-1, \
         \"comment_count\": integer, \
         \"sentiment\": {{\"positive\": number, \"neutral\": number, \"negative\": number}}, \
         \"language\": ISO 639-1 code}}]}}\n\n\
         Comments:\n{}",
        numbered(comments)
    )
}

/// Prompt asking for a numbered plain-text list (secondary provider).
pub fn list_prompt(comments: &[String], max_topics: usize) -> String {
    format!(
        "Identify up to {max_topics} distinct topics in the comments below.\n\
         For each topic write a numbered entry like:\n\
         1. <topic label> - <one sentence description>\n\
         Keywords: <comma separated>\n\
         Relevance: <0-1>\n\
         Comments: <how many comments mention it>\n\
         Sentiment: positive <0-1>, neutral <0-1>, negative <0-1>\n\n\
         Comments:\n{}",
        numbered(comments)
    )
}

fn numbered(comments: &[String]) -> String {
    comments
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, truncate_chars(c.trim(), MAX_COMMENT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}
