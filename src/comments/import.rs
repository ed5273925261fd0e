// Comment file import — load comments for `murmur import`.
//
// Accepted formats, tried in order:
//   {"comments": [{"text": ..., "sentiment": ...}, ...]}
//   [{"text": ..., "sentiment": ...}, ...]
//   ["comment", "comment", ...]
//   plain text, one comment per non-blank line

use anyhow::{Context, Result};
use std::path::Path;

use crate::db::models::{CommentPayload, CommentRecord};

/// Read and parse a comment file.
pub fn read_comment_file(path: &Path) -> Result<Vec<CommentRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comment file {}", path.display()))?;
    parse_comments(&raw)
        .with_context(|| format!("Failed to parse comment file {}", path.display()))
}

/// Parse comment file contents in any of the accepted formats.
pub fn parse_comments(raw: &str) -> Result<Vec<CommentRecord>> {
    let trimmed = raw.trim_start();

    if trimmed.starts_with('{') {
        let payload: CommentPayload =
            serde_json::from_str(raw).context("Invalid {\"comments\": [...]} payload")?;
        return Ok(payload.comments);
    }

    if trimmed.starts_with('[') {
        if let Ok(records) = serde_json::from_str::<Vec<CommentRecord>>(raw) {
            return Ok(records);
        }
        let texts: Vec<String> =
            serde_json::from_str(raw).context("Expected a JSON array of comments")?;
        return Ok(texts.into_iter().map(CommentRecord::new).collect());
    }

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(CommentRecord::new)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_object() {
        let comments = parse_comments(
            r#"{"comments": [{"text": "love the chorus", "sentiment": "positive"}, {"text": "too long"}]}"#,
        )
        .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].sentiment.as_deref(), Some("positive"));
        assert_eq!(comments[1].sentiment, None);
    }

    #[test]
    fn test_record_and_string_arrays() {
        let records = parse_comments(r#"[{"text": "first"}]"#).unwrap();
        assert_eq!(records[0].text, "first");

        let strings = parse_comments(r#"["first", "second"]"#).unwrap();
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[1].text, "second");
    }

    #[test]
    fn test_plain_lines() {
        let comments = parse_comments("first comment\n\n  second comment  \n").unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first comment", "second comment"]);
    }

    #[test]
    fn test_broken_json_is_an_error() {
        assert!(parse_comments("{\"comments\": [").is_err());
        assert!(parse_comments("[1, 2, 3]").is_err());
    }
}
