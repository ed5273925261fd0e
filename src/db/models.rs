// Data models — Rust structs that map to database rows.
//
// These are the types that flow between the pipeline and storage. They're
// separate from the queries so other modules can use them without depending
// on rusqlite directly.

use serde::{Deserialize, Serialize};

use crate::topics::model::SentimentDistribution;

/// One raw comment as stored by the upstream ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub text: String,
    /// Sentiment label assigned at ingestion time, if any
    #[serde(default)]
    pub sentiment: Option<String>,
}

impl CommentRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sentiment: None,
        }
    }
}

/// Payload of the structured per-post comment column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

/// A persisted topic row. Field names follow the `post_topics` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTopic {
    pub id: i64,
    pub post_id: String,
    pub topic_label: String,
    pub topic_description: String,
    pub keywords: Vec<String>,
    pub relevance_score: f64,
    pub confidence_score: f64,
    pub comment_count: u32,
    pub sentiment_distribution: SentimentDistribution,
    pub extracted_method: String,
    pub language_detected: Option<String>,
    /// Shared by every row written in the same replace
    pub created_at: String,
}

/// Outcome of one `analyze` call, as returned to callers and logged per post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub topic_count: usize,
    pub processing_time_ms: u64,
    /// Extraction method tag, or one of the report-only tags
    /// (`error-fallback`, `no-comments`, `aborted`)
    pub method: String,
    pub error: Option<String>,
}

/// A logged analysis report with its post and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisLogEntry {
    pub post_id: String,
    pub report: AnalysisReport,
    pub analyzed_at: String,
}

/// What a reconciliation pass repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Posts that had more than one topic set
    pub posts_repaired: usize,
    /// Rows deleted from the superseded sets
    pub rows_deleted: usize,
}

/// Row counts for `murmur status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub posts_with_comments: i64,
    pub posts_with_topics: i64,
    pub topic_rows: i64,
    /// Posts currently holding more than one topic set
    pub duplicate_sets: i64,
}
