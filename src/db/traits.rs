// Database trait — backend-agnostic async interface for all DB operations.
//
// The pipeline only talks to `Arc<dyn Database>`, so the storage engine can
// change (or be wrapped with fault injection in tests) without touching it.
// All methods are async so a sync backend behind a mutex and a natively
// async backend fit behind the same interface.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{AnalysisLogEntry, AnalysisReport, CommentRecord, ReconcileReport, StoreStats, StoredTopic};
use crate::topics::model::Topic;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Comment sources ---

    /// Store (or overwrite) a post's structured comment payload.
    async fn save_post_comments(&self, post_id: &str, comments: &[CommentRecord]) -> Result<()>;

    /// Load a post's structured comment payload, if one exists.
    async fn get_post_comments(&self, post_id: &str) -> Result<Option<Vec<CommentRecord>>>;

    /// Append comments to the legacy flat table. Returns the number inserted.
    async fn insert_legacy_comments(&self, post_id: &str, comments: &[CommentRecord]) -> Result<usize>;

    /// Read up to `limit` legacy comments for a post.
    async fn get_legacy_comments(&self, post_id: &str, limit: u32) -> Result<Vec<CommentRecord>>;

    /// Posts with comments but no stored topics.
    async fn posts_pending_analysis(&self, limit: u32) -> Result<Vec<String>>;

    // --- Topic sets ---

    /// Atomically replace a post's topic set.
    async fn replace_topics(&self, post_id: &str, topics: &[Topic]) -> Result<()>;

    /// A post's stored topics, most relevant first.
    async fn get_topics(&self, post_id: &str) -> Result<Vec<StoredTopic>>;

    /// Delete superseded topic sets, keeping the newest per post.
    async fn reconcile_topic_sets(&self) -> Result<ReconcileReport>;

    // --- Analysis log ---

    /// Record the latest analysis report for a post.
    async fn record_analysis(&self, post_id: &str, report: &AnalysisReport) -> Result<()>;

    /// Most recent analysis reports, newest first.
    async fn get_recent_analyses(&self, limit: u32) -> Result<Vec<AnalysisLogEntry>>;

    // --- Stats ---

    async fn store_stats(&self) -> Result<StoreStats>;
}
