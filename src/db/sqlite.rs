// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Holding the lock for the whole call also serializes writers: a topic
// replace and a reconciliation pass can never interleave.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{AnalysisLogEntry, AnalysisReport, CommentRecord, ReconcileReport, StoreStats, StoredTopic};
use super::queries;
use super::traits::Database;
use crate::topics::model::Topic;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn save_post_comments(&self, post_id: &str, comments: &[CommentRecord]) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::save_post_comments(&conn, post_id, comments)
    }

    async fn get_post_comments(&self, post_id: &str) -> Result<Option<Vec<CommentRecord>>> {
        let conn = self.conn.lock().await;
        queries::get_post_comments(&conn, post_id)
    }

    async fn insert_legacy_comments(&self, post_id: &str, comments: &[CommentRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        queries::insert_legacy_comments(&mut conn, post_id, comments)
    }

    async fn get_legacy_comments(&self, post_id: &str, limit: u32) -> Result<Vec<CommentRecord>> {
        let conn = self.conn.lock().await;
        queries::get_legacy_comments(&conn, post_id, limit)
    }

    async fn posts_pending_analysis(&self, limit: u32) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        queries::posts_pending_analysis(&conn, limit)
    }

    async fn replace_topics(&self, post_id: &str, topics: &[Topic]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        queries::replace_topics(&mut conn, post_id, topics)?;
        Ok(())
    }

    async fn get_topics(&self, post_id: &str) -> Result<Vec<StoredTopic>> {
        let conn = self.conn.lock().await;
        queries::get_topics(&conn, post_id)
    }

    async fn reconcile_topic_sets(&self) -> Result<ReconcileReport> {
        let mut conn = self.conn.lock().await;
        queries::reconcile_topic_sets(&mut conn)
    }

    async fn record_analysis(&self, post_id: &str, report: &AnalysisReport) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::record_analysis(&conn, post_id, report)
    }

    async fn get_recent_analyses(&self, limit: u32) -> Result<Vec<AnalysisLogEntry>> {
        let conn = self.conn.lock().await;
        queries::get_recent_analyses(&conn, limit)
    }

    async fn store_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().await;
        queries::store_stats(&conn)
    }
}
