// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::models::{
    AnalysisLogEntry, AnalysisReport, CommentPayload, CommentRecord, ReconcileReport, StoreStats,
    StoredTopic,
};
use crate::topics::model::{SentimentDistribution, Topic};

/// The legacy comment table is read with this cap.
pub const LEGACY_COMMENT_LIMIT: u32 = 1000;

/// Timestamp format for `post_topics.created_at`. Microsecond precision and
/// fixed width, so string comparison orders sets chronologically.
pub fn topic_set_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

// --- Comment sources ---

/// Store (or overwrite) a post's structured comment payload.
pub fn save_post_comments(conn: &Connection, post_id: &str, comments: &[CommentRecord]) -> Result<()> {
    let payload = CommentPayload {
        comments: comments.to_vec(),
    };
    let json = serde_json::to_string(&payload)?;
    conn.execute(
        "INSERT INTO post_comments (post_id, comments_json, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(post_id) DO UPDATE SET comments_json = ?2, updated_at = datetime('now')",
        params![post_id, json],
    )?;
    Ok(())
}

/// Load a post's structured comment payload, if one is stored.
pub fn get_post_comments(conn: &Connection, post_id: &str) -> Result<Option<Vec<CommentRecord>>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT comments_json FROM post_comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => {
            let payload: CommentPayload = serde_json::from_str(&json)
                .with_context(|| format!("Malformed comment payload for post {post_id}"))?;
            Ok(Some(payload.comments))
        }
        None => Ok(None),
    }
}

/// Append comments to the legacy flat table. Returns the number inserted.
pub fn insert_legacy_comments(
    conn: &mut Connection,
    post_id: &str,
    comments: &[CommentRecord],
) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO comments (post_id, text, sentiment) VALUES (?1, ?2, ?3)")?;
        for comment in comments {
            stmt.execute(params![post_id, comment.text, comment.sentiment])?;
        }
    }
    tx.commit()?;
    Ok(comments.len())
}

/// Read a post's legacy comments in insertion order, capped at `limit` rows.
pub fn get_legacy_comments(conn: &Connection, post_id: &str, limit: u32) -> Result<Vec<CommentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT text, sentiment FROM comments WHERE post_id = ?1 ORDER BY id LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![post_id, limit], |row| {
        Ok(CommentRecord {
            text: row.get(0)?,
            sentiment: row.get(1)?,
        })
    })?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

/// Posts that have comments in either store but no topics yet.
pub fn posts_pending_analysis(conn: &Connection, limit: u32) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT post_id FROM (
            SELECT post_id FROM post_comments
            UNION
            SELECT DISTINCT post_id FROM comments
         )
         WHERE post_id NOT IN (SELECT DISTINCT post_id FROM post_topics)
         ORDER BY post_id
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| row.get(0))?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

// --- Topic sets ---

/// Append one topic set for a post without touching existing rows.
///
/// `replace_topics` is the normal write path; this is its insert half, and is
/// also how tests reproduce the duplicate sets a racing writer leaves behind.
pub fn insert_topic_set(
    conn: &Connection,
    post_id: &str,
    topics: &[Topic],
    created_at: &str,
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO post_topics
            (post_id, topic_label, topic_description, keywords, relevance_score,
             confidence_score, comment_count, sentiment_distribution, extracted_method,
             language_detected, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for topic in topics {
        stmt.execute(params![
            post_id,
            topic.label,
            topic.description,
            serde_json::to_string(&topic.keywords)?,
            topic.relevance_score,
            topic.confidence_score,
            topic.comment_count,
            serde_json::to_string(&topic.sentiment_distribution)?,
            topic.extraction_method.as_str(),
            topic.detected_language,
            created_at,
        ])?;
    }
    Ok(topics.len())
}

/// Replace a post's topic set: delete the old rows and insert the new ones in
/// a single transaction. Any failure rolls the whole thing back, leaving the
/// previous set intact.
pub fn replace_topics(conn: &mut Connection, post_id: &str, topics: &[Topic]) -> Result<usize> {
    let created_at = topic_set_timestamp();
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM post_topics WHERE post_id = ?1", params![post_id])?;
    let inserted = insert_topic_set(&tx, post_id, topics, &created_at)?;
    tx.commit()
        .with_context(|| format!("Failed to commit topic set for post {post_id}"))?;
    Ok(inserted)
}

/// Load a post's topics, most relevant first.
pub fn get_topics(conn: &Connection, post_id: &str) -> Result<Vec<StoredTopic>> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, topic_label, topic_description, keywords, relevance_score,
                confidence_score, comment_count, sentiment_distribution, extracted_method,
                language_detected, created_at
         FROM post_topics
         WHERE post_id = ?1
         ORDER BY relevance_score DESC, id ASC",
    )?;

    let rows = stmt.query_map(params![post_id], |row| {
        let id: i64 = row.get(0)?;
        let keywords_json: String = row.get(4)?;
        let sentiment_json: String = row.get(8)?;
        Ok(StoredTopic {
            id,
            post_id: row.get(1)?,
            topic_label: row.get(2)?,
            topic_description: row.get(3)?,
            keywords: json_column(&keywords_json, "keywords", id),
            relevance_score: row.get(5)?,
            confidence_score: row.get(6)?,
            comment_count: row.get(7)?,
            sentiment_distribution: json_column::<SentimentDistribution>(
                &sentiment_json,
                "sentiment_distribution",
                id,
            ),
            extracted_method: row.get(9)?,
            language_detected: row.get(10)?,
            created_at: row.get(11)?,
        })
    })?;

    let mut topics = Vec::new();
    for row in rows {
        topics.push(row?);
    }
    Ok(topics)
}

/// Decode a JSON column of a topic row. A corrupt value is logged and read
/// as the default so one bad row doesn't hide the rest of the set.
fn json_column<T: DeserializeOwned + Default>(raw: &str, column: &str, row_id: i64) -> T {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(row_id, column, error = %e, "Corrupt JSON in post_topics, using default");
            T::default()
        }
    }
}

/// Repair posts that hold more than one topic set.
///
/// Sets are told apart by `created_at`. For each affected post the newest set
/// survives and older ones are deleted. Runs in one transaction so it can't
/// interleave with a live `replace_topics`. A second pass with no new writes
/// deletes nothing.
pub fn reconcile_topic_sets(conn: &mut Connection) -> Result<ReconcileReport> {
    let tx = conn.transaction()?;

    let duplicated: Vec<(String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT post_id, MAX(created_at)
             FROM post_topics
             GROUP BY post_id
             HAVING COUNT(DISTINCT created_at) > 1",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        collected
    };

    let mut report = ReconcileReport::default();
    for (post_id, newest) in &duplicated {
        let deleted = tx.execute(
            "DELETE FROM post_topics WHERE post_id = ?1 AND created_at < ?2",
            params![post_id, newest],
        )?;
        report.posts_repaired += 1;
        report.rows_deleted += deleted;
    }

    tx.commit().context("Failed to commit topic reconciliation")?;
    Ok(report)
}

// --- Analysis log ---

/// Record the latest analysis report for a post (upsert).
pub fn record_analysis(conn: &Connection, post_id: &str, report: &AnalysisReport) -> Result<()> {
    conn.execute(
        "INSERT INTO analysis_log
            (post_id, success, topic_count, processing_time_ms, method, error, analyzed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(post_id) DO UPDATE SET
            success = ?2,
            topic_count = ?3,
            processing_time_ms = ?4,
            method = ?5,
            error = ?6,
            analyzed_at = datetime('now')",
        params![
            post_id,
            report.success,
            report.topic_count as i64,
            report.processing_time_ms as i64,
            report.method,
            report.error,
        ],
    )?;
    Ok(())
}

/// Most recently analyzed posts, newest first.
pub fn get_recent_analyses(conn: &Connection, limit: u32) -> Result<Vec<AnalysisLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT post_id, success, topic_count, processing_time_ms, method, error, analyzed_at
         FROM analysis_log
         ORDER BY analyzed_at DESC, post_id ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        let topic_count: i64 = row.get(2)?;
        let processing_time_ms: i64 = row.get(3)?;
        Ok(AnalysisLogEntry {
            post_id: row.get(0)?,
            report: AnalysisReport {
                success: row.get(1)?,
                topic_count: topic_count.max(0) as usize,
                processing_time_ms: processing_time_ms.max(0) as u64,
                method: row.get(4)?,
                error: row.get(5)?,
            },
            analyzed_at: row.get(6)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

// --- Stats ---

pub fn store_stats(conn: &Connection) -> Result<StoreStats> {
    let posts_with_comments: i64 = conn.query_row(
        "SELECT COUNT(*) FROM (
            SELECT post_id FROM post_comments
            UNION
            SELECT DISTINCT post_id FROM comments
         )",
        [],
        |row| row.get(0),
    )?;
    let posts_with_topics: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT post_id) FROM post_topics",
        [],
        |row| row.get(0),
    )?;
    let topic_rows: i64 = conn.query_row("SELECT COUNT(*) FROM post_topics", [], |row| row.get(0))?;
    let duplicate_sets: i64 = conn.query_row(
        "SELECT COUNT(*) FROM (
            SELECT post_id FROM post_topics
            GROUP BY post_id
            HAVING COUNT(DISTINCT created_at) > 1
         )",
        [],
        |row| row.get(0),
    )?;

    Ok(StoreStats {
        posts_with_comments,
        posts_with_topics,
        topic_rows,
        duplicate_sets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;
    use crate::topics::model::ExtractionMethod;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn topics(n: usize, method: ExtractionMethod) -> Vec<Topic> {
        (0..n)
            .map(|i| Topic {
                label: format!("topic {i}"),
                description: format!("description {i}"),
                keywords: vec![format!("kw{i}")],
                relevance_score: 1.0 - i as f64 * 0.1,
                confidence_score: 0.5,
                comment_count: i as u32,
                sentiment_distribution: SentimentDistribution::default(),
                extraction_method: method,
                detected_language: Some("en".into()),
            })
            .collect()
    }

    #[test]
    fn test_structured_comments_roundtrip() {
        let conn = test_conn();
        assert!(get_post_comments(&conn, "p1").unwrap().is_none());

        let comments = vec![
            CommentRecord::new("first comment text"),
            CommentRecord {
                text: "second comment text".into(),
                sentiment: Some("negative".into()),
            },
        ];
        save_post_comments(&conn, "p1", &comments).unwrap();
        assert_eq!(get_post_comments(&conn, "p1").unwrap().unwrap(), comments);

        // Overwrite, not append
        save_post_comments(&conn, "p1", &comments[..1]).unwrap();
        assert_eq!(get_post_comments(&conn, "p1").unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO post_comments (post_id, comments_json) VALUES ('bad', 'not json')",
            [],
        )
        .unwrap();
        assert!(get_post_comments(&conn, "bad").is_err());
    }

    #[test]
    fn test_legacy_comments_capped_and_ordered() {
        let mut conn = test_conn();
        let comments: Vec<CommentRecord> =
            (0..12).map(|i| CommentRecord::new(format!("legacy comment {i}"))).collect();
        assert_eq!(insert_legacy_comments(&mut conn, "p1", &comments).unwrap(), 12);

        let loaded = get_legacy_comments(&conn, "p1", 5).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded[0].text, "legacy comment 0");
        assert!(get_legacy_comments(&conn, "other", LEGACY_COMMENT_LIMIT)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_replace_leaves_exactly_the_new_set() {
        let mut conn = test_conn();
        replace_topics(&mut conn, "p1", &topics(5, ExtractionMethod::Primary)).unwrap();
        assert_eq!(get_topics(&conn, "p1").unwrap().len(), 5);

        replace_topics(&mut conn, "p1", &topics(3, ExtractionMethod::BasicFallback)).unwrap();
        let stored = get_topics(&conn, "p1").unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|t| t.extracted_method == "basic-fallback"));
        assert!(stored.iter().all(|t| t.created_at == stored[0].created_at));
    }

    #[test]
    fn test_replace_does_not_touch_other_posts() {
        let mut conn = test_conn();
        replace_topics(&mut conn, "p1", &topics(4, ExtractionMethod::Primary)).unwrap();
        replace_topics(&mut conn, "p2", &topics(2, ExtractionMethod::Primary)).unwrap();
        assert_eq!(get_topics(&conn, "p1").unwrap().len(), 4);
        assert_eq!(get_topics(&conn, "p2").unwrap().len(), 2);
    }

    #[test]
    fn test_failed_insert_keeps_previous_set() {
        let mut conn = test_conn();
        replace_topics(&mut conn, "p1", &topics(2, ExtractionMethod::Primary)).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_label BEFORE INSERT ON post_topics
             WHEN NEW.topic_label = 'rejected'
             BEGIN SELECT RAISE(ABORT, 'insert rejected'); END;",
        )
        .unwrap();

        let mut next = topics(3, ExtractionMethod::SecondaryFallback);
        next[1].label = "rejected".into();
        assert!(replace_topics(&mut conn, "p1", &next).is_err());

        let stored = get_topics(&conn, "p1").unwrap();
        let labels: Vec<&str> = stored.iter().map(|t| t.topic_label.as_str()).collect();
        assert_eq!(labels, vec!["topic 0", "topic 1"]);
        assert!(stored.iter().all(|t| t.extracted_method == "primary"));
    }

    #[test]
    fn test_corrupt_json_columns_read_as_defaults() {
        let mut conn = test_conn();
        replace_topics(&mut conn, "p1", &topics(1, ExtractionMethod::Primary)).unwrap();
        conn.execute(
            "UPDATE post_topics SET keywords = 'not json', sentiment_distribution = '{'",
            [],
        )
        .unwrap();

        let stored = get_topics(&conn, "p1").unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].keywords.is_empty());
        assert_eq!(stored[0].sentiment_distribution, SentimentDistribution::default());
        assert_eq!(stored[0].topic_label, "topic 0");
    }

    #[test]
    fn test_get_topics_ordered_by_relevance() {
        let mut conn = test_conn();
        let mut set = topics(3, ExtractionMethod::Primary);
        set.reverse();
        replace_topics(&mut conn, "p1", &set).unwrap();

        let stored = get_topics(&conn, "p1").unwrap();
        let scores: Vec<f64> = stored.iter().map(|t| t.relevance_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "got {scores:?}");
        assert_eq!(stored[0].keywords, vec!["kw0"]);
        assert_eq!(stored[0].language_detected.as_deref(), Some("en"));
    }

    #[test]
    fn test_reconcile_keeps_newest_set() {
        let mut conn = test_conn();
        insert_topic_set(&conn, "p1", &topics(5, ExtractionMethod::Primary), "2025-01-01T00:00:00.000001Z").unwrap();
        insert_topic_set(&conn, "p1", &topics(3, ExtractionMethod::SecondaryFallback), "2025-01-01T00:00:00.000002Z").unwrap();
        insert_topic_set(&conn, "p2", &topics(2, ExtractionMethod::Primary), "2025-01-01T00:00:00.000001Z").unwrap();

        assert_eq!(store_stats(&conn).unwrap().duplicate_sets, 1);

        let report = reconcile_topic_sets(&mut conn).unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                posts_repaired: 1,
                rows_deleted: 5
            }
        );

        let p1 = get_topics(&conn, "p1").unwrap();
        assert_eq!(p1.len(), 3);
        assert!(p1.iter().all(|t| t.extracted_method == "secondary-fallback"));
        assert_eq!(get_topics(&conn, "p2").unwrap().len(), 2);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut conn = test_conn();
        insert_topic_set(&conn, "p1", &topics(2, ExtractionMethod::Primary), "2025-01-01T00:00:00.000001Z").unwrap();
        insert_topic_set(&conn, "p1", &topics(2, ExtractionMethod::Primary), "2025-01-02T00:00:00.000001Z").unwrap();
        insert_topic_set(&conn, "p1", &topics(2, ExtractionMethod::Primary), "2025-01-03T00:00:00.000001Z").unwrap();

        let first = reconcile_topic_sets(&mut conn).unwrap();
        assert_eq!(first.rows_deleted, 4);

        let second = reconcile_topic_sets(&mut conn).unwrap();
        assert_eq!(second, ReconcileReport::default());
        assert_eq!(get_topics(&conn, "p1").unwrap().len(), 2);
    }

    #[test]
    fn test_pending_posts_and_stats() {
        let mut conn = test_conn();
        save_post_comments(&conn, "a", &[CommentRecord::new("structured comment")]).unwrap();
        insert_legacy_comments(&mut conn, "b", &[CommentRecord::new("legacy comment here")]).unwrap();
        insert_legacy_comments(&mut conn, "c", &[CommentRecord::new("another legacy one")]).unwrap();
        replace_topics(&mut conn, "c", &topics(1, ExtractionMethod::Primary)).unwrap();

        assert_eq!(posts_pending_analysis(&conn, 10).unwrap(), vec!["a", "b"]);

        let stats = store_stats(&conn).unwrap();
        assert_eq!(stats.posts_with_comments, 3);
        assert_eq!(stats.posts_with_topics, 1);
        assert_eq!(stats.topic_rows, 1);
        assert_eq!(stats.duplicate_sets, 0);
    }

    #[test]
    fn test_analysis_log_upserts() {
        let conn = test_conn();
        let mut report = AnalysisReport {
            success: false,
            topic_count: 0,
            processing_time_ms: 12,
            method: "no-comments".into(),
            error: Some("No comments found".into()),
        };
        record_analysis(&conn, "p1", &report).unwrap();

        report.success = true;
        report.topic_count = 3;
        report.method = "primary".into();
        report.error = None;
        record_analysis(&conn, "p1", &report).unwrap();

        let entries = get_recent_analyses(&conn, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].post_id, "p1");
        assert_eq!(entries[0].report, report);
    }
}
