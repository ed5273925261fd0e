// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent; runs on every open.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Structured per-post comment store: one JSON payload per post
        -- of the form {\"comments\": [{\"text\": ..., \"sentiment\": ...}]}
        CREATE TABLE IF NOT EXISTS post_comments (
            post_id TEXT PRIMARY KEY,
            comments_json TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Legacy flat comment table, one row per comment
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL,
            text TEXT NOT NULL,
            sentiment TEXT,                    -- positive / neutral / negative
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Extracted topics. Exactly one set per post_id when settled;
        -- every row of a set shares the same created_at.
        CREATE TABLE IF NOT EXISTS post_topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL,
            topic_label TEXT NOT NULL,
            topic_description TEXT NOT NULL DEFAULT '',
            keywords TEXT NOT NULL DEFAULT '[]',        -- JSON array
            relevance_score REAL NOT NULL,              -- 0.0 to 1.0
            confidence_score REAL NOT NULL,             -- 0.0 to 1.0
            comment_count INTEGER NOT NULL DEFAULT 0,
            sentiment_distribution TEXT NOT NULL,       -- JSON object
            extracted_method TEXT NOT NULL,
            language_detected TEXT,
            created_at TEXT NOT NULL
        );

        -- Index for fetching a post's legacy comments
        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id);

        -- Index for reading and reconciling topic sets
        CREATE INDEX IF NOT EXISTS idx_topics_post_created
            ON post_topics(post_id, created_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: per-post analysis log. Keeps the most recent report for
    // each post so `status` can show what ran and how it ended.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE TABLE analysis_log (
                post_id TEXT PRIMARY KEY,
                success INTEGER NOT NULL,
                topic_count INTEGER NOT NULL,
                processing_time_ms INTEGER NOT NULL,
                method TEXT NOT NULL,
                error TEXT,
                analyzed_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX idx_analysis_log_time ON analysis_log(analyzed_at);",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, post_comments, comments, post_topics, analysis_log
        assert_eq!(table_count(&conn).unwrap(), 5);
    }

    #[test]
    fn test_migrations_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }
}
