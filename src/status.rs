// System status display — DB size, comment/topic counts, recent analyses.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::output::terminal::display_recent_analyses;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, config: &Config) -> Result<()> {
    // Database file size
    let file_size = std::fs::metadata(&config.db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", config.db_path, file_size);

    let stats = db.store_stats().await?;
    println!("Posts with comments: {}", stats.posts_with_comments);
    println!(
        "Posts with topics: {} ({} topic rows)",
        stats.posts_with_topics, stats.topic_rows
    );
    if stats.duplicate_sets > 0 {
        println!(
            "Duplicate topic sets: {}",
            stats.duplicate_sets.to_string().yellow()
        );
        println!("  Run `murmur reconcile` to repair them");
    } else {
        println!("Duplicate topic sets: none");
    }

    println!(
        "Primary provider: {}",
        provider_state(&config.primary_api_key, &config.primary_model)
    );
    println!(
        "Secondary provider: {}",
        provider_state(&config.secondary_api_key, &config.secondary_model)
    );

    let recent = db.get_recent_analyses(5).await?;
    display_recent_analyses(&recent);

    Ok(())
}

/// Whether the status command has anything to show yet.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn provider_state(api_key: &str, model: &str) -> String {
    if api_key.is_empty() {
        "not configured".dimmed().to_string()
    } else {
        format!("{} ({model})", "configured".green())
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
