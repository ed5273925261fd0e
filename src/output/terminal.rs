// Colored terminal output for topic sets, analysis reports, and repairs.

use colored::Colorize;

use crate::db::models::{AnalysisLogEntry, AnalysisReport, ReconcileReport, StoredTopic};
use crate::pipeline::batch::BatchSummary;

/// Display a post's stored topic set.
pub fn display_topics(post_id: &str, topics: &[StoredTopic]) {
    if topics.is_empty() {
        println!("No topics stored for {post_id}. Run `murmur analyze {post_id}` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Topics for {post_id} ({}) ===", topics.len()).bold()
    );
    if let Some(first) = topics.first() {
        println!(
            "  {}",
            format!("method: {}  |  stored: {}", first.extracted_method, first.created_at).dimmed()
        );
    }
    println!();

    for (i, topic) in topics.iter().enumerate() {
        println!(
            "  {}. {}  {}",
            i + 1,
            topic.topic_label.bold(),
            format!(
                "[rel {:.2} | conf {:.2} | {} comments]",
                topic.relevance_score, topic.confidence_score, topic.comment_count
            )
            .dimmed()
        );
        if !topic.topic_description.is_empty() {
            println!("     {}", super::truncate_chars(&topic.topic_description, 120));
        }
        if !topic.keywords.is_empty() {
            println!("     keywords: {}", topic.keywords.join(", ").cyan());
        }

        let s = &topic.sentiment_distribution;
        println!(
            "     sentiment: {} {} {}",
            format!("+{:.0}%", s.positive * 100.0).green(),
            format!("={:.0}%", s.neutral * 100.0).normal(),
            format!("-{:.0}%", s.negative * 100.0).red(),
        );
    }
}

/// Display the outcome of one analysis.
pub fn display_report(post_id: &str, report: &AnalysisReport) {
    let status = if report.success {
        "ok".green().bold()
    } else {
        "failed".red().bold()
    };
    println!(
        "{post_id}: {status}  method={}  topics={}  ({} ms)",
        colorize_method(&report.method),
        report.topic_count,
        report.processing_time_ms
    );
    if let Some(error) = &report.error {
        println!("  {}", error.yellow());
    }
}

/// Display the tally of a batch run.
pub fn display_batch_summary(summary: &BatchSummary) {
    println!("\n{}", "Batch complete.".bold());
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed:    {}", summary.failed);
    for (method, count) in &summary.by_method {
        println!("    {:<20} {count}", colorize_method(method));
    }
}

/// Display what a reconciliation pass repaired.
pub fn display_reconcile(report: &ReconcileReport) {
    if report.posts_repaired == 0 {
        println!("{}", "No duplicate topic sets found.".green());
    } else {
        println!(
            "Repaired {} posts ({} superseded rows removed)",
            report.posts_repaired.to_string().bold(),
            report.rows_deleted
        );
    }
}

/// Display recently logged analyses, newest first.
pub fn display_recent_analyses(entries: &[AnalysisLogEntry]) {
    if entries.is_empty() {
        println!("Recent analyses: none yet");
        return;
    }
    println!("Recent analyses:");
    for entry in entries {
        let mark = if entry.report.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {mark} {:<24} {:<20} {} topics  ({})",
            entry.post_id,
            colorize_method(&entry.report.method),
            entry.report.topic_count,
            entry.analyzed_at.dimmed()
        );
    }
}

fn colorize_method(method: &str) -> String {
    match method {
        "primary" => method.green().to_string(),
        "secondary-fallback" => method.cyan().to_string(),
        "basic-fallback" | "insufficient-data" => method.yellow().to_string(),
        "error-fallback" | "aborted" => method.red().to_string(),
        _ => method.dimmed().to_string(),
    }
}
