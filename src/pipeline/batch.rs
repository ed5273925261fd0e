// Batch analysis — run many posts through the service with bounded parallelism.
//
// Same shape as any fan-out over independent work items: a stream of
// futures, buffer_unordered(concurrency), one progress bar tick per post.

use std::collections::BTreeMap;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::service::TopicService;
use crate::db::models::AnalysisReport;

/// Tally of a batch run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Report count per method tag
    pub by_method: BTreeMap<String, usize>,
}

impl BatchSummary {
    pub fn from_reports(results: &[(String, AnalysisReport)]) -> Self {
        let mut summary = Self::default();
        for (_, report) in results {
            if report.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            *summary.by_method.entry(report.method.clone()).or_insert(0) += 1;
        }
        summary
    }
}

/// Analyze every post, at most `concurrency` at a time.
///
/// Results come back in completion order, paired with their post ids.
pub async fn analyze_many(
    service: &TopicService,
    post_ids: Vec<String>,
    concurrency: usize,
    show_progress: bool,
) -> Result<Vec<(String, AnalysisReport)>> {
    let pb = if show_progress {
        let pb = ProgressBar::new(post_ids.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar().template("  Analyzing [{bar:30}] {pos}/{len} ({eta})")?,
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<(String, AnalysisReport)> =
        stream::iter(post_ids.into_iter().map(|post_id| {
            let pb = &pb;
            async move {
                let report = service.analyze(&post_id).await;
                pb.inc(1);
                (post_id, report)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    pb.finish_and_clear();
    info!(posts = results.len(), concurrency, "Batch analysis complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(success: bool, method: &str) -> (String, AnalysisReport) {
        (
            "p".to_string(),
            AnalysisReport {
                success,
                topic_count: if success { 3 } else { 0 },
                processing_time_ms: 1,
                method: method.to_string(),
                error: None,
            },
        )
    }

    #[test]
    fn test_summary_counts_by_method() {
        let results = vec![
            report(true, "primary"),
            report(true, "primary"),
            report(true, "basic-fallback"),
            report(false, "no-comments"),
        ];
        let summary = BatchSummary::from_reports(&results);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.by_method.get("primary"), Some(&2));
        assert_eq!(summary.by_method.get("no-comments"), Some(&1));
    }
}
