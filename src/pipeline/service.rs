// Topic service — the entry point callers use to analyze a post.
//
// analyze(post_id):
//   1. recent report cached? return it
//   2. join (or lead) the single in-flight run for post_id
//   3. resolve comments → none? report "no-comments"
//   4. run the tiered extractor
//   5. replace the post's topic set → failure? report "error-fallback"
//   6. log the report per post and cache it
//
// Callers always get a structured AnalysisReport, never an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use super::orchestrator::TieredExtractor;
use super::singleflight::SingleFlight;
use crate::cache::TtlCache;
use crate::comments::CommentResolver;
use crate::db::models::{AnalysisReport, StoredTopic};
use crate::db::Database;

/// Report tag for a post with no comments at any source.
pub const NO_COMMENTS: &str = "no-comments";
/// Report tag for an extraction whose result could not be stored.
pub const ERROR_FALLBACK: &str = "error-fallback";
/// Report tag for a joined caller whose leading run was dropped mid-flight.
pub const ABORTED: &str = "aborted";

pub struct TopicService {
    db: Arc<dyn Database>,
    resolver: CommentResolver,
    extractor: TieredExtractor,
    flights: Arc<SingleFlight<String, AnalysisReport>>,
    reports: TtlCache<AnalysisReport>,
}

impl TopicService {
    pub fn new(db: Arc<dyn Database>, resolver: CommentResolver, extractor: TieredExtractor) -> Self {
        Self {
            db,
            resolver,
            extractor,
            flights: Arc::new(SingleFlight::new()),
            reports: TtlCache::new(Duration::from_secs(60)),
        }
    }

    /// How long a successful report is served without re-running. Zero disables.
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.reports = TtlCache::new(ttl);
        self
    }

    /// Analyze a post, reusing a recent result or an in-flight run if there is one.
    pub async fn analyze(&self, post_id: &str) -> AnalysisReport {
        if let Some(report) = self.reports.get(post_id) {
            debug!(post_id, "Serving cached analysis report");
            return report;
        }

        let started = Instant::now();
        let outcome = self
            .flights
            .run_exclusive(post_id.to_string(), || async {
                // A run that finished between the check above and joining
                // the coordinator has already cached its report
                if let Some(report) = self.reports.get(post_id) {
                    return Ok(report);
                }
                Ok(self.run_analysis(post_id).await)
            })
            .await;

        match outcome {
            Ok(report) => report,
            Err(e) => {
                warn!(post_id, error = %e, "Analysis run did not complete");
                AnalysisReport {
                    success: false,
                    topic_count: 0,
                    processing_time_ms: elapsed_ms(started),
                    method: ABORTED.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Drop any cached report for the post and analyze it again.
    pub async fn reanalyze(&self, post_id: &str) -> AnalysisReport {
        self.reports.remove(post_id);
        self.analyze(post_id).await
    }

    /// The post's stored topics, most relevant first.
    pub async fn get_topics(&self, post_id: &str) -> Result<Vec<StoredTopic>> {
        self.db.get_topics(post_id).await
    }

    /// Posts with a run currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.flights.in_flight_count()
    }

    async fn run_analysis(&self, post_id: &str) -> AnalysisReport {
        let started = Instant::now();
        info!(post_id, "Analyzing post");

        let comments = self.resolver.resolve(post_id).await;
        let report = if comments.is_empty() {
            info!(post_id, "No comments found");
            AnalysisReport {
                success: false,
                topic_count: 0,
                processing_time_ms: elapsed_ms(started),
                method: NO_COMMENTS.to_string(),
                error: Some("no comments found for post".to_string()),
            }
        } else {
            let texts: Vec<String> = comments.into_iter().map(|c| c.text).collect();
            let extraction = self.extractor.extract(&texts).await;

            match self.db.replace_topics(post_id, &extraction.topics).await {
                Ok(()) => AnalysisReport {
                    success: true,
                    topic_count: extraction.topics.len(),
                    processing_time_ms: elapsed_ms(started),
                    method: extraction.method.as_str().to_string(),
                    error: None,
                },
                Err(e) => {
                    error!(post_id, error = %e, "Failed to store topics");
                    AnalysisReport {
                        success: false,
                        topic_count: 0,
                        processing_time_ms: elapsed_ms(started),
                        method: ERROR_FALLBACK.to_string(),
                        error: Some(format!("{e:#}")),
                    }
                }
            }
        };

        if let Err(e) = self.db.record_analysis(post_id, &report).await {
            warn!(post_id, error = %e, "Failed to record analysis report");
        }

        if report.success {
            self.reports.insert(post_id, report.clone());
        }

        info!(
            post_id,
            success = report.success,
            method = %report.method,
            topics = report.topic_count,
            ms = report.processing_time_ms,
            "Analysis finished"
        );
        report
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
