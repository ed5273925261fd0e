// Tiered extraction orchestrator — primary, then secondary, then frequency.
//
// Each request walks an explicit state machine:
//
//   Gate ──(< 3 valid comments)──────────────────────────────▶ Done(insufficient-data)
//    │
//    ▼
//   Primary{attempt, batch} ──ok──▶ Done(primary)
//    │  error / timeout / empty: batch = max(batch / 2, 3), up to 3 attempts
//    │  auth / not configured: skip straight to Secondary
//    ▼
//   Secondary ──ok──▶ Done(secondary-fallback)
//    │  error / timeout / empty
//    ▼
//   Tertiary ─────▶ Done(basic-fallback)
//
// Every path ends in Done with at least one topic. Provider failures never
// escape this module.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::topics::error::ProviderError;
use crate::topics::frequency::FrequencyExtractor;
use crate::topics::model::{ExtractionMethod, SentimentDistribution, Topic};
use crate::topics::rank::rank_and_truncate;
use crate::topics::traits::TopicProvider;

/// Tunables for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    /// Deadline for a single primary or secondary call
    pub provider_timeout: Duration,
    pub max_primary_attempts: usize,
    /// Upper bound on the first primary batch
    pub initial_batch: usize,
    /// Floor for the shrinking primary batch
    pub min_batch: usize,
    /// Comments sent to the secondary provider (no shrinking)
    pub secondary_batch: usize,
    /// Topics kept after ranking
    pub max_topics: usize,
    /// Fewer valid comments than this short-circuits to insufficient-data
    pub min_valid_comments: usize,
    /// Only the first N valid comments of a request are considered
    pub max_sampled_comments: usize,
    /// A comment is valid when its trimmed text is longer than this
    pub min_comment_chars: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(25),
            max_primary_attempts: 3,
            initial_batch: 15,
            min_batch: 3,
            secondary_batch: 15,
            max_topics: 5,
            min_valid_comments: 3,
            max_sampled_comments: 30,
            min_comment_chars: 10,
        }
    }
}

/// Outcome of one orchestrated extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Ranked, truncated, never empty
    pub topics: Vec<Topic>,
    pub method: ExtractionMethod,
    /// Batch size of every primary attempt, in order
    pub primary_batches: Vec<usize>,
}

#[derive(Debug)]
enum Stage {
    Gate,
    Primary { attempt: usize, batch: usize },
    Secondary,
    Tertiary,
    Done(Extraction),
}

pub struct TieredExtractor {
    primary: Arc<dyn TopicProvider>,
    secondary: Arc<dyn TopicProvider>,
    tertiary: FrequencyExtractor,
    settings: ExtractionSettings,
}

impl TieredExtractor {
    pub fn new(primary: Arc<dyn TopicProvider>, secondary: Arc<dyn TopicProvider>) -> Self {
        Self {
            primary,
            secondary,
            tertiary: FrequencyExtractor::default(),
            settings: ExtractionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExtractionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run the cascade over a request's raw comment texts.
    pub async fn extract(&self, comments: &[String]) -> Extraction {
        let valid = self.valid_comments(comments);
        let mut primary_batches = Vec::new();
        let mut stage = Stage::Gate;

        loop {
            stage = match stage {
                Stage::Gate => {
                    if valid.len() < self.settings.min_valid_comments {
                        debug!(valid = valid.len(), "Too few valid comments for extraction");
                        Stage::Done(Extraction {
                            topics: vec![insufficient_data_topic(valid.len())],
                            method: ExtractionMethod::InsufficientData,
                            primary_batches: Vec::new(),
                        })
                    } else {
                        Stage::Primary {
                            attempt: 1,
                            batch: valid.len().min(self.settings.initial_batch),
                        }
                    }
                }

                Stage::Primary { attempt, batch } => {
                    primary_batches.push(batch);
                    match self.call(self.primary.as_ref(), &valid[..batch]).await {
                        Ok(topics) if !topics.is_empty() => Stage::Done(self.finish(
                            topics,
                            ExtractionMethod::Primary,
                            std::mem::take(&mut primary_batches),
                        )),
                        Err(e) if e.is_auth() => {
                            warn!(error = %e, "Primary provider unusable, skipping to secondary");
                            Stage::Secondary
                        }
                        outcome => {
                            match outcome {
                                Err(e) => warn!(attempt, batch, error = %e, "Primary attempt failed"),
                                Ok(_) => warn!(attempt, batch, "Primary attempt returned no topics"),
                            }
                            if attempt >= self.settings.max_primary_attempts {
                                Stage::Secondary
                            } else {
                                Stage::Primary {
                                    attempt: attempt + 1,
                                    batch: (batch / 2).max(self.settings.min_batch).min(batch),
                                }
                            }
                        }
                    }
                }

                Stage::Secondary => {
                    let batch = valid.len().min(self.settings.secondary_batch);
                    match self.call(self.secondary.as_ref(), &valid[..batch]).await {
                        Ok(topics) if !topics.is_empty() => Stage::Done(self.finish(
                            topics,
                            ExtractionMethod::SecondaryFallback,
                            std::mem::take(&mut primary_batches),
                        )),
                        Ok(_) => {
                            warn!(batch, "Secondary provider returned no topics");
                            Stage::Tertiary
                        }
                        Err(e) => {
                            warn!(batch, error = %e, "Secondary provider failed");
                            Stage::Tertiary
                        }
                    }
                }

                Stage::Tertiary => Stage::Done(self.finish(
                    self.tertiary.extract_topics(&valid),
                    ExtractionMethod::BasicFallback,
                    std::mem::take(&mut primary_batches),
                )),

                Stage::Done(extraction) => {
                    info!(
                        method = %extraction.method,
                        topics = extraction.topics.len(),
                        primary_batches = ?extraction.primary_batches,
                        "Extraction finished"
                    );
                    return extraction;
                }
            };
        }
    }

    /// Trimmed comments longer than the minimum, capped at the sample size.
    fn valid_comments(&self, comments: &[String]) -> Vec<String> {
        comments
            .iter()
            .map(|c| c.trim())
            .filter(|c| c.chars().count() > self.settings.min_comment_chars)
            .take(self.settings.max_sampled_comments)
            .map(str::to_string)
            .collect()
    }

    /// One provider call raced against the deadline. The losing future is dropped.
    async fn call(
        &self,
        provider: &dyn TopicProvider,
        batch: &[String],
    ) -> Result<Vec<Topic>, ProviderError> {
        let deadline = self.settings.provider_timeout;
        match tokio::time::timeout(deadline, provider.extract(batch)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.name(),
                elapsed: deadline,
            }),
        }
    }

    fn finish(
        &self,
        topics: Vec<Topic>,
        method: ExtractionMethod,
        primary_batches: Vec<usize>,
    ) -> Extraction {
        let topics = topics
            .into_iter()
            .map(|t| t.normalized().with_method(method))
            .collect();
        Extraction {
            topics: rank_and_truncate(topics, self.settings.max_topics),
            method,
            primary_batches,
        }
    }
}

/// The single placeholder topic for posts with too few usable comments.
fn insufficient_data_topic(valid_comments: usize) -> Topic {
    Topic {
        label: "Insufficient Data".to_string(),
        description: "Not enough comments to identify discussion topics".to_string(),
        keywords: Vec::new(),
        relevance_score: 0.1,
        confidence_score: 0.1,
        comment_count: valid_comments as u32,
        sentiment_distribution: SentimentDistribution::default(),
        extraction_method: ExtractionMethod::InsufficientData,
        detected_language: None,
    }
}
