// Topic ranking and truncation.
//
// Combined score = relevance + confidence. Sorting is stable, so topics with
// equal scores keep the order the provider returned them in.

use super::model::Topic;

/// Smallest and largest number of topics kept per post.
pub const MIN_KEPT_TOPICS: usize = 3;
pub const MAX_KEPT_TOPICS: usize = 5;

/// Sort by combined score (descending) and keep the top `limit`.
///
/// `limit` is clamped into `MIN_KEPT_TOPICS..=MAX_KEPT_TOPICS`; fewer topics
/// than that are returned as-is, never padded.
pub fn rank_and_truncate(mut topics: Vec<Topic>, limit: usize) -> Vec<Topic> {
    let limit = limit.clamp(MIN_KEPT_TOPICS, MAX_KEPT_TOPICS);
    topics.sort_by(|a, b| {
        b.combined_score()
            .partial_cmp(&a.combined_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    topics.truncate(limit);
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::model::{ExtractionMethod, SentimentDistribution};

    fn topic(label: &str, relevance: f64, confidence: f64) -> Topic {
        Topic {
            label: label.to_string(),
            description: String::new(),
            keywords: vec![],
            relevance_score: relevance,
            confidence_score: confidence,
            comment_count: 0,
            sentiment_distribution: SentimentDistribution::default(),
            extraction_method: ExtractionMethod::Primary,
            detected_language: None,
        }
    }

    fn labels(topics: &[Topic]) -> Vec<&str> {
        topics.iter().map(|t| t.label.as_str()).collect()
    }

    #[test]
    fn test_sorted_by_combined_score() {
        let ranked = rank_and_truncate(
            vec![topic("low", 0.1, 0.1), topic("high", 0.9, 0.9), topic("mid", 0.5, 0.5)],
            5,
        );
        assert_eq!(labels(&ranked), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let ranked = rank_and_truncate(
            vec![
                topic("a", 0.5, 0.25),
                topic("b", 0.25, 0.5),
                topic("c", 0.9, 0.9),
                topic("d", 0.75, 0.0),
            ],
            5,
        );
        assert_eq!(labels(&ranked), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let topics: Vec<Topic> = (0..8).map(|i| topic(&i.to_string(), i as f64 / 10.0, 0.0)).collect();
        assert_eq!(rank_and_truncate(topics.clone(), 5).len(), 5);
        assert_eq!(rank_and_truncate(topics.clone(), 3).len(), 3);
        // Out-of-range limits are clamped
        assert_eq!(rank_and_truncate(topics.clone(), 1).len(), 3);
        assert_eq!(rank_and_truncate(topics, 20).len(), 5);
    }

    #[test]
    fn test_short_lists_not_padded() {
        let ranked = rank_and_truncate(vec![topic("only", 0.3, 0.3)], 5);
        assert_eq!(ranked.len(), 1);
    }
}
