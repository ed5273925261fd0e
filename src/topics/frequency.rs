// Frequency-count topic extraction — the last-resort tier.
//
// Pure local computation: count non-stopword tokens across all comments, keep
// the ones that repeat, and report the top three as the keywords of a single
// generic topic. No network, no model, no failure path. Whatever happens to
// the remote providers, this tier always produces a topic.

use std::collections::{HashMap, HashSet};

use stop_words::{get, LANGUAGE};

use super::model::{ExtractionMethod, SentimentDistribution, Topic};

/// Tokens shorter than this are ignored (articles, "ok", emoji fragments).
const MIN_TOKEN_LEN: usize = 3;

/// Deterministic keyword-frequency extractor.
pub struct FrequencyExtractor {
    stop_words: HashSet<String>,
    /// Minimum number of occurrences for a token to count as a keyword
    pub min_occurrences: usize,
    /// Number of keywords reported on the generic topic
    pub keyword_count: usize,
}

impl Default for FrequencyExtractor {
    fn default() -> Self {
        let stop_words: Vec<String> = get(LANGUAGE::English);
        Self {
            stop_words: stop_words.into_iter().collect(),
            min_occurrences: 2,
            keyword_count: 3,
        }
    }
}

impl FrequencyExtractor {
    /// Extract the single generic topic. Infallible by construction.
    pub fn extract_topics(&self, comments: &[String]) -> Vec<Topic> {
        let keywords: Vec<String> = self
            .ranked_terms(comments)
            .into_iter()
            .filter(|(_, count)| *count >= self.min_occurrences)
            .take(self.keyword_count)
            .map(|(term, _)| term)
            .collect();

        if keywords.is_empty() {
            return vec![placeholder_topic(comments.len())];
        }

        let mentioning = comments
            .iter()
            .filter(|c| {
                let tokens: HashSet<String> = tokenize(c).collect();
                keywords.iter().any(|k| tokens.contains(k))
            })
            .count();

        vec![Topic {
            label: keywords.join(" / "),
            description: format!("Frequently mentioned terms: {}", keywords.join(", ")),
            keywords,
            relevance_score: 0.5,
            confidence_score: 0.3,
            comment_count: mentioning as u32,
            sentiment_distribution: SentimentDistribution::default(),
            extraction_method: ExtractionMethod::BasicFallback,
            detected_language: None,
        }]
    }

    /// Non-stopword terms with their occurrence counts, most frequent first.
    /// Ties keep first-seen order so the output is stable for a given input.
    pub fn ranked_terms(&self, texts: &[String]) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut next_index = 0usize;

        for token in texts.iter().flat_map(|t| tokenize(t)) {
            if self.stop_words.contains(&token) {
                continue;
            }
            let entry = counts.entry(token).or_insert_with(|| {
                next_index += 1;
                (0, next_index)
            });
            entry.0 += 1;
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(term, (count, first_seen))| (term, count, first_seen))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.into_iter().map(|(term, count, _)| (term, count)).collect()
    }
}

/// Lowercased alphanumeric tokens of at least `MIN_TOKEN_LEN` characters,
/// skipping pure numbers.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| t.to_lowercase())
}

/// Fixed topic used when no term repeats across the comments.
fn placeholder_topic(comment_count: usize) -> Topic {
    Topic {
        label: "General Discussion".to_string(),
        description: "Comments cover a mix of subjects with no recurring terms".to_string(),
        keywords: vec![],
        relevance_score: 0.3,
        confidence_score: 0.2,
        comment_count: comment_count as u32,
        sentiment_distribution: SentimentDistribution::default(),
        extraction_method: ExtractionMethod::BasicFallback,
        detected_language: None,
    }
}
