// Topic — the unit of output for every extraction tier.
//
// Providers create topics, the orchestrator ranks and truncates them, and the
// result store owns them afterwards. Scores are always normalized into [0, 1]
// before a topic leaves a provider.

use serde::{Deserialize, Serialize};

/// Which tier (or terminal path) produced a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    /// The higher-quality remote provider answered.
    Primary,
    /// Primary exhausted its attempts; the cheaper remote provider answered.
    SecondaryFallback,
    /// Both remote providers failed; local frequency counting answered.
    BasicFallback,
    /// Fewer than three usable comments; no provider was called.
    InsufficientData,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Primary => "primary",
            ExtractionMethod::SecondaryFallback => "secondary-fallback",
            ExtractionMethod::BasicFallback => "basic-fallback",
            ExtractionMethod::InsufficientData => "insufficient-data",
        }
    }

}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Share of positive / neutral / negative sentiment among a topic's comments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl Default for SentimentDistribution {
    fn default() -> Self {
        Self {
            positive: 0.0,
            neutral: 1.0,
            negative: 0.0,
        }
    }
}

impl SentimentDistribution {
    /// Clamp negatives to zero and rescale so the three shares sum to 1.0.
    /// An all-zero (or non-finite) distribution becomes fully neutral.
    pub fn normalized(self) -> Self {
        let clean = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let (p, n, g) = (clean(self.positive), clean(self.neutral), clean(self.negative));
        let total = p + n + g;
        if total < f64::EPSILON {
            return Self::default();
        }
        Self {
            positive: p / total,
            neutral: n / total,
            negative: g / total,
        }
    }
}

/// A single extracted topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub label: String,
    pub description: String,
    /// Distinct keywords, in the order the provider reported them
    pub keywords: Vec<String>,
    /// How important the topic is within the comment batch (0.0 to 1.0)
    pub relevance_score: f64,
    /// How sure the producing tier is about the topic (0.0 to 1.0)
    pub confidence_score: f64,
    /// Number of comments that discuss the topic
    pub comment_count: u32,
    pub sentiment_distribution: SentimentDistribution,
    pub extraction_method: ExtractionMethod,
    /// Language code reported by the provider, if it reported one
    pub detected_language: Option<String>,
}

impl Topic {
    /// Combined score used for ranking: relevance plus confidence.
    pub fn combined_score(&self) -> f64 {
        self.relevance_score + self.confidence_score
    }

    /// Enforce the value ranges every stored topic must satisfy.
    pub fn normalized(mut self) -> Self {
        self.label = self.label.trim().to_string();
        self.description = self.description.trim().to_string();
        self.relevance_score = clamp_unit(self.relevance_score);
        self.confidence_score = clamp_unit(self.confidence_score);
        self.sentiment_distribution = self.sentiment_distribution.normalized();
        self.keywords = dedup_keywords(std::mem::take(&mut self.keywords));
        self.detected_language = self
            .detected_language
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty() && l != "unknown");
        self
    }

    /// Re-tag a topic with the method of the tier that ended up answering.
    pub fn with_method(mut self, method: ExtractionMethod) -> Self {
        self.extraction_method = method;
        self
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Lowercase, trim, and drop empty or repeated keywords, keeping first-seen order.
fn dedup_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}
