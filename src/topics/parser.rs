// Parser for free-text provider replies.
//
// The cheaper secondary model doesn't reliably follow a JSON schema. Replies
// range from clean JSON to markdown lists like:
//
//   1. **Shipping delays** - customers waiting weeks for orders
//      Keywords: shipping, delay, tracking
//      Relevance: 0.8
//      Sentiment: positive 0.1, neutral 0.3, negative 0.6
//
// parse_topics() tries JSON first, then numbered sections. A JSON payload
// with an empty topic list parses to no topics. When neither yields anything
// the caller gets `Unparseable` and decides explicitly whether to synthesize
// a general topic from the raw text.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Deserialize;

use super::frequency::FrequencyExtractor;
use super::model::{ExtractionMethod, SentimentDistribution, Topic};
use crate::output::truncate_chars;

/// Outcome of parsing a provider reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTopics {
    Parsed(Vec<Topic>),
    Unparseable,
}

/// Parse a textual reply into topics tagged with `method`.
pub fn parse_topics(text: &str, method: ExtractionMethod) -> ParsedTopics {
    if let Some(raw) = extract_json_topics(text) {
        // An explicit empty list means the model found no topics
        if raw.is_empty() {
            return ParsedTopics::Parsed(Vec::new());
        }
        let topics: Vec<Topic> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| r.into_topic(i, method))
            .collect();
        if !topics.is_empty() {
            return ParsedTopics::Parsed(topics);
        }
    }

    let topics = parse_numbered_sections(text, method);
    if topics.is_empty() {
        ParsedTopics::Unparseable
    } else {
        ParsedTopics::Parsed(topics)
    }
}

/// Best-effort single topic built from an unparseable reply.
///
/// Returns `None` for a blank reply.
pub fn general_topic(text: &str, comment_count: usize, method: ExtractionMethod) -> Option<Topic> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let keywords: Vec<String> = FrequencyExtractor::default()
        .ranked_terms(&[trimmed.to_string()])
        .into_iter()
        .take(5)
        .map(|(term, _)| term)
        .collect();

    Some(
        Topic {
            label: "General Discussion".to_string(),
            description: truncate_chars(&collapse_whitespace(trimmed), 200),
            keywords,
            relevance_score: 0.5,
            confidence_score: 0.3,
            comment_count: comment_count as u32,
            sentiment_distribution: SentimentDistribution::default(),
            extraction_method: method,
            detected_language: None,
        }
        .normalized(),
    )
}

// --- JSON replies ---

/// Loosely-typed topic as providers actually return it. Field names vary
/// between models, hence the aliases.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawTopic {
    #[serde(alias = "topic", alias = "name", alias = "title")]
    label: String,
    #[serde(alias = "summary")]
    description: String,
    #[serde(alias = "key_terms")]
    keywords: Vec<String>,
    #[serde(alias = "relevance")]
    relevance_score: Option<f64>,
    #[serde(alias = "confidence")]
    confidence_score: Option<f64>,
    #[serde(alias = "comments", alias = "mentions")]
    comment_count: Option<u32>,
    #[serde(alias = "sentiment_distribution")]
    sentiment: Option<SentimentDistribution>,
    #[serde(alias = "detected_language", alias = "lang")]
    language: Option<String>,
}

impl RawTopic {
    /// Convert into a normalized `Topic`; `None` when the label is blank.
    pub(crate) fn into_topic(self, position: usize, method: ExtractionMethod) -> Option<Topic> {
        if self.label.trim().is_empty() {
            return None;
        }
        Some(
            Topic {
                label: self.label,
                description: self.description,
                keywords: self.keywords,
                relevance_score: self
                    .relevance_score
                    .map(unit_score)
                    .unwrap_or_else(|| positional_relevance(position)),
                confidence_score: self.confidence_score.map(unit_score).unwrap_or(0.6),
                comment_count: self.comment_count.unwrap_or(0),
                sentiment_distribution: self.sentiment.unwrap_or_default(),
                extraction_method: method,
                detected_language: self.language,
            }
            .normalized(),
        )
    }
}

#[derive(Deserialize)]
struct TopicEnvelope {
    topics: Vec<RawTopic>,
}

/// Find a JSON topic payload inside a reply: either `{"topics": [...]}` or a
/// bare array, optionally wrapped in prose or a markdown code fence.
pub(crate) fn extract_json_topics(text: &str) -> Option<Vec<RawTopic>> {
    if let Some(obj) = slice_between(text, '{', '}') {
        if let Ok(envelope) = serde_json::from_str::<TopicEnvelope>(obj) {
            return Some(envelope.topics);
        }
    }
    if let Some(arr) = slice_between(text, '[', ']') {
        if let Ok(list) = serde_json::from_str::<Vec<RawTopic>>(arr) {
            return Some(list);
        }
    }
    None
}

/// The substring from the first `open` to the last `close`, inclusive.
fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

// --- Numbered-section replies ---

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:#{1,6}\s*)?(?:\*\*)?(?:Topic\s+)?(\d{1,2})[.):]\*{0,2}\s+(.+)$")
            .expect("valid header regex")
    })
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•]\s*)?\**([A-Za-z][A-Za-z ]{1,24}?)\**\s*[:=]\s*(.+)$")
            .expect("valid field regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(%?)").expect("valid number regex"))
}

#[derive(Default)]
struct Section {
    label: String,
    description: String,
    keywords: Vec<String>,
    relevance: Option<f64>,
    confidence: Option<f64>,
    comment_count: Option<u32>,
    sentiment: Option<SentimentDistribution>,
    language: Option<String>,
}

fn parse_numbered_sections(text: &str, method: ExtractionMethod) -> Vec<Topic> {
    let mut sections: Vec<Section> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = header_re().captures(line) {
            let (label, description) = split_header(&caps[2]);
            sections.push(Section {
                label,
                description,
                ..Section::default()
            });
            continue;
        }

        let Some(current) = sections.last_mut() else {
            continue;
        };

        if let Some(caps) = field_re().captures(line) {
            apply_field(current, &caps[1], &caps[2]);
        } else if current.description.is_empty() && !line.trim().is_empty() {
            current.description = strip_markup(line);
        }
    }

    sections
        .into_iter()
        .filter(|s| !s.label.is_empty())
        .enumerate()
        .map(|(i, s)| {
            Topic {
                label: s.label,
                description: s.description,
                keywords: s.keywords,
                relevance_score: s.relevance.unwrap_or_else(|| positional_relevance(i)),
                confidence_score: s.confidence.unwrap_or(0.6),
                comment_count: s.comment_count.unwrap_or(0),
                sentiment_distribution: s.sentiment.unwrap_or_default(),
                extraction_method: method,
                detected_language: s.language,
            }
            .normalized()
        })
        .collect()
}

/// Split a section header into label and inline description.
fn split_header(raw: &str) -> (String, String) {
    let cleaned = strip_markup(raw);
    let cleaned = cleaned
        .strip_prefix("Topic:")
        .or_else(|| cleaned.strip_prefix("Topic -"))
        .map(str::trim)
        .unwrap_or(cleaned.as_str());

    for sep in [" - ", " – ", " — ", ": "] {
        if let Some((label, desc)) = cleaned.split_once(sep) {
            return (label.trim().to_string(), desc.trim().to_string());
        }
    }
    (cleaned.trim().to_string(), String::new())
}

fn apply_field(section: &mut Section, key: &str, value: &str) {
    let value = strip_markup(value);
    match key.trim().to_lowercase().as_str() {
        "topic" | "label" | "name" | "title" => section.label = value,
        "description" | "summary" => section.description = value,
        "keywords" | "key terms" | "terms" => {
            section.keywords = value
                .split([',', ';'])
                .map(|k| k.trim().trim_matches('"').to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
        "relevance" | "relevance score" => section.relevance = first_number(&value).map(unit_score),
        "confidence" | "confidence score" => {
            section.confidence = first_number(&value).map(unit_score)
        }
        "comments" | "comment count" | "mentions" => {
            section.comment_count = first_number(&value).map(|n| n as u32)
        }
        "sentiment" | "sentiment distribution" => section.sentiment = parse_sentiment(&value),
        "language" | "detected language" => section.language = Some(value),
        _ => {}
    }
}

/// Parse either "positive 0.2, neutral 0.5, negative 0.3" (any order, with
/// or without %) or a single dominant label like "mostly negative".
fn parse_sentiment(value: &str) -> Option<SentimentDistribution> {
    const LABELS: [&str; 3] = ["positive", "neutral", "negative"];
    let lower = value.to_lowercase();
    // A label's number must appear before the next separator or label
    let share = |name: &str| -> Option<f64> {
        let idx = lower.find(name)?;
        let rest = &lower[idx + name.len()..];
        let end = LABELS
            .iter()
            .filter_map(|label| rest.find(label))
            .chain(rest.find([',', ';', '\n']))
            .min()
            .unwrap_or(rest.len());
        first_number(&rest[..end])
    };

    let (p, n, g) = (share("positive"), share("neutral"), share("negative"));
    if p.is_some() || n.is_some() || g.is_some() {
        return Some(SentimentDistribution {
            positive: p.unwrap_or(0.0),
            neutral: n.unwrap_or(0.0),
            negative: g.unwrap_or(0.0),
        });
    }

    let dominant = |positive, neutral, negative| SentimentDistribution {
        positive,
        neutral,
        negative,
    };
    if lower.contains("mixed") {
        Some(dominant(0.4, 0.2, 0.4))
    } else if lower.contains("positive") {
        Some(dominant(0.7, 0.2, 0.1))
    } else if lower.contains("negative") {
        Some(dominant(0.1, 0.2, 0.7))
    } else if lower.contains("neutral") {
        Some(SentimentDistribution::default())
    } else {
        None
    }
}

/// First number in a string; a trailing `%` divides by 100.
fn first_number(value: &str) -> Option<f64> {
    let caps = number_re().captures(value)?;
    let n: f64 = caps[1].parse().ok()?;
    Some(if &caps[2] == "%" { n / 100.0 } else { n })
}

/// Scores sometimes arrive on a 0–10 or 0–100 scale. Values just over 1 are
/// an overshoot on the unit scale and clamp to 1.
fn unit_score(v: f64) -> f64 {
    if v > 10.0 {
        v / 100.0
    } else if v > 1.5 {
        v / 10.0
    } else {
        v.min(1.0)
    }
}

/// Relevance for topics the provider didn't score: earlier means more relevant.
fn positional_relevance(position: usize) -> f64 {
    (0.8 - 0.1 * position as f64).max(0.3)
}

fn strip_markup(s: &str) -> String {
    s.replace("**", "").replace('`', "").trim().to_string()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHOD: ExtractionMethod = ExtractionMethod::SecondaryFallback;

    fn parsed(text: &str) -> Vec<Topic> {
        match parse_topics(text, METHOD) {
            ParsedTopics::Parsed(t) => t,
            ParsedTopics::Unparseable => panic!("expected topics from {text:?}"),
        }
    }

    #[test]
    fn test_numbered_sections_with_fields() {
        let reply = "Here are the main topics:\n\
            1. **Shipping delays** - customers waiting weeks\n\
               Keywords: shipping, delay, tracking\n\
               Relevance: 0.8\n\
               Confidence: 70%\n\
               Comments: 12\n\
               Sentiment: positive 0.1, neutral 0.3, negative 0.6\n\
               Language: en\n\
            2. Product quality: praise for the fabric\n\
               Keywords: fabric; quality\n";

        let topics = parsed(reply);
        assert_eq!(topics.len(), 2);

        let first = &topics[0];
        assert_eq!(first.label, "Shipping delays");
        assert_eq!(first.description, "customers waiting weeks");
        assert_eq!(first.keywords, vec!["shipping", "delay", "tracking"]);
        assert!((first.relevance_score - 0.8).abs() < 1e-9);
        assert!((first.confidence_score - 0.7).abs() < 1e-9);
        assert_eq!(first.comment_count, 12);
        assert!((first.sentiment_distribution.negative - 0.6).abs() < 1e-9);
        assert_eq!(first.detected_language.as_deref(), Some("en"));
        assert_eq!(first.extraction_method, METHOD);

        let second = &topics[1];
        assert_eq!(second.label, "Product quality");
        assert_eq!(second.description, "praise for the fabric");
        assert_eq!(second.keywords, vec!["fabric", "quality"]);
        // Unscored topics get positional relevance
        assert!((second.relevance_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_topic_prefix_and_paren_numbering() {
        let reply = "1) Topic: Pricing\nSummary: people think it's too expensive\n\
                     2) Topic: Customer service\n";
        let topics = parsed(reply);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].label, "Pricing");
        assert_eq!(topics[0].description, "people think it's too expensive");
        assert_eq!(topics[1].label, "Customer service");
    }

    #[test]
    fn test_json_reply_in_code_fence() {
        let reply = "```json\n{\"topics\": [{\"topic\": \"Sizing\", \"summary\": \"runs small\", \
                     \"keywords\": [\"size\", \"fit\"], \"relevance\": 9, \"confidence\": 0.5, \
                     \"comments\": 4}]}\n```";
        let topics = parsed(reply);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].label, "Sizing");
        assert!((topics[0].relevance_score - 0.9).abs() < 1e-9);
        assert_eq!(topics[0].comment_count, 4);
    }

    #[test]
    fn test_bare_json_array() {
        let reply = r#"[{"label": "Colour", "keywords": ["red"]}, {"label": ""}]"#;
        let topics = parsed(reply);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].label, "Colour");
    }

    #[test]
    fn test_empty_json_topic_list_parses_to_nothing() {
        assert_eq!(
            parse_topics(r#"{"topics": []}"#, METHOD),
            ParsedTopics::Parsed(Vec::new())
        );
        assert_eq!(
            parse_topics("No clear themes.\n```json\n[]\n```", METHOD),
            ParsedTopics::Parsed(Vec::new())
        );
    }

    #[test]
    fn test_prose_is_unparseable() {
        let reply = "People mostly seem happy with the product and the delivery.";
        assert_eq!(parse_topics(reply, METHOD), ParsedTopics::Unparseable);
        assert_eq!(parse_topics("", METHOD), ParsedTopics::Unparseable);
    }

    #[test]
    fn test_general_topic_from_prose() {
        let reply = "People mostly seem happy with the delivery, delivery was quick.";
        let topic = general_topic(reply, 9, METHOD).unwrap();
        assert_eq!(topic.label, "General Discussion");
        assert_eq!(topic.comment_count, 9);
        assert_eq!(topic.keywords.first().map(String::as_str), Some("delivery"));
        assert!(topic.description.starts_with("People mostly"));
    }

    #[test]
    fn test_general_topic_blank_is_none() {
        assert!(general_topic("   \n ", 3, METHOD).is_none());
    }

    #[test]
    fn test_sentiment_labels() {
        let s = parse_sentiment("Mostly negative").unwrap();
        assert!(s.negative > s.positive);
        let s = parse_sentiment("neutral 50%, positive 50%").unwrap();
        assert!((s.neutral - 0.5).abs() < 1e-9);
        assert!((s.positive - 0.5).abs() < 1e-9);
        assert!(parse_sentiment("unclear").is_none());
    }

    #[test]
    fn test_sentiment_number_stays_with_its_label() {
        let s = parse_sentiment("positive, neutral 0.5, negative 0.5").unwrap();
        assert_eq!(s.positive, 0.0);
        assert!((s.neutral - 0.5).abs() < 1e-9);
        assert!((s.negative - 0.5).abs() < 1e-9);

        let s = parse_sentiment("positive: 20% neutral: 50% negative: 30%").unwrap();
        assert!((s.positive - 0.2).abs() < 1e-9);
        assert!((s.negative - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unit_score_scales() {
        assert!((unit_score(0.4) - 0.4).abs() < 1e-9);
        assert!((unit_score(7.0) - 0.7).abs() < 1e-9);
        assert!((unit_score(85.0) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_unit_score_clamps_small_overshoot() {
        assert_eq!(unit_score(1.2), 1.0);
        assert_eq!(unit_score(1.5), 1.0);
        assert!((unit_score(2.0) - 0.2).abs() < 1e-9);
    }
}
