// Primary provider — Anthropic Messages API.
//
// The higher-quality tier. Asks the model for a strict JSON payload and
// parses the first JSON object in the reply. A reply with no parseable JSON
// is a failure (Malformed), which lets the orchestrator shrink the batch and
// try again; a parsed payload with zero topics is a normal empty result.
//
// API docs: https://docs.anthropic.com/en/api/messages

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ProviderError;
use super::http::{send_json, USER_AGENT};
use super::model::{ExtractionMethod, Topic};
use super::parser::extract_json_topics;
use super::prompt::{json_prompt, JSON_SYSTEM_PROMPT};
use super::retry::with_unavailable_retry;
use super::traits::TopicProvider;

pub const DEFAULT_PRIMARY_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_PRIMARY_MODEL: &str = "claude-3-5-sonnet-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "primary";

/// Primary topic provider backed by the Messages API.
pub struct MessagesProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_delay: Duration,
    max_topics: usize,
}

impl MessagesProvider {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: DEFAULT_PRIMARY_URL.to_string(),
            model: model.to_string(),
            retry_delay: Duration::from_secs(2),
            max_topics: 5,
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Delay before the single retry on a "temporarily unavailable" response.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics;
        self
    }

    async fn call_once(&self, request: &MessagesRequest) -> Result<MessagesResponse, ProviderError> {
        let builder = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request);
        send_json(PROVIDER, builder).await
    }
}

#[async_trait]
impl TopicProvider for MessagesProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn extract(&self, comments: &[String]) -> Result<Vec<Topic>, ProviderError> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            system: JSON_SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: json_prompt(comments, self.max_topics),
            }],
        };

        debug!(model = %self.model, comments = comments.len(), "Primary extraction request");

        let response =
            with_unavailable_retry(self.retry_delay, || self.call_once(&request)).await?;

        let text: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        let raw = extract_json_topics(&text).ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER,
            reason: "reply contained no JSON topic payload".to_string(),
        })?;

        let topics: Vec<Topic> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| r.into_topic(i, ExtractionMethod::Primary))
            .collect();

        debug!(topics = topics.len(), "Primary extraction parsed");
        Ok(topics)
    }
}

// --- Messages API request/response types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
