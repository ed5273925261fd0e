// Secondary provider — OpenAI-compatible chat completions.
//
// Cheaper and faster than the primary, and much less disciplined about
// output format, so its reply goes through the tolerant parser. An explicit
// empty topic list is an empty result; any other unparseable but non-empty
// reply becomes one general topic.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ProviderError;
use super::http::{send_json, USER_AGENT};
use super::model::{ExtractionMethod, Topic};
use super::parser::{general_topic, parse_topics, ParsedTopics};
use super::prompt::{list_prompt, LIST_SYSTEM_PROMPT};
use super::retry::with_unavailable_retry;
use super::traits::TopicProvider;

pub const DEFAULT_SECONDARY_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SECONDARY_MODEL: &str = "gpt-4o-mini";
const PROVIDER: &str = "secondary";

/// Secondary topic provider backed by a chat-completions endpoint.
pub struct ChatCompletionsProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_delay: Duration,
    max_topics: usize,
}

impl ChatCompletionsProvider {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: DEFAULT_SECONDARY_URL.to_string(),
            model: model.to_string(),
            retry_delay: Duration::from_secs(2),
            max_topics: 5,
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics;
        self
    }

    async fn call_once(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request);
        send_json(PROVIDER, builder).await
    }
}

#[async_trait]
impl TopicProvider for ChatCompletionsProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn extract(&self, comments: &[String]) -> Result<Vec<Topic>, ProviderError> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.2,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: LIST_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: list_prompt(comments, self.max_topics),
                },
            ],
        };

        debug!(model = %self.model, comments = comments.len(), "Secondary extraction request");

        let response =
            with_unavailable_retry(self.retry_delay, || self.call_once(&request)).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let method = ExtractionMethod::SecondaryFallback;
        match parse_topics(&text, method) {
            ParsedTopics::Parsed(topics) => Ok(topics),
            ParsedTopics::Unparseable => {
                info!(
                    reply_chars = text.chars().count(),
                    "Secondary reply had no recognizable topic list, using general topic"
                );
                Ok(general_topic(&text, comments.len(), method)
                    .into_iter()
                    .collect())
            }
        }
    }
}

// --- Chat completions request/response types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
