use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::topics::primary::{DEFAULT_PRIMARY_MODEL, DEFAULT_PRIMARY_URL};
use crate::topics::secondary::{DEFAULT_SECONDARY_MODEL, DEFAULT_SECONDARY_URL};

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Primary (Messages API) credentials and endpoint
    pub primary_api_key: String,
    pub primary_url: String,
    pub primary_model: String,
    /// Secondary (chat-completions API) credentials and endpoint
    pub secondary_api_key: String,
    pub secondary_url: String,
    pub secondary_model: String,
    /// Deadline for each remote provider call
    pub provider_timeout: Duration,
    /// Delay before the single retry on a "temporarily unavailable" response
    pub retry_delay: Duration,
    /// Topics kept per post (clamped to 3..=5 when ranking)
    pub max_topics: usize,
    pub comment_cache_ttl: Duration,
    pub result_cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the API keys; a missing key only
    /// disables that provider tier.
    pub fn load() -> Result<Self> {
        Ok(Self {
            db_path: env::var("MURMUR_DB_PATH").unwrap_or_else(|_| "./murmur.db".to_string()),
            primary_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            primary_url: env::var("MURMUR_PRIMARY_URL")
                .unwrap_or_else(|_| DEFAULT_PRIMARY_URL.to_string()),
            primary_model: env::var("MURMUR_PRIMARY_MODEL")
                .unwrap_or_else(|_| DEFAULT_PRIMARY_MODEL.to_string()),
            secondary_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            secondary_url: env::var("MURMUR_SECONDARY_URL")
                .unwrap_or_else(|_| DEFAULT_SECONDARY_URL.to_string()),
            secondary_model: env::var("MURMUR_SECONDARY_MODEL")
                .unwrap_or_else(|_| DEFAULT_SECONDARY_MODEL.to_string()),
            provider_timeout: Duration::from_secs(parse_var("MURMUR_PRIMARY_TIMEOUT_SECS", 25)?),
            retry_delay: Duration::from_millis(parse_var("MURMUR_RETRY_DELAY_MS", 2000)?),
            max_topics: parse_var("MURMUR_MAX_TOPICS", 5)?,
            comment_cache_ttl: Duration::from_secs(parse_var("MURMUR_COMMENT_CACHE_TTL_SECS", 300)?),
            result_cache_ttl: Duration::from_secs(parse_var("MURMUR_RESULT_CACHE_TTL_SECS", 60)?),
        })
    }

    /// Check that the primary provider's API key is configured.
    pub fn require_primary(&self) -> Result<()> {
        if self.primary_api_key.is_empty() {
            anyhow::bail!(
                "ANTHROPIC_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the secondary provider's API key is configured.
    pub fn require_secondary(&self) -> Result<()> {
        if self.secondary_api_key.is_empty() {
            anyhow::bail!(
                "OPENAI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }
}

/// Read a numeric env var, falling back to `default` when unset or blank.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_and_invalid() {
        // Names unique to this test so parallel tests don't collide
        assert_eq!(parse_var("MURMUR_TEST_UNSET_VALUE", 7u64).unwrap(), 7);

        env::set_var("MURMUR_TEST_BAD_VALUE", "soon");
        let err = parse_var("MURMUR_TEST_BAD_VALUE", 1u64).unwrap_err();
        assert!(err.to_string().contains("MURMUR_TEST_BAD_VALUE"));

        env::set_var("MURMUR_TEST_GOOD_VALUE", " 42 ");
        assert_eq!(parse_var("MURMUR_TEST_GOOD_VALUE", 1u64).unwrap(), 42);
    }
}
