// Topic provider trait — the swap-ready abstraction for every extraction tier.
//
// The orchestrator only sees this trait, so the remote providers can be
// replaced (or faked in tests) without touching the cascade logic.

use async_trait::async_trait;

use super::error::ProviderError;
use super::model::Topic;

/// Trait for turning a batch of comment texts into topics.
///
/// Implementations must return `Ok(vec![])` when they find nothing; an empty
/// result is a normal outcome, not a failure.
#[async_trait]
pub trait TopicProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Extract topics from the given comments.
    async fn extract(&self, comments: &[String]) -> Result<Vec<Topic>, ProviderError>;
}

/// Stand-in for a remote tier whose API key isn't set.
///
/// Always fails with `NotConfigured`, which the orchestrator treats like a
/// credentials failure and skips without retrying.
pub struct UnconfiguredProvider {
    name: &'static str,
}

impl UnconfiguredProvider {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl TopicProvider for UnconfiguredProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn extract(&self, _comments: &[String]) -> Result<Vec<Topic>, ProviderError> {
        Err(ProviderError::NotConfigured {
            provider: self.name,
        })
    }
}
