// Provider errors — the failure taxonomy the orchestrator branches on.
//
// Most of the crate uses anyhow, but the cascade needs to tell an overloaded
// provider (worth one more try) from a credentials problem (never worth
// retrying), so provider calls return this typed error instead.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// 5xx-class response; the service may recover shortly.
    #[error("{provider} temporarily unavailable (HTTP {status})")]
    Unavailable { provider: &'static str, status: u16 },

    /// The call did not finish before the orchestrator's deadline.
    #[error("{provider} timed out after {elapsed:?}")]
    Timeout {
        provider: &'static str,
        elapsed: Duration,
    },

    /// Credentials were rejected (401/403).
    #[error("{provider} rejected the API credentials (HTTP {status})")]
    Auth { provider: &'static str, status: u16 },

    /// No API key configured for this tier.
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },

    /// Any other non-success response.
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The request never produced a response (DNS, connect, reset, ...).
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// A response arrived but its body wasn't usable.
    #[error("{provider} returned a malformed response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },
}

impl ProviderError {
    /// Build the right variant for a non-success HTTP status.
    pub fn from_status(provider: &'static str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Auth { provider, status },
            429 | 500..=599 => ProviderError::Unavailable { provider, status },
            _ => ProviderError::Http {
                provider,
                status,
                body,
            },
        }
    }

    /// "Temporarily unavailable" responses get one delayed retry inside the
    /// provider. Other server errors fail fast and are left to the cascade.
    pub fn is_temporarily_unavailable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable {
                status: 502 | 503 | 529,
                ..
            }
        )
    }

    /// Credential problems are not retried at all.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ProviderError::Auth { .. } | ProviderError::NotConfigured { .. }
        )
    }

    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Unavailable { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Auth { provider, .. }
            | ProviderError::NotConfigured { provider }
            | ProviderError::Http { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Malformed { provider, .. } => *provider,
        }
    }
}
