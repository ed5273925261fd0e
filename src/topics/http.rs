// HTTP plumbing shared by the remote providers.
//
// Maps every way a POST can go wrong onto ProviderError so the retry helper
// and the orchestrator can classify failures without string matching.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ProviderError;

/// User agent sent to every inference API.
pub const USER_AGENT: &str = "murmur/0.1 (topic-extraction)";

/// Send a prepared request and deserialize a JSON success body.
pub async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(provider, status = status.as_u16(), "Provider returned an error status");
        return Err(ProviderError::from_status(provider, status.as_u16(), body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Malformed {
            provider,
            reason: e.to_string(),
        })
}
