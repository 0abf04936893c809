use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use super::models::Provider;

/// Confirms a plaintext key is currently accepted by the provider's live API.
/// A failed probe is data, not an error; callers record the boolean.
#[async_trait]
pub trait ProviderProbe: Send + Sync {
    async fn test_key(&self, provider: Provider, api_key: &str) -> bool;
}

/// Pass-through "list models" call per provider. Any non-success status,
/// network error, or timeout counts as an invalid key.
pub struct HttpProviderProbe {
    client: Client,
    openai_base: String,
    anthropic_base: String,
    gemini_base: String,
}

impl HttpProviderProbe {
    pub fn new(timeout: Duration) -> Self {
        Self::with_bases(
            timeout,
            "https://api.openai.com",
            "https://api.anthropic.com",
            "https://generativelanguage.googleapis.com",
        )
    }

    pub fn with_bases(
        timeout: Duration,
        openai_base: impl Into<String>,
        anthropic_base: impl Into<String>,
        gemini_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("client build"),
            openai_base: openai_base.into().trim_end_matches('/').to_string(),
            anthropic_base: anthropic_base.into().trim_end_matches('/').to_string(),
            gemini_base: gemini_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(Duration::from_secs(*crate::config::PROVIDER_TEST_TIMEOUT_SECS))
    }
}

#[async_trait]
impl ProviderProbe for HttpProviderProbe {
    async fn test_key(&self, provider: Provider, api_key: &str) -> bool {
        let request = match provider {
            Provider::Openai => self
                .client
                .get(format!("{}/v1/models", self.openai_base))
                .bearer_auth(api_key),
            Provider::Anthropic => self
                .client
                .get(format!("{}/v1/models", self.anthropic_base))
                .header("x-api-key", api_key),
            Provider::Gemini => self
                .client
                .get(format!("{}/v1beta/models", self.gemini_base))
                .query(&[("key", api_key)]),
            // No validation endpoint wired up for the remaining providers yet.
            _ => return false,
        };

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                warn!(provider = provider.as_str(), %error, "provider key probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn probe_for(server: &MockServer) -> HttpProviderProbe {
        HttpProviderProbe::with_bases(
            Duration::from_secs(2),
            server.base_url(),
            server.base_url(),
            server.base_url(),
        )
    }

    #[tokio::test]
    async fn openai_probe_accepts_200() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/models")
                .header("authorization", "Bearer sk-test-123");
            then.status(200).json_body(serde_json::json!({"data": []}));
        });

        let probe = probe_for(&server);
        assert!(probe.test_key(Provider::Openai, "sk-test-123").await);
        mock.assert();
    }

    #[tokio::test]
    async fn rejected_key_reports_false() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/models");
            then.status(401);
        });

        let probe = probe_for(&server);
        assert!(!probe.test_key(Provider::Anthropic, "bad-key").await);
    }

    #[tokio::test]
    async fn gemini_key_sent_as_query_param() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1beta/models")
                .query_param("key", "g-key");
            then.status(200).json_body(serde_json::json!({"models": []}));
        });

        let probe = probe_for(&server);
        assert!(probe.test_key(Provider::Gemini, "g-key").await);
        mock.assert();
    }

    #[tokio::test]
    async fn providers_without_endpoint_are_invalid() {
        let server = MockServer::start_async().await;
        let probe = probe_for(&server);
        assert!(!probe.test_key(Provider::Stability, "anything").await);
    }
}
