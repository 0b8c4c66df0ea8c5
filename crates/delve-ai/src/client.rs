//! HTTP transport for the Parallel AI API.
//!
//! Every call checks for a credential before touching the network. Nothing
//! here retries; retry policy lives in the run poller.

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AiError, Result, response_to_error};
use crate::http_client::build_http_client;

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.parallel.ai";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "PARALLEL_API_KEY";

/// How the credential is attached to a request.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AuthScheme {
    /// `x-api-key: <key>` (tasks, search, find-all)
    ApiKey,
    /// `Authorization: Bearer <key>` (chat completions)
    Bearer,
}

/// Parallel AI client
#[derive(Clone)]
pub struct ParallelClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl std::fmt::Debug for ParallelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl ParallelClient {
    /// Create a new client. A missing key is accepted here and reported as
    /// [`AiError::Auth`] by the first call.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client: build_http_client()?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create a client using `PARALLEL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var(API_KEY_ENV).ok())
    }

    /// Set custom base URL (for proxies and tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(AiError::missing_api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder, scheme: AuthScheme) -> Result<RequestBuilder> {
        let key = self.api_key()?;
        Ok(match scheme {
            AuthScheme::ApiKey => request.header("x-api-key", key),
            AuthScheme::Bearer => request.bearer_auth(key),
        })
    }

    /// POST a JSON body and decode the JSON response.
    pub(crate) async fn post_json<B, T>(&self, path: &str, scheme: AuthScheme, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.authorize(self.client.post(self.url(path)), scheme)?;
        tracing::debug!(path, "POST");
        self.execute(request.json(body)).await
    }

    /// GET and decode the JSON response.
    pub(crate) async fn get_json<T>(&self, path: &str, scheme: AuthScheme) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = self.authorize(self.client.get(self.url(path)), scheme)?;
        tracing::debug!(path, "GET");
        self.execute(request).await
    }

    async fn execute<T>(&self, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(response_to_error(response).await);
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| {
            AiError::InvalidResponse(format!("failed to decode response body: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // Unroutable base URL: reaching the network would yield a transport error.
        let client = ParallelClient::new(None)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = client
            .get_json::<Value>("/v1/tasks/runs/x", AuthScheme::ApiKey)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Auth(_)));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let client = ParallelClient::new(Some("   ".to_string())).unwrap();
        assert!(!client.has_api_key());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ParallelClient::new(Some("k".to_string()))
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(client.url("/v1beta/search"), "http://localhost:8080/v1beta/search");
    }
}
