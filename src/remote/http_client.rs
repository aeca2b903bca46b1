//! reqwest-backed implementation of [`RemoteFetcher`].

use super::envelope::{AppErrorBody, TransportError};
use super::trait_def::RemoteFetcher;
use crate::store::normalize_server_url;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Session token for one server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerCredentials {
    pub url: String,
    pub token: String,
}

/// HTTP client talking to any number of configured servers.
pub struct HttpRemoteFetcher {
    client: reqwest::Client,
    tokens: HashMap<String, String>,
}

impl HttpRemoteFetcher {
    /// Create a new fetcher.
    ///
    /// # Arguments
    /// * `credentials` - Session tokens, one per server url.
    /// * `timeout_sec` - Request timeout in seconds.
    pub fn new(credentials: &[ServerCredentials], timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        let tokens = credentials
            .iter()
            .map(|c| (normalize_server_url(&c.url), c.token.clone()))
            .collect();

        Ok(Self { client, tokens })
    }

    /// Whether a session token is configured for `server_url`.
    pub fn knows_server(&self, server_url: &str) -> bool {
        self.tokens.contains_key(&normalize_server_url(server_url))
    }

    fn request(
        &self,
        method: reqwest::Method,
        server_url: &str,
        endpoint: &str,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let base = normalize_server_url(server_url);
        let token = self
            .tokens
            .get(&base)
            .ok_or_else(|| TransportError::UnknownServer(base.clone()))?;

        Ok(self
            .client
            .request(method, format!("{}{}", base, endpoint))
            .bearer_auth(token)
            .header("X-Requested-With", "XMLHttpRequest"))
    }

    async fn send(
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<Value, TransportError> {
        let response = request.send().await.map_err(|e| {
            warn!("Request to {} failed: {}", endpoint, e);
            TransportError::Connection(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("{} -> {}", endpoint, status);
            return response
                .json::<Value>()
                .await
                .map_err(|e| TransportError::InvalidResponse(e.to_string()));
        }

        let message = match response.json::<AppErrorBody>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };
        Err(TransportError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteFetcher for HttpRemoteFetcher {
    async fn get(&self, server_url: &str, endpoint: &str) -> Result<Value, TransportError> {
        let request = self.request(reqwest::Method::GET, server_url, endpoint)?;
        Self::send(request, endpoint).await
    }

    async fn post(
        &self,
        server_url: &str,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, TransportError> {
        let request = self
            .request(reqwest::Method::POST, server_url, endpoint)?
            .json(body);
        Self::send(request, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpRemoteFetcher {
        HttpRemoteFetcher::new(
            &[ServerCredentials {
                url: "https://chat.example.com/".to_string(),
                token: "secret".to_string(),
            }],
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_trailing_slash_removal() {
        let fetcher = fetcher();
        assert!(fetcher.knows_server("https://chat.example.com"));
        assert!(fetcher.knows_server("https://chat.example.com/"));
        assert!(!fetcher.knows_server("https://other.example.com"));
    }

    #[tokio::test]
    async fn test_unknown_server_fails_without_network() {
        let fetcher = fetcher();
        let result = fetcher
            .get("https://other.example.com", "/api/v4/users/me")
            .await;
        assert!(matches!(result, Err(TransportError::UnknownServer(_))));
    }
}
