//! RemoteFetcher trait definition.

use super::envelope::TransportError;
use async_trait::async_trait;
use serde_json::Value;

/// Capability to call a chat server's REST API.
///
/// `endpoint` is the path plus query string, e.g. `/api/v4/channels/abc`.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Perform a GET request and return the parsed JSON body.
    async fn get(&self, server_url: &str, endpoint: &str) -> Result<Value, TransportError>;

    /// Perform a POST request with a JSON body and return the parsed JSON body.
    async fn post(
        &self,
        server_url: &str,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, TransportError>;
}
