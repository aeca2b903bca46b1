//! Entity fetchers.
//!
//! Every fetcher is a method of [`FetchContext`] that combines a lookup in the
//! server database with a conditional remote call. Nothing is written here;
//! persistence is done once per run by the processor.

mod category;
mod channel;
mod post;
mod profiles;
mod team;
mod thread;
mod user;

pub use channel::ChannelResult;
pub use post::{extract_mentions, PostQuery, PostResult};
pub use profiles::LoadedProfiles;
pub use team::TeamResult;
pub use thread::ThreadResult;

use crate::remote::{RemoteFetcher, ResponseEnvelope, TransportError};
use crate::store::ServerDatabase;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Store failure: {0:#}")]
    Store(anyhow::Error),

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

impl From<anyhow::Error> for FetchError {
    fn from(err: anyhow::Error) -> Self {
        FetchError::Store(err)
    }
}

impl FetchError {
    /// Store failures make the run incomplete; the others only degrade one field.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, FetchError::Store(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Store(_) => "store",
            FetchError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Turns a remote failure of an optional field into absence. Store failures
/// are still returned.
pub(crate) fn absent_on_remote_failure<T>(
    result: Result<T, FetchError>,
    what: &str,
) -> Result<Option<T>, FetchError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_store_failure() => Err(e),
        Err(e) => {
            warn!("Could not fetch {}: {}", what, e);
            crate::metrics::record_fetch_failure(what, e.kind());
            Ok(None)
        }
    }
}

/// Everything a fetcher needs for one run.
pub struct FetchContext<'a> {
    remote: &'a dyn RemoteFetcher,
    db: &'a dyn ServerDatabase,
    server_url: &'a str,
}

impl<'a> FetchContext<'a> {
    pub fn new(remote: &'a dyn RemoteFetcher, db: &'a dyn ServerDatabase, server_url: &'a str) -> Self {
        Self {
            remote,
            db,
            server_url,
        }
    }

    pub fn db(&self) -> &dyn ServerDatabase {
        self.db
    }

    /// GET `endpoint` and deserialize the response into `T`.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        let value = self.remote.get(self.server_url, endpoint).await?;
        decode(endpoint, value)
    }

    /// POST `body` to `endpoint` and deserialize the response into `T`.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, FetchError> {
        let value = self.remote.post(self.server_url, endpoint, body).await?;
        decode(endpoint, value)
    }
}

fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .map(|o| o.len() <= 2 && o.get("ok").map(Value::is_boolean).unwrap_or(false))
        .unwrap_or(false)
}

/// Deserialize a response, unwrapping the `{ok, data}` envelope when present.
fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, FetchError> {
    let value = if is_envelope(&value) {
        let envelope: ResponseEnvelope =
            serde_json::from_value(value).map_err(|e| FetchError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        envelope.into_result()?
    } else {
        value
    };

    serde_json::from_value(value).map_err(|e| FetchError::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Team;
    use serde_json::json;

    #[test]
    fn test_decode_plain_value() {
        let team: Team = decode("/t", json!({"id": "t1", "name": "core"})).unwrap();
        assert_eq!(team.id, "t1");
    }

    #[test]
    fn test_decode_unwraps_ok_envelope() {
        let team: Team = decode("/t", json!({"ok": true, "data": {"id": "t1"}})).unwrap();
        assert_eq!(team.id, "t1");
    }

    #[test]
    fn test_decode_failed_envelope_is_transport_failure() {
        let result: Result<Team, _> = decode(
            "/t",
            json!({"ok": false, "data": {"status_code": 403, "message": "Forbidden"}}),
        );
        match result {
            Err(FetchError::Transport(TransportError::Api { status, message })) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_wrong_shape() {
        let result: Result<Team, _> = decode("/t", json!([1, 2, 3]));
        assert!(matches!(result, Err(FetchError::InvalidResponse { .. })));
    }

    #[test]
    fn test_absent_on_remote_failure() {
        let transport: Result<i32, FetchError> =
            Err(TransportError::Connection("refused".to_string()).into());
        assert!(absent_on_remote_failure(transport, "team").unwrap().is_none());

        let store: Result<i32, FetchError> = Err(anyhow::anyhow!("disk full").into());
        assert!(absent_on_remote_failure(store, "team").is_err());
    }
}
