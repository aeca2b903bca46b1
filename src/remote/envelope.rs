//! Transport errors and the `{ok, data}` response envelope.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Failure of a remote call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unexpected code {status} {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No credentials configured for server {0}")]
    UnknownServer(String),
}

/// Error body returned by the server on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct AppErrorBody {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status_code: u16,
}

/// Response shape produced by bridged network layers.
///
/// `ok: false` carries an [`AppErrorBody`] in `data`, and is treated exactly
/// like a transport failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    pub fn into_result(self) -> Result<Value, TransportError> {
        if self.ok {
            return Ok(self.data);
        }
        let body: AppErrorBody = serde_json::from_value(self.data).map_err(|e| {
            TransportError::InvalidResponse(format!("Malformed error envelope: {}", e))
        })?;
        Err(TransportError::Api {
            status: body.status_code,
            message: body.message,
        })
    }
}
