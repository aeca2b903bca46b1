//! Remote fetch adapter: authenticated calls against a chat server.

mod envelope;
mod http_client;
mod trait_def;

pub use envelope::{AppErrorBody, ResponseEnvelope, TransportError};
pub use http_client::{HttpRemoteFetcher, ServerCredentials};
pub use trait_def::RemoteFetcher;
