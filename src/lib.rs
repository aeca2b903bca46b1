//! Notification Hydrator Library
//!
//! Turns the identifiers carried by a push notification into the team,
//! channel, category, post, thread and user data needed to render it, and
//! warms the local cache with them.

pub mod config;
pub mod fetchers;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod remote;
pub mod sqlite_persistence;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use models::{AggregatedPayload, NotificationRequest};
pub use pipeline::{NotificationProcessor, ProcessorSettings, SerializationGate};
pub use remote::{HttpRemoteFetcher, RemoteFetcher};
pub use store::{ServerDatabase, SqliteStoreProvider, StoreProvider};
