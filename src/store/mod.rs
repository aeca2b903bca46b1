//! Local store adapter: per-server cache databases.

mod registry;
mod schema;
mod sqlite_store;
mod trait_def;

pub use registry::{normalize_server_url, RegisteredServer, SqliteStoreProvider};
pub use sqlite_store::SqliteServerDatabase;
pub use trait_def::{DatabaseHandle, ServerDatabase, StoreProvider};
