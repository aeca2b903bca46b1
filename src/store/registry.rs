//! Registry of known servers and the per-server database files.

use super::schema::APP_VERSIONED_SCHEMAS;
use super::sqlite_store::SqliteServerDatabase;
use super::trait_def::{ServerDatabase, StoreProvider};
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

const APP_DB_FILE_NAME: &str = "app.db";

/// Server urls are compared without their trailing slash.
pub fn normalize_server_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn database_file_name(server_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_url.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}.db", hex)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredServer {
    pub url: String,
    pub display_name: String,
    pub db_path: PathBuf,
}

pub struct SqliteStoreProvider {
    db_dir: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStoreProvider {
    pub fn new<P: AsRef<Path>>(db_dir: P) -> Result<Self> {
        let db_dir = db_dir.as_ref().to_path_buf();
        let app_db_path = db_dir.join(APP_DB_FILE_NAME);
        let mut conn = Connection::open(&app_db_path)
            .with_context(|| format!("Failed to open app database at {:?}", app_db_path))?;
        open_versioned(&mut conn, APP_VERSIONED_SCHEMAS)?;

        Ok(Self {
            db_dir,
            conn: Mutex::new(conn),
        })
    }

    /// Register a server and create its database. Registering twice keeps the
    /// existing database and updates the display name.
    pub fn register_server(&self, url: &str, display_name: &str) -> Result<RegisteredServer> {
        let url = normalize_server_url(url);
        let db_path = self.db_dir.join(database_file_name(&url));

        // Creates the file with the current schema
        SqliteServerDatabase::open(&db_path)?.close();

        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("App database lock poisoned"))?;
        conn.execute(
            "INSERT INTO servers (url, display_name, db_path, registered_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET display_name = ?2",
            params![
                url,
                display_name,
                db_path.to_string_lossy(),
                Utc::now().to_rfc3339()
            ],
        )?;
        info!("Registered server {} at {:?}", url, db_path);

        Ok(RegisteredServer {
            url,
            display_name: display_name.to_string(),
            db_path,
        })
    }

    pub fn get_server(&self, url: &str) -> Result<Option<RegisteredServer>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("App database lock poisoned"))?;
        let server = conn
            .query_row(
                "SELECT url, display_name, db_path FROM servers WHERE url = ?1",
                params![normalize_server_url(url)],
                |row| {
                    Ok(RegisteredServer {
                        url: row.get(0)?,
                        display_name: row.get(1)?,
                        db_path: PathBuf::from(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(server)
    }

    /// Open a server database directly, e.g. to seed session state.
    pub fn open_server(&self, url: &str) -> Result<Option<SqliteServerDatabase>> {
        match self.get_server(url)? {
            Some(server) => Ok(Some(SqliteServerDatabase::open(&server.db_path)?)),
            None => Ok(None),
        }
    }
}

impl StoreProvider for SqliteStoreProvider {
    fn open(&self, server_url: &str) -> Result<Option<Arc<dyn ServerDatabase>>> {
        Ok(self
            .open_server(server_url)?
            .map(|db| Arc::new(db) as Arc<dyn ServerDatabase>))
    }
}
