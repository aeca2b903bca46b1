mod file_config;

pub use file_config::FileConfig;

use crate::pipeline::{ProcessorSettings, DEFAULT_POSTS_PER_PAGE};
use crate::remote::ServerCredentials;
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;

pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 30;

/// Settings given on the command line. The TOML file wins when both are set.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub request_timeout_sec: Option<u64>,
    pub posts_per_page: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Holds `app.db` and one cache file per registered server.
    pub db_dir: PathBuf,
    pub request_timeout_sec: u64,
    pub posts_per_page: usize,
    pub servers: Vec<ServerCredentials>,
}

fn existing_dir(candidate: Option<PathBuf>) -> Result<PathBuf> {
    let dir = candidate.ok_or_else(|| anyhow!("No cache directory, pass --db-dir or set db_dir"))?;
    match std::fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => Ok(dir),
        Ok(_) => bail!("Cache path {:?} is not a directory", dir),
        Err(_) => bail!("Cache directory {:?} does not exist", dir),
    }
}

impl AppConfig {
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = existing_dir(file.db_dir.map(PathBuf::from).or(cli.db_dir.clone()))?;

        let posts_per_page = match file.posts_per_page.or(cli.posts_per_page) {
            Some(0) => bail!("posts_per_page must be greater than zero"),
            Some(n) => n,
            None => DEFAULT_POSTS_PER_PAGE,
        };

        Ok(Self {
            db_dir,
            request_timeout_sec: file
                .request_timeout_sec
                .or(cli.request_timeout_sec)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SEC),
            posts_per_page,
            servers: file.servers,
        })
    }

    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            posts_per_page: self.posts_per_page,
        }
    }
}
