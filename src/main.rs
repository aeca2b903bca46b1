use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notification_hydrator::config::{AppConfig, CliConfig, FileConfig};
use notification_hydrator::metrics;
use notification_hydrator::{
    HttpRemoteFetcher, NotificationProcessor, NotificationRequest, SerializationGate,
    SqliteStoreProvider,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "notification-hydrator", version)]
struct CliArgs {
    /// Directory holding the app registry and the per-server databases.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the CLI ones.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for server requests.
    #[clap(long)]
    pub request_timeout_sec: Option<u64>,

    /// Posts fetched for a channel with nothing cached.
    #[clap(long)]
    pub posts_per_page: Option<usize>,

    /// Print the collected metrics before exiting.
    #[clap(long)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers a server and creates its database.
    RegisterServer {
        #[clap(long)]
        url: String,

        /// Display name, defaults to the url.
        #[clap(long)]
        name: Option<String>,

        /// Id of the logged in user on this server.
        #[clap(long)]
        user_id: Option<String>,

        /// Team currently selected on this server.
        #[clap(long)]
        team_id: Option<String>,
    },

    /// Hydrates the data of one notification and prints it as JSON.
    Process {
        #[clap(long, required_unless_present = "payload")]
        server_url: Option<String>,

        #[clap(long)]
        team_id: Option<String>,

        #[clap(long)]
        channel_id: Option<String>,

        #[clap(long)]
        post_id: Option<String>,

        #[clap(long)]
        root_id: Option<String>,

        /// Collapsed reply threads are enabled.
        #[clap(long)]
        crt: bool,

        /// The app is not running; fetch without writing to the store.
        #[clap(long)]
        cold_start: bool,

        /// JSON file with the raw push data, instead of the flags above.
        #[clap(long, value_parser = parse_path, conflicts_with_all = ["server_url", "team_id", "channel_id", "post_id", "root_id", "crt"])]
        payload: Option<PathBuf>,
    },
}

fn load_push_data(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read push payload: {:?}", path))?;
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse push payload: {:?}", path))?;

    // Push data is a string map, but tolerate booleans and numbers
    Ok(raw
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        request_timeout_sec: cli_args.request_timeout_sec,
        posts_per_page: cli_args.posts_per_page,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    metrics::init_metrics();

    let stores = Arc::new(SqliteStoreProvider::new(&config.db_dir)?);

    match cli_args.command {
        Command::RegisterServer {
            url,
            name,
            user_id,
            team_id,
        } => {
            let display_name = name.unwrap_or_else(|| url.clone());
            let server = stores.register_server(&url, &display_name)?;
            if user_id.is_some() || team_id.is_some() {
                let db = stores
                    .open_server(&server.url)?
                    .context("Registered server has no database")?;
                if let Some(user_id) = user_id {
                    db.set_current_user_id(&user_id)?;
                }
                if let Some(team_id) = team_id {
                    db.set_current_team_id(&team_id)?;
                }
            }
            println!("{}", server.db_path.display());
        }
        Command::Process {
            server_url,
            team_id,
            channel_id,
            post_id,
            root_id,
            crt,
            cold_start,
            payload,
        } => {
            let request = match payload {
                Some(path) => {
                    NotificationRequest::from_push_data(&load_push_data(&path)?, cold_start)
                }
                None => {
                    let mut data = HashMap::new();
                    for (key, value) in [
                        ("server_url", server_url),
                        ("team_id", team_id),
                        ("channel_id", channel_id),
                        ("post_id", post_id),
                        ("root_id", root_id),
                    ] {
                        if let Some(value) = value {
                            data.insert(key.to_string(), value);
                        }
                    }
                    data.insert("is_crt_enabled".to_string(), crt.to_string());
                    NotificationRequest::from_push_data(&data, cold_start)
                }
            };

            let remote = HttpRemoteFetcher::new(&config.servers, config.request_timeout_sec)?;
            if let Some(url) = &request.server_url {
                if !remote.knows_server(url) {
                    warn!("No session token configured for {}", url);
                }
            }

            let processor = NotificationProcessor::new(
                Arc::new(remote),
                stores.clone(),
                config.processor_settings(),
            );
            let gate = SerializationGate::new(Arc::new(processor));

            let result = gate.run(request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    if cli_args.print_metrics {
        eprintln!("{}", metrics::gather_text());
    }

    Ok(())
}
