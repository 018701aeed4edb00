use anyhow::{Context, Result};
use apunto::app::{App, AppEvent};
use apunto::cli::{self, Args};
use apunto::config::{self, Config, CONFIG_FILE};
use apunto::remote::{session, AuthClient};
use clap::Parser;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr and stay silent unless RUST_LOG is set.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = config::config_dir()?;
    config::ensure_config_dir(&config_dir).context("Failed to create config directory")?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join(CONFIG_FILE));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
        .with_env();

    if let Some(command) = args.command {
        return cli::run(command, &config, &config_dir).await;
    }

    let connection = config.connection()?;
    let session_path = session::session_path(&config_dir);

    // Refresh a stale session before the first load so it does not fail with 401.
    let http = reqwest::Client::new();
    let auth = AuthClient::new(http, connection.url.clone(), connection.anon_key.clone());
    let stored = cli::restore_session(&auth, &session_path).await?;

    let mut app = App::new(&config, connection, session_path, stored)
        .context("Failed to create application")?;

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);
    apunto::ui::run(&mut app, event_tx, event_rx).await?;

    Ok(())
}
