//! twinroute application library

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use twinroute_api::{start_server, AppState};
use twinroute_core::AppConfig;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "TWINROUTE_CONFIG";

/// Run the service until the server stops or Ctrl-C
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("twinroute=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    tracing::info!("Starting twinroute");

    let path = config_path(std::env::var(CONFIG_ENV).ok(), std::env::args().nth(1));
    let config = load_config(path.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?
        .block_on(serve(config))
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let port = config.api_port;
    let state = AppState::connect(config)
        .await
        .context("failed to set up provider client")?;

    if let Some(caps) = state.client().capabilities().await {
        tracing::info!(
            endpoint = %state.client().endpoint(),
            tier = caps.capability_tier.as_str(),
            accounts = caps.accounts.len(),
            "Provider ready"
        );
    }

    tokio::select! {
        result = start_server(state, port) => result.context("API server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}

/// The environment variable wins over the first argument
fn config_path(env: Option<String>, arg: Option<String>) -> Option<PathBuf> {
    env.or(arg).filter(|p| !p.is_empty()).map(PathBuf::from)
}

/// Load and validate the config file, or fall back to defaults
pub fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let config = AppConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            tracing::info!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        None => {
            tracing::info!("No config file given, using defaults");
            Ok(AppConfig::default())
        }
    }
}
