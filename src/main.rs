// src/main.rs

//! The main entry point for the opsd operations-automation daemon.

use anyhow::Result;
use opsd::config::OpsdConfig;
use opsd::core::collaborators::NullMetricsSource;
use std::env;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("opsd version {VERSION}");
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("opsd.json");

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).compact().with_ansi(true).init();

    let config = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // The concrete CPU/memory/disk/health-check collector is an out-of-scope
    // collaborator; a real deployment supplies its own `MetricsSource` impl.
    let metrics_source: Arc<dyn opsd::core::collaborators::MetricsSource> = Arc::new(NullMetricsSource);

    if let Err(e) = opsd::server::run(config, metrics_source).await {
        error!(error = %e, "server runtime error");
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(path: &str) -> Result<OpsdConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).format(config::FileFormat::Json))
        .build()?;
    Ok(settings.try_deserialize::<OpsdConfig>()?)
}
