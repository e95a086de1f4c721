//! SharpFocus - Host Entry Point
//!
//! Replays a browsing session against the simulated browser and prints the
//! resulting tab state as JSON.
//!
//! Usage: `sharpfocus [--memory] [SCENARIO.json]`

mod browser;
mod scenario;

use anyhow::{Context, Result};
use browser::SimBrowser;
use clap::Parser;
use scenario::Scenario;
use sharpfocus_core::FocusConfig;
use sharpfocus_store::{ExtensionSettings, KeyValueStore, MemoryStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Names the config file, overriding the default location
const CONFIG_ENV: &str = "SHARPFOCUS_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "sharpfocus")]
#[command(about = "Replay a browsing session against SharpFocus")]
struct Args {
    /// Keep the store in memory instead of opening the SQLite file
    #[arg(long)]
    memory: bool,

    /// Scenario file to replay; the built-in demo runs without one
    scenario: Option<PathBuf>,
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| FocusConfig::default().data_dir.join("config.json"))
}

fn init_logging(config: &FocusConfig) -> Result<()> {
    // Route `log` records from the library crates through tracing
    tracing_log::LogTracer::init().context("Failed to set log tracer")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;
    Ok(())
}

fn open_store(config: &FocusConfig, memory: bool) -> Result<Arc<dyn KeyValueStore>> {
    if memory {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = config.store_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    info!("Opened store at {}", path.display());
    Ok(Arc::new(store))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = FocusConfig::load(&config_path());
    init_logging(&config)?;

    info!("Starting SharpFocus...");

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::demo(),
    };

    let store = open_store(&config, args.memory)?;
    let mut browser = SimBrowser::new(ExtensionSettings::new(store), config);
    scenario.run(&mut browser)?;

    let summary = browser.summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
