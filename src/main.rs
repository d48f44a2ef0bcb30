use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_import::{
    config::Config,
    ingestor::EpgImporter,
    models::Source,
    storage::{JsonLinesStore, SharedStore},
};

#[derive(Parser)]
#[command(name = "epg-import")]
#[command(version)]
#[command(about = "Import XMLTV feeds and EPG snapshots into a JSON lines event store")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $CONFIG_FILE, then epg-import.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// File the imported events are written to
    #[arg(short, long, default_value = "epg-events.jsonl")]
    output: PathBuf,

    /// Only import services whose reference starts with this prefix
    #[arg(long, value_name = "PREFIX")]
    service_prefix: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("epg_import={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting epg-import v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    if config.sources.is_empty() {
        warn!("No sources configured, nothing to import");
    }

    let store = Arc::new(Mutex::new(JsonLinesStore::create(&cli.output)?));
    let shared: SharedStore = store.clone();

    let mut importer = EpgImporter::new(shared, &config)?.on_done(|completion| {
        info!(
            "Import complete (reboot: {}, epg file: {:?})",
            completion.reboot, completion.epg_file
        );
    });
    if let Some(prefix) = cli.service_prefix {
        importer = importer.with_filter(move |service: &str| service.starts_with(&prefix));
    }

    let refresh = config.import.channel_refresh_interval;
    importer.queue_sources(
        config
            .sources
            .iter()
            .map(|source| Source::from_config(source, refresh)),
    );

    let completion = importer.begin_import(None).await;

    {
        let mut store = store.lock().map_err(|_| anyhow!("event store lock poisoned"))?;
        store.flush()?;
        info!("{} events written to {}", store.written(), store.path().display());
    }

    if completion.is_some_and(|completion| completion.reboot) {
        error!("EPG store could not reload the imported data, restart required");
        std::process::exit(2);
    }

    Ok(())
}
