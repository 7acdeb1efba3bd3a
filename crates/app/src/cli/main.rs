//! Auralift CLI application
//!
//! `run` hosts the enhancement daemon over a watched media directory. The
//! other subcommands edit or inspect the persisted settings; a running
//! daemon picks their writes up through the store watcher.

use anyhow::Context;
use auralift_core::domain::config::{AuraliftConfig, ConfigManager};
use auralift_core::domain::graph::AttachmentManager;
use auralift_core::domain::presets;
use auralift_core::domain::protocol::ControlPort;
use auralift_core::domain::session::Session;
use auralift_core::domain::settings::SettingsPatch;
use auralift_core::domain::store::SettingsService;
use auralift_core::domain::worker::EnhancerWorker;
use auralift_infra::host::{resolve_sample_rate, DirectoryPage};
use auralift_infra::store::{FileStore, StoreWatcher};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const STATUS_LOG_PERIOD: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "auralift")]
#[command(about = "Real-time audio enhancement for watched media", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the enhancement daemon over a media directory
    Run {
        /// Directory to watch (overrides the config file)
        #[arg(long)]
        media_dir: Option<PathBuf>,

        /// Domain the settings are scoped to (overrides the config file)
        #[arg(long)]
        domain: Option<String>,
    },
    /// Flip the master switch for a domain
    Toggle {
        #[arg(long)]
        domain: Option<String>,
    },
    /// Show the effective settings for a domain
    Status {
        #[arg(long)]
        domain: Option<String>,
    },
    /// Merge a JSON settings patch into a domain's record
    Set {
        /// Patch as a JSON object, e.g. '{"preamp": 3.0, "mono": true}'
        patch: String,

        #[arg(long)]
        domain: Option<String>,
    },
    /// Apply a built-in preset to a domain
    Preset {
        /// Preset name to apply
        name: Option<String>,

        /// List the built-in presets
        #[arg(long)]
        list: bool,

        #[arg(long)]
        domain: Option<String>,
    },
    /// Drop a domain's overrides and active preset
    Reset {
        #[arg(long)]
        domain: Option<String>,
    },
    /// Probe the media the daemon would see
    Info {
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref()).await?;
    let store_path = resolve_store_path(cli.config.as_deref(), &config)?;

    match cli.command {
        Command::Run { media_dir, domain } => run(&config, store_path, media_dir, domain).await,
        Command::Toggle { domain } => toggle(&config, store_path, domain).await,
        Command::Status { domain } => status(&config, store_path, domain).await,
        Command::Set { patch, domain } => set(&config, store_path, patch, domain).await,
        Command::Preset { name, list, domain } => {
            preset(&config, store_path, name, list, domain).await
        }
        Command::Reset { domain } => reset(&config, store_path, domain).await,
        Command::Info { media_dir } => info_probe(&config, media_dir).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<AuraliftConfig> {
    match path {
        Some(path) => AuraliftConfig::load_from_file(path)
            .await
            .with_context(|| format!("could not load config from {}", path.display())),
        None => {
            let config_dir = ConfigManager::default_config_dir()?;
            Ok(ConfigManager::new(config_dir).load().await)
        }
    }
}

/// Anchor a relative store path to the config location, so every subcommand
/// and the daemon edit the same file no matter where they were launched
fn resolve_store_path(
    config_file: Option<&Path>,
    config: &AuraliftConfig,
) -> anyhow::Result<PathBuf> {
    if config.store.path.is_absolute() {
        return Ok(config.store.path.clone());
    }
    let base = match config_file.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => ConfigManager::default_config_dir()?,
    };
    Ok(base.join(&config.store.path))
}

fn worker_for(store_path: PathBuf) -> EnhancerWorker<FileStore> {
    EnhancerWorker::new(SettingsService::new(FileStore::new(store_path)))
}

fn domain_for(config: &AuraliftConfig, domain: Option<String>) -> String {
    domain.unwrap_or_else(|| config.app.domain.clone())
}

fn onoff(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

// ============================================================================
// DAEMON
// ============================================================================

async fn run(
    config: &AuraliftConfig,
    store_path: PathBuf,
    media_dir: Option<PathBuf>,
    domain: Option<String>,
) -> anyhow::Result<()> {
    info!("🎧 Auralift starting...");

    let domain = domain_for(config, domain);
    let media_dir = media_dir.unwrap_or_else(|| config.page.media_dir.clone());

    let worker = Arc::new(worker_for(store_path.clone()));
    if worker.install().await? {
        info!("Seeded global settings");
    }

    let sample_rate = resolve_sample_rate(config.app.sample_rate);
    let page = Arc::new(DirectoryPage::open(media_dir).await?);
    info!(
        path = %page.root().display(),
        domain = %domain,
        sample_rate,
        "Enhancement daemon ready"
    );

    let (session, port) = Session::new(page, Arc::clone(&worker), domain.clone(), sample_rate);
    let session_task = tokio::spawn(session.run());

    let store_watcher = StoreWatcher::new(&store_path).await?;
    let mut store_changes = store_watcher.subscribe();
    let mut status_interval = tokio::time::interval(STATUS_LOG_PERIOD);

    loop {
        tokio::select! {
            // Operator shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            // Another process wrote the store; push the new resolution into
            // the live session
            change = store_changes.recv() => {
                match change {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        forward_store_change(&worker, &port, &domain).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Store watcher stopped");
                        break;
                    }
                }
            }
            // Heartbeat visibility into the live session
            _ = status_interval.tick() => {
                log_status(&port).await;
            }
        }
    }

    session_task.abort();
    Ok(())
}

/// Re-resolve the domain's settings and hand the complete record to the
/// session. Merging a full record makes the live model match the store
/// exactly, whatever the external writer changed.
async fn forward_store_change(
    worker: &EnhancerWorker<FileStore>,
    port: &ControlPort,
    domain: &str,
) {
    let resolved = match worker.service().resolve(Some(domain), None).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!("Could not re-resolve settings after store change: {}", e);
            return;
        }
    };

    match port.update_settings(SettingsPatch::from(resolved)).await {
        Ok(_) => debug!("Forwarded external settings change to the session"),
        Err(e) => warn!("Could not forward settings change: {}", e),
    }
}

async fn log_status(port: &ControlPort) {
    let enabled = match port.status().await {
        Ok(enabled) => enabled,
        Err(e) => {
            warn!("Status probe failed: {}", e);
            return;
        }
    };

    match port.audio_info().await {
        Ok(info) => info!(
            enabled,
            codec = info.codec.as_deref().unwrap_or("-"),
            channels = info.channels.as_deref().unwrap_or("-"),
            "Engine status"
        ),
        Err(_) => info!(enabled, "Engine status"),
    }
}

// ============================================================================
// CONTROL SUBCOMMANDS
// ============================================================================

async fn toggle(
    config: &AuraliftConfig,
    store_path: PathBuf,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let domain = domain_for(config, domain);
    let worker = worker_for(store_path);
    worker.install().await?;

    let enabled = worker.toggle(&domain).await?;
    println!("{}: {}", domain, if enabled { "ON" } else { "OFF" });
    Ok(())
}

async fn status(
    config: &AuraliftConfig,
    store_path: PathBuf,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let domain = domain_for(config, domain);
    let service = SettingsService::new(FileStore::new(store_path));

    let settings = service.resolve(Some(&domain), None).await?;
    let preset = service.active_preset(&domain).await?;

    println!("domain:     {}", domain);
    println!("enabled:    {}", settings.enabled);
    println!("preamp:     {} dB", settings.preamp);
    println!("bands:      {:?} dB", settings.band_gains());
    println!(
        "compressor: {} dB threshold, {}:1 ratio, {} dB knee",
        settings.compression_threshold, settings.compression_ratio, settings.compression_knee
    );
    println!(
        "modes:      smart-volume {} | mono {} | loudness {}",
        onoff(settings.smart_volume),
        onoff(settings.mono),
        onoff(settings.loudness_mode)
    );
    if let Some(preset) = preset {
        println!("preset:     {}", preset);
    }
    Ok(())
}

async fn set(
    config: &AuraliftConfig,
    store_path: PathBuf,
    patch: String,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let patch: SettingsPatch =
        serde_json::from_str(&patch).context("patch must be a JSON object of settings fields")?;

    let domain = domain_for(config, domain);
    let worker = worker_for(store_path);
    worker.install().await?;

    let settings = worker.update_domain(&domain, &patch).await?;
    println!(
        "{}: updated ({})",
        domain,
        if settings.enabled { "ON" } else { "OFF" }
    );
    Ok(())
}

async fn preset(
    config: &AuraliftConfig,
    store_path: PathBuf,
    name: Option<String>,
    list: bool,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let name = match (name, list) {
        (Some(name), false) => name,
        _ => {
            for preset in presets::all() {
                println!("{:<12} {}", preset.id, preset.label);
            }
            return Ok(());
        }
    };

    let domain = domain_for(config, domain);
    let worker = worker_for(store_path);
    worker.install().await?;

    let settings = worker.apply_preset(&domain, &name).await?;
    println!(
        "{}: preset {} applied (preamp {} dB)",
        domain, name, settings.preamp
    );
    Ok(())
}

async fn reset(
    config: &AuraliftConfig,
    store_path: PathBuf,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let domain = domain_for(config, domain);
    let worker = worker_for(store_path);

    worker.reset_domain(&domain).await?;
    println!("{}: overrides cleared", domain);
    Ok(())
}

async fn info_probe(config: &AuraliftConfig, media_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let media_dir = media_dir.unwrap_or_else(|| config.page.media_dir.clone());
    let sample_rate = resolve_sample_rate(config.app.sample_rate);

    let page = Arc::new(DirectoryPage::open(media_dir).await?);
    let mut manager = AttachmentManager::new(page, sample_rate);
    manager.scan()?;

    let info = manager.audio_info();
    println!(
        "sample rate: {}",
        display(info.sample_rate.map(|rate| format!("{} Hz", rate)))
    );
    println!("channels:    {}", display(info.channels));
    println!("codec:       {}", display(info.codec));
    println!("bit depth:   {}", display(info.bit_depth));
    println!("bitrate:     {}", display(info.bitrate));
    println!("duration:    {}", display(info.duration));
    Ok(())
}

fn display(field: Option<String>) -> String {
    field.unwrap_or_else(|| "-".to_string())
}
