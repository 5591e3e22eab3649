//! Wayfinder (wayfinder) - Replay simulator entry point
//!
//! Drives a real navigation session against the configured guidance backend,
//! with location fixes replayed from a recorded track, speech printed to
//! stdout and map calls logged.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wayfinder_client::backend::HttpGuidanceClient;
use wayfinder_client::capabilities::Capabilities;
use wayfinder_client::sim::{load_track, ConsoleSpeech, LogMap, ReplayLocation};
use wayfinder_client::{NavigationSession, SessionSettings, VoiceCommand};
use wayfinder_common::config::{ConfigResolver, TomlConfig};
use wayfinder_common::events::{EventBus, NavEvent};

/// Command-line arguments for wayfinder
#[derive(Parser, Debug)]
#[command(name = "wayfinder")]
#[command(about = "Replay a recorded location track through a navigation session")]
#[command(version)]
struct Args {
    /// Destination to navigate to
    #[arg(short, long, env = "WAYFINDER_DESTINATION", conflicts_with = "say")]
    destination: Option<String>,

    /// Spoken command transcript, e.g. "navigate to Central Library"
    #[arg(long)]
    say: Option<String>,

    /// JSON-lines track file ({latitude, longitude, accuracy, delay_ms} per line)
    #[arg(short, long, env = "WAYFINDER_TRACK")]
    track: PathBuf,

    /// Config file (overrides WAYFINDER_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Guidance backend base URL (overrides the config file)
    #[arg(long, env = "WAYFINDER_BACKEND_URL")]
    backend_url: Option<String>,

    /// Print a share message once navigation is under way
    #[arg(long)]
    share: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.resolve().context("Failed to load configuration")?;
    if let Some(url) = &args.backend_url {
        config.backend.base_url = url.clone();
    }
    config.validate().context("Invalid configuration")?;

    init_tracing(&config)?;

    info!(
        "Starting wayfinder v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("WAYFINDER_GIT_HASH"),
        env!("WAYFINDER_BUILD_TIMESTAMP"),
        env!("WAYFINDER_BUILD_PROFILE"),
    );
    match resolver.config_path() {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let destination = resolve_destination(&args, &config)?;

    let points = load_track(&args.track)
        .with_context(|| format!("Failed to load track {}", args.track.display()))?;
    info!("Loaded {} track points from {}", points.len(), args.track.display());

    let events = EventBus::default();
    let presenter = tokio::spawn(present(events.clone()));

    let location = Arc::new(ReplayLocation::new(points));
    let backend = HttpGuidanceClient::from_config(&config.backend)
        .context("Failed to create guidance client")?;
    info!("Guidance backend: {}", backend.endpoint());

    let caps = Capabilities {
        location: location.clone(),
        speech: Arc::new(ConsoleSpeech::new(events.clone())),
        map: Arc::new(LogMap),
        backend: Arc::new(backend),
    };
    let session = NavigationSession::new(caps, SessionSettings::from_config(&config), events);

    if let Err(e) = session.start(&destination).await {
        error!(error = %e, "Navigation did not start");
        presenter.abort();
        bail!(e.status_text());
    }

    if args.share {
        match session.share_location().await {
            Ok(message) => println!("{}", message.text),
            Err(e) => warn!(error = %e, "Could not build share message"),
        }
    }

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = location.wait_finished() => {
            info!("Track replay complete");
        }
    }

    session.stop();
    presenter.abort();
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wayfinder_client={},wayfinder_common={}", level, level))
    });

    match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

/// Destination from `--destination`, or from a `--say` transcript
fn resolve_destination(args: &Args, config: &TomlConfig) -> Result<String> {
    if let Some(destination) = &args.destination {
        return Ok(destination.clone());
    }

    let Some(transcript) = &args.say else {
        bail!("Either --destination or --say is required");
    };

    let command = VoiceCommand::parse(transcript, &config.voice.trigger_phrases);
    if !command.start_requested {
        bail!(
            "No navigation command recognised in \"{}\" (say one of: {})",
            transcript,
            config.voice.trigger_phrases.join(", ")
        );
    }
    info!("Voice command destination: {}", command.destination);
    Ok(command.destination)
}

/// Print status and guidance as they arrive
async fn present(events: EventBus) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(NavEvent::StatusChanged { text, is_error, .. }) => {
                if is_error {
                    println!("[status] ERROR: {}", text);
                } else {
                    println!("[status] {}", text);
                }
            }
            Ok(NavEvent::GuidanceUpdated { steps, .. }) => {
                for step in steps {
                    println!("  {}", step);
                }
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Presenter lagged, {} events dropped", missed);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
