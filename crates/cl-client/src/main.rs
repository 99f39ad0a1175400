//! console-link
//!
//! Sends commands to the companion receiver running in the console user's
//! session. The receiver socket is derived from the console user's uid, so
//! this tool follows user switches without being told about them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cl_client::{ClientEvent, ConnectionManager, Dispatcher};
use cl_core::config::{self, ClientConfig};
use cl_core::time::monotonic_now;
use cl_core::SessionOwnerId;
use cl_protocol::{encode_command, AbsoluteTime, Command, InputSourceSelector};

/// Time given to the transport to flush a datagram before shutdown
const SEND_GRACE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "console-link")]
#[command(about = "Send commands to the receiver in the console user's session")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the per-user socket root directory
    #[arg(long, global = true)]
    socket_root: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow console user changes and log connection events
    Watch,

    /// Run a shell command in the console user's session
    Shell {
        /// Command line to run
        command: String,

        /// Seconds to wait for the receiver
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Select a keyboard input source in the console user's session
    SelectInputSource {
        /// Language tag (e.g. en)
        #[arg(long)]
        language: Option<String>,

        /// Input source id
        #[arg(long)]
        input_source_id: Option<String>,

        /// Input mode id
        #[arg(long)]
        input_mode_id: Option<String>,

        /// Seconds to wait for the receiver
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Print the receiver socket path for a user id
    SocketPath {
        /// User id
        uid: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::SocketPath { uid } => {
            println!("{}", config.socket_path(SessionOwnerId::new(uid)).display());
            Ok(())
        }
        Commands::Watch => run_watch(config).await,
        Commands::Shell { command, timeout } => {
            encode_command(&Command::shell(command.as_str()))?;

            run_once(config, Duration::from_secs(timeout), move |manager| {
                manager.send_shell_command(command)
            })
            .await
        }
        Commands::SelectInputSource {
            language,
            input_source_id,
            input_mode_id,
            timeout,
        } => {
            let selector = InputSourceSelector {
                language,
                input_source_id,
                input_mode_id,
            };
            if selector.is_empty() {
                anyhow::bail!(
                    "Nothing to select: pass --language, --input-source-id or --input-mode-id"
                );
            }
            // Reject unencodable fields before connecting
            encode_command(&Command::select_input_source(
                selector.clone(),
                AbsoluteTime::default(),
            ))?;

            run_once(config, Duration::from_secs(timeout), move |manager| {
                manager.select_input_source(selector, monotonic_now())
            })
            .await
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let path = config::default_config_path();
            if path.exists() {
                config::load_config(&path).unwrap_or_else(|e| {
                    tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    ClientConfig::default()
                })
            } else {
                ClientConfig::default()
            }
        }
    };

    if let Some(root) = &cli.socket_root {
        config.socket_root_dir = root.clone();
    }

    Ok(config)
}

fn spawn_manager(config: ClientConfig) -> Result<ConnectionManager> {
    let dispatcher =
        Dispatcher::new("console-link-dispatcher").context("Failed to start dispatcher")?;
    Ok(ConnectionManager::with_defaults(
        dispatcher,
        tokio::runtime::Handle::current(),
        config,
    ))
}

fn shutdown(manager: ConnectionManager) {
    let dispatcher = manager.dispatcher().clone();
    drop(manager);
    dispatcher.terminate();
}

async fn run_watch(config: ClientConfig) -> Result<()> {
    let manager = spawn_manager(config)?;
    let mut events = manager.subscribe();
    manager.start();

    tracing::info!("Watching console user; press Ctrl-C to stop");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            event = events.recv() => match event {
                Some(ClientEvent::Connected) => tracing::info!("Receiver connected"),
                Some(ClientEvent::ConnectFailed(err)) => tracing::debug!("Connect failed: {}", err),
                Some(ClientEvent::Closed) => tracing::info!("Receiver closed"),
                None => break,
            },
        }
    }

    shutdown(manager);
    Ok(())
}

async fn run_once<F>(config: ClientConfig, timeout: Duration, send: F) -> Result<()>
where
    F: FnOnce(&ConnectionManager),
{
    let manager = spawn_manager(config)?;
    let mut events = manager.subscribe();
    manager.start();

    let connected = wait_connected(&mut events, timeout).await;
    if connected.is_ok() {
        send(&manager);
        tokio::time::sleep(SEND_GRACE).await;
    }

    shutdown(manager);
    connected
}

async fn wait_connected(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    timeout: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut last_error = None;

    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(ClientEvent::Connected)) => return Ok(()),
            Ok(Some(ClientEvent::ConnectFailed(err))) => {
                tracing::debug!("Connect failed: {}", err);
                last_error = Some(err);
            }
            Ok(Some(ClientEvent::Closed)) => {}
            Ok(None) => anyhow::bail!("Client stopped before connecting"),
            Err(_) => {
                return Err(match last_error {
                    Some(err) => anyhow::anyhow!("Timed out waiting for receiver: {}", err),
                    None => anyhow::anyhow!("Timed out waiting for a console user"),
                });
            }
        }
    }
}
