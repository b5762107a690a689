/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Wallet connection commands against the persisted session
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or shutdown handling
*/

mod cli;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wallet_kit_cli::{KitConfig, build_manager};

#[derive(Parser, Debug)]
#[command(name = "wallet-kit", version, about = "Arweave wallet connection manager")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every selectable strategy
    Strategies,
    /// Restore the cached session and print it
    Status,
    /// Connect with a strategy
    Connect {
        id: String,
        #[arg(long = "permission", value_name = "PERMISSION")]
        permissions: Vec<String>,
    },
    /// Disconnect and forget the cached session
    Disconnect,
    /// Restore the cached session
    Reconnect,
    /// Sign a message with the active wallet
    Sign { message: String },
    /// Print connection changes until interrupted
    Watch,
    /// Write a configuration file interactively
    Init {
        #[arg(long = "output", value_name = "PATH", default_value = "wallet-kit.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    if let Command::Init { output } = &args.command {
        return cli::init::run_init(output.clone());
    }

    let config = load_config(args.config_path.as_ref())?;
    let manager = build_manager(&config)?;
    info!(strategies = manager.strategies().len(), "configuration loaded");

    let result = match &args.command {
        Command::Strategies => {
            cli::commands::list_strategies(&manager);
            Ok(())
        }
        Command::Status => cli::commands::status(&manager).await,
        Command::Connect { id, permissions } => {
            cli::commands::connect(&manager, id, permissions).await
        }
        Command::Disconnect => cli::commands::disconnect(&manager).await,
        Command::Reconnect => cli::commands::reconnect(&manager).await,
        Command::Sign { message } => cli::commands::sign_message(&manager, message).await,
        Command::Watch => {
            let shutdown = CancellationToken::new();
            setup_signal_handlers(shutdown.clone());
            cli::commands::watch(&manager, shutdown).await
        }
        Command::Init { .. } => Ok(()),
    };

    manager.shutdown();
    result
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<KitConfig> {
    let Some(path) = path else {
        return Ok(KitConfig::default());
    };
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    KitConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
