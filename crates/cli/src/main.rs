use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod loopback;
mod output;
mod replay;
mod script;

use replay::ReplayOptions;
use script::Script;

/// Replay call-session scenarios through the rvoip session arbiter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, default_value = "info", env = "RVOIP_ARBITER_LOG")]
    log_level: String,

    /// Configuration file (TOML); defaults to rvoip-arbiter/config.toml in the user config directory
    #[arg(short, long, global = true, env = "RVOIP_ARBITER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON script of notifications and commands through the coordinator
    Replay {
        /// Script to replay
        script: PathBuf,

        /// Simulate the user refusing microphone access
        #[arg(long)]
        deny_capture: bool,

        /// Print snapshots as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config_path = config::resolve_path(cli.config.as_deref())?;
    match cli.command {
        Command::CheckConfig => check_config(&config_path),
        Command::Replay { script, deny_capture, json } => {
            let config = config::load(&config_path)?;
            let script = Script::load(&script)?;
            info!(
                "rvoip-arbiter v{} replaying with {}",
                rvoip_session_arbiter::VERSION,
                config_path.display()
            );

            let options = ReplayOptions {
                deny_capture,
                json,
                print_status: true,
            };
            let summary = replay::run(config, script, options).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary.snapshot)?);
            } else {
                println!("--- final state ---");
                print!("{}", output::snapshot_table(&summary.snapshot));
            }
            if !summary.placed_calls.is_empty() {
                println!("placed calls: {}", summary.placed_calls.join(", "));
            }
            if summary.rejected_commands > 0 {
                println!("rejected commands: {}", summary.rejected_commands);
            }
            Ok(())
        }
    }
}

fn check_config(path: &Path) -> Result<()> {
    let mut config = config::load(path)?;
    if config.credentials.password.is_some() {
        config.credentials.password = Some("********".to_string());
    }

    println!("configuration OK: {}", path.display());
    println!("outbound proxy: {}", config.outbound_proxy());
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
