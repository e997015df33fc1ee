//! Sigil CLI, runs the issuance workflow.
//!
//! Subcommands: init, run.

mod commands;
mod config;
mod output;
mod workflow;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{LoggingConfig, SigilConfig};

/// Sigil: self-sovereign identities and verifiable credentials.
#[derive(Parser, Debug)]
#[command(name = "sigil", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "sigil.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Create issuer and receiver identities and issue a credential.
    Run(commands::run::RunArgs),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init(args) => commands::init::run(args, &cli.config),
        Commands::Run(args) => {
            let mut config = SigilConfig::load(&cli.config)?;
            config.apply_env();
            args.apply(&mut config);
            if let Some(level) = &cli.log_level {
                config.logging.level = level.clone();
            }
            config.validate()?;

            init_tracing(&config.logging);
            tracing::info!("Sigil v{}", env!("CARGO_PKG_VERSION"));
            commands::run::run(&config).await
        }
    }
}
