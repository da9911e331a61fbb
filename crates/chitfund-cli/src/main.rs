// crates/chitfund-cli/src/main.rs
//
// CLI entrypoint for the chitfund tools.
//
// Initializes tracing, parses CLI arguments, loads configuration, wires the
// engine to a JSON-file ledger and the configured identity, hydrates it, and
// runs the requested subcommand.

mod commands;
mod config;
mod file_ledger;
mod output;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use chitfund_core::{AmountConverter, Identity, StaticIdentity, SystemClock};
use chitfund_engine::ChitFundService;
use commands::convert::ConvertCmd;
use commands::fund::{CreateArgs, ListArgs};
use config::CliConfig;
use file_ledger::FileLedger;
use output::OutputFormat;

/// Chitfund CLI: create, join, and track rotating savings funds.
#[derive(Parser, Debug)]
#[command(
    name = "chitfund",
    version = "0.1.0",
    about = "Chit fund engine CLI: rotating group savings with enrollment and cycle tracking"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "~/.chitfund/config.toml")]
    config: String,

    /// Act as this account address (overrides the configured identity).
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new chit fund owned by the current identity.
    Create(CreateArgs),

    /// Join a fund as the current identity.
    Join {
        /// Fund id.
        id: u64,
    },

    /// Show one fund in detail.
    Show {
        /// Fund id.
        id: u64,
    },

    /// List funds, optionally only those you joined or created.
    List(ListArgs),

    /// List a fund's participants in join order.
    Participants {
        /// Fund id.
        id: u64,
    },

    /// Show the per-cycle disbursement schedule.
    Schedule {
        /// Fund id.
        id: u64,
        /// Maximum number of cycles to show.
        #[arg(long, default_value_t = 12)]
        limit: usize,
    },

    /// Compare contributions received this cycle against what is due.
    Accounting {
        /// Fund id.
        id: u64,
        /// Amount received so far this cycle, in display units.
        #[arg(long, default_value = "0")]
        received: String,
    },

    /// Convert between display amounts and subunits.
    #[command(subcommand)]
    Convert(ConvertCmd),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML, falling back to defaults if the file is
    // missing or unreadable.
    let (config, load_error) = match CliConfig::load(&cli.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (CliConfig::default(), Some(e)),
    };

    // Initialize tracing subscriber; RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match load_error {
        None => tracing::info!("Loaded configuration from {}", cli.config),
        Some(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            cli.config,
            e
        ),
    }

    let converter = AmountConverter::new(config.decimals)?;

    if let Commands::Convert(cmd) = &cli.command {
        return commands::convert::run(cmd, &converter);
    }

    let identity = cli
        .identity
        .as_deref()
        .or(config.identity.as_deref())
        .map(Identity::new)
        .transpose()?;
    match &identity {
        Some(id) => tracing::info!("Acting as {}", id),
        None => tracing::info!("No identity configured; read-only commands only"),
    }

    let ledger_path = config.ledger_path();
    tracing::info!("Ledger file: {}", ledger_path.display());

    let service = ChitFundService::new(
        Arc::new(FileLedger::new(ledger_path)),
        Arc::new(StaticIdentity::new(identity)),
        Arc::new(SystemClock),
        converter,
    );
    service.hydrate().await?;

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    match &cli.command {
        Commands::Create(args) => commands::fund::create(&service, args, format).await?,
        Commands::Join { id } => commands::fund::join(&service, *id, format).await?,
        Commands::Show { id } => commands::fund::show(&service, *id, format).await?,
        Commands::List(args) => commands::fund::list(&service, args, format).await?,
        Commands::Participants { id } => {
            commands::fund::participants(&service, *id, format).await?
        }
        Commands::Schedule { id, limit } => {
            commands::fund::schedule(&service, *id, *limit, format).await?
        }
        Commands::Accounting { id, received } => {
            commands::fund::accounting(&service, *id, received, format).await?
        }
        Commands::Convert(_) => {}
    }

    Ok(())
}
