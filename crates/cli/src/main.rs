//! paylater-sw entry point.
//!
//! Drives the offline cache from the command line: register a generation,
//! fetch through the active worker, or inspect the stores on disk.
//! Logging goes to stderr so fetched bodies can be piped from stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use paylater_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "paylater-sw")]
#[command(about = "Offline resource cache for the PayLater web app", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install and activate the configured generation
    Register,

    /// Fetch a resource through the active worker and write its body to stdout
    Fetch {
        /// URL or path relative to the configured origin
        locator: String,

        /// Treat the request as a top-level navigation
        #[arg(long)]
        navigate: bool,

        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,
    },

    /// List cache stores and the active generation
    Stores {
        /// Also list the URLs stored in each store
        #[arg(long)]
        entries: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;

    match cli.command {
        Commands::Register => commands::register(&config, &db).await,
        Commands::Fetch { locator, navigate, method } => {
            commands::fetch(&config, db, &locator, &method, navigate).await
        }
        Commands::Stores { entries } => commands::stores(&db, entries).await,
    }
}
