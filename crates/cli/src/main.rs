//! FixDesk CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write a default config file
//! - `chat`:    Interactive troubleshooting session
//! - `search`:  Query the solution knowledge base
//! - `add`:     Add or overwrite a solution record
//! - `seed`:    Load the built-in sample solutions
//! - `stats`:   Show knowledge base statistics
//! - `doctor`:  Diagnose configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "fixdesk",
    about = "FixDesk — Device troubleshooting assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Start an interactive troubleshooting session
    Chat,

    /// Search the knowledge base for solutions
    Search {
        /// Device model, e.g. EH222
        #[arg(short, long)]
        device: String,

        /// Problem description
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },

    /// Add (or overwrite) a solution record
    Add {
        /// Device model, e.g. EH222
        #[arg(short, long)]
        device: String,

        /// Problem the solution addresses
        #[arg(short, long)]
        problem: String,

        /// Solution text
        #[arg(short, long)]
        solution: String,

        /// Manual section or page reference
        #[arg(short, long)]
        manual_reference: Option<String>,
    },

    /// Seed the knowledge base with sample solutions
    Seed {
        /// Device models to seed (defaults to the whole catalog)
        #[arg(short, long)]
        device: Vec<String>,
    },

    /// Show knowledge base statistics
    Stats,

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Search {
            device,
            query,
            limit,
        } => commands::knowledge::search(&device, &query, limit).await?,
        Commands::Add {
            device,
            problem,
            solution,
            manual_reference,
        } => {
            commands::knowledge::add(&device, &problem, &solution, manual_reference.as_deref())
                .await?
        }
        Commands::Seed { device } => commands::knowledge::seed(device).await?,
        Commands::Stats => commands::knowledge::stats().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
