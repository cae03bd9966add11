//! Taiwanese House CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! th-cli migrate
//!
//! # Load the menu from YAML, removing anything not in the file
//! th-cli seed menu demos/menu.yaml --clear
//!
//! # Give a customer loyalty coins
//! th-cli coins grant -e mei@example.com -a 500
//! ```
//!
//! All commands read `HOUSE_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "th-cli")]
#[command(author, version, about = "Taiwanese House CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load data from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage loyalty coins
    Coins {
        #[command(subcommand)]
        action: CoinsAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Import categories and items from a YAML menu file
    Menu {
        /// Path to the YAML file
        file: String,

        /// Remove categories and items not in the file
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum CoinsAction {
    /// Credit coins to a customer
    Grant {
        /// Customer email address
        #[arg(short, long)]
        email: String,

        /// Number of coins to add
        #[arg(short, long)]
        amount: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Menu { file, clear } => commands::seed::menu(&file, clear).await?,
        },
        Commands::Coins { action } => match action {
            CoinsAction::Grant { email, amount } => {
                commands::coins::grant(&email, amount).await?;
            }
        },
    }
    Ok(())
}
