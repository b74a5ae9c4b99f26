//! Back-office CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bo-cli migrate
//!
//! # List profiles and promote one into the back office
//! bo-cli user list
//! bo-cli user set-type --email staff@example.com --type staff
//!
//! # Inspect or raise a sequence counter
//! bo-cli counter show invoiceCounter
//! bo-cli counter advance invoiceCounter 1000
//! ```
//!
//! # Environment Variables
//!
//! - `BACKOFFICE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bo-cli")]
#[command(author, version, about = "Back-office CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user profiles
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Inspect and adjust sequence counters
    Counter {
        #[command(subcommand)]
        action: CounterAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List every profile
    List,
    /// Change a profile's user type
    SetType {
        /// Email of the profile to change
        #[arg(short, long)]
        email: String,

        /// New user type (admin, staff, customer, vip, wholesale, developer)
        #[arg(short = 't', long = "type")]
        user_type: String,
    },
}

#[derive(Subcommand)]
enum CounterAction {
    /// Show a counter's last issued value
    Show {
        /// Counter name (e.g. `customerCounter`)
        name: String,
    },
    /// Raise a counter so the next number is above `floor`
    Advance {
        /// Counter name
        name: String,
        /// Lowest value the counter should hold
        floor: i64,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::User { action } => match action {
            UserAction::List => commands::user::list().await?,
            UserAction::SetType { email, user_type } => {
                commands::user::set_type(&email, &user_type).await?;
            }
        },
        Commands::Counter { action } => match action {
            CounterAction::Show { name } => commands::counter::show(&name).await?,
            CounterAction::Advance { name, floor } => {
                commands::counter::advance(&name, floor).await?;
            }
        },
    }
    Ok(())
}
