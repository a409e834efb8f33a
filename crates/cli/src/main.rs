//! Parcel Desk CLI - migrations, role bootstrap and desk watch views.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! pd-cli migrate
//!
//! # Make the first admin (the API cannot)
//! pd-cli role set --username warden --role admin
//!
//! # Security desk: print the verified queue, ring the bell on arrivals
//! pd-cli watch verified
//!
//! # Student: follow one order until it is handed over
//! pd-cli watch order 0b7e6c1e-5d0f-4a55-9e7b-2f1c3b8d4a10
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use parcel_desk_core::{OrderId, Role};

mod commands;

#[derive(Parser)]
#[command(name = "pd-cli")]
#[command(author, version, about = "Parcel Desk CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage profile roles
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
    /// Follow the API the way the handover screens do
    Watch {
        #[command(subcommand)]
        target: WatchTarget,
    },
}

#[derive(Subcommand)]
enum RoleAction {
    /// Set a profile's role directly
    Set {
        /// Username of the profile to change
        #[arg(short, long)]
        username: String,

        /// New role (`user`, `security`, `admin`)
        #[arg(short, long)]
        role: Role,
    },
}

#[derive(Subcommand)]
enum WatchTarget {
    /// Poll the verified queue (security desk)
    Verified,
    /// Poll one of your orders until it is handed over
    Order {
        /// Order id as returned when the order was registered
        order_id: OrderId,
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
        Commands::Role { action } => match action {
            RoleAction::Set { username, role } => {
                commands::role::set(&username, role).await?;
            }
        },
        Commands::Watch { target } => match target {
            WatchTarget::Verified => commands::watch::verified().await?,
            WatchTarget::Order { order_id } => commands::watch::order(order_id).await?,
        },
    }
    Ok(())
}
