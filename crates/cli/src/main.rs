//! Larkspur CLI - Database migrations and operations tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! lark migrate
//!
//! # Set stock for a product size
//! lark stock set -p P1 -s 38 -q 12
//!
//! # Show stock for a product
//! lark stock show -p P1
//!
//! # List charges that have no order (manual reconciliation queue)
//! lark unreconciled list
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lark")]
#[command(author, version, about = "Larkspur CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage inventory
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Inspect payments awaiting manual reconciliation
    Unreconciled {
        #[command(subcommand)]
        action: UnreconciledAction,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Set the quantity for one product size
    Set {
        /// Catalog product id
        #[arg(short, long)]
        product: String,

        /// Size label (omit for one-size products)
        #[arg(short, long)]
        size: Option<String>,

        /// New quantity
        #[arg(short, long)]
        quantity: u32,
    },
    /// Show stock rows for a product
    Show {
        /// Catalog product id
        #[arg(short, long)]
        product: String,
    },
}

#[derive(Subcommand)]
enum UnreconciledAction {
    /// List unreconciled payments, newest first
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Stock { action } => match action {
            StockAction::Set {
                product,
                size,
                quantity,
            } => commands::stock::set(&product, size.as_deref(), quantity).await?,
            StockAction::Show { product } => commands::stock::show(&product).await?,
        },
        Commands::Unreconciled { action } => match action {
            UnreconciledAction::List => commands::unreconciled::list().await?,
        },
    }
    Ok(())
}
