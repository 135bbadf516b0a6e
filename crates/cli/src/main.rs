// Orderflow CLI
//
// Design Decision: The CLI hosts the engine in-process; there is no server.
// Design Decision: DATABASE_URL selects the PostgreSQL store, otherwise state
// lives in memory for the lifetime of the command.
// Design Decision: Support text/json/yaml output formats for scripting.

mod commands;
mod output;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orderflow_durable::persistence::{InMemoryInstanceStore, InstanceStore, PostgresInstanceStore};
use orderflow_orders::inventory::SEED_ITEM;
use orderflow_orders::InventoryService;

use commands::App;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "orderflow")]
#[command(about = "Orderflow CLI - Run and manage durable order workflows")]
#[command(version)]
pub struct Cli {
    /// PostgreSQL URL; instances are kept in memory when omitted
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Cars in stock when the command starts
    #[arg(long, env = "ORDERFLOW_INITIAL_STOCK", default_value = "50")]
    pub stock: u32,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Place orders and wait for their workflows to finish
    Order {
        /// Item to order
        #[arg(long, default_value = SEED_ITEM)]
        name: String,

        /// Quantity per order
        #[arg(long, short = 'n', default_value = "1")]
        quantity: u32,

        /// Number of orders to place concurrently
        #[arg(long, default_value = "1")]
        count: usize,

        /// Instance ID (single order only)
        #[arg(long)]
        id: Option<String>,

        /// Seconds to wait for each order
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Show an instance
    Status {
        instance_id: String,

        /// Include the event history
        #[arg(long)]
        history: bool,
    },

    /// Terminate a running instance
    Terminate {
        instance_id: String,

        /// Reason recorded in history
        #[arg(long)]
        reason: Option<String>,
    },

    /// List instances
    List {
        /// Filter by status (pending, running, completed, failed, terminated)
        #[arg(long, short)]
        status: Vec<String>,

        /// Filter by workflow type
        #[arg(long = "type")]
        workflow_type: Option<String>,

        /// Maximum number of instances
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Delete a finished instance and its history
    Purge { instance_id: String },

    /// Resume instances left unfinished by a previous run and wait for them
    Resume {
        /// Seconds to wait for each instance
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv().ok();
    telemetry::init_logging();
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    let inventory = InventoryService::new().with_item(SEED_ITEM, cli.stock);

    match cli.database_url.as_deref() {
        Some(url) => {
            let store = PostgresInstanceStore::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("using PostgreSQL instance store");
            run(store, inventory, cli.output, cli.quiet, cli.command).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory instance store");
            run(InMemoryInstanceStore::new(), inventory, cli.output, cli.quiet, cli.command).await
        }
    }
}

async fn run<S: InstanceStore>(
    store: S,
    inventory: InventoryService,
    output: OutputFormat,
    quiet: bool,
    command: Commands,
) -> Result<()> {
    let app = App::new(store, inventory, output, quiet)?;

    match command {
        Commands::Order {
            name,
            quantity,
            count,
            id,
            timeout,
        } => commands::orders::place(&app, &name, quantity, count, id, timeout).await,
        Commands::Status {
            instance_id,
            history,
        } => commands::instances::status(&app, instance_id, history).await,
        Commands::Terminate {
            instance_id,
            reason,
        } => commands::instances::terminate(&app, instance_id, reason).await,
        Commands::List {
            status,
            workflow_type,
            limit,
        } => commands::instances::list(&app, &status, workflow_type, limit).await,
        Commands::Purge { instance_id } => commands::instances::purge(&app, instance_id).await,
        Commands::Resume { timeout } => commands::orders::resume(&app, timeout).await,
    }
}
