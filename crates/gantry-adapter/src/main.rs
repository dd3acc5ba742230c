//! gantry - adapter maintenance CLI
//!
//! Operator tooling around the adapter's local state: inspect registry
//! nodes and cached instances, prune stale cache tombstones, and validate
//! a configuration file before rollout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gantry_adapter::config::AdapterConfig;
use gantry_adapter::store;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(about = "Node provisioning adapter maintenance")]
#[command(version)]
struct Args {
    /// Database path (defaults to the per-user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered nodes
    Nodes,

    /// List cached instances
    Cache {
        /// Include soft-deleted entries
        #[arg(long)]
        deleted: bool,
    },

    /// Remove stale cache tombstones
    Prune {
        /// Minimum tombstone age in days
        #[arg(long, default_value = "30")]
        older_than_days: u32,
    },

    /// Validate an adapter configuration file
    Validate {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    // Print main error message
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    // Print error chain (causes)
    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match args.command {
        Command::Nodes => {
            let pool = open_pool(args.db.as_deref()).await?;
            store::cli::list_nodes(&pool).await?;
        }
        Command::Cache { deleted } => {
            let pool = open_pool(args.db.as_deref()).await?;
            store::cli::list_cache(&pool, deleted).await?;
        }
        Command::Prune { older_than_days } => {
            let pool = open_pool(args.db.as_deref()).await?;
            store::cli::prune_database(&pool, older_than_days).await?;
        }
        Command::Validate { config } => {
            handle_validate(&config)?;
        }
    }

    Ok(())
}

async fn open_pool(path: Option<&Path>) -> Result<store::DbPool> {
    match path {
        Some(path) => store::open_db_at(path).await,
        None => store::open_db().await,
    }
}

/// Handle the validate command
fn handle_validate(path: &Path) -> Result<()> {
    let config = AdapterConfig::load(path)?;
    config.validate()?;

    println!("Configuration OK");
    println!(
        "  shape:        {} ({} vcpus)",
        config.provider.shape,
        config.effective_vcpus()
    );
    println!("  name format:  {}", config.naming.name_format);
    println!("  concurrency:  {}", config.max_concurrent());
    if let Some(template) = &config.bootstrap.user_data_template {
        println!("  user data:    {}", template.display());
    }

    Ok(())
}
