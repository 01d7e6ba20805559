//! planlog - inspect and maintain a plan store
//!
//! Every subcommand opens the store, prints one JSON document to stdout and
//! closes the store again. Logs go to stderr, or to `--log-file`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "planlog")]
#[command(about = "Inspect and maintain a planlog plan store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the SQLite database
    #[arg(long, default_value = "plans.db")]
    db: PathBuf,

    /// TOML file with retention settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cached and actual plan counts and the last pruning summary
    Stats,

    /// Print a single plan
    Show { id: u64 },

    /// List user plans from an id upward (at most 20)
    List {
        #[arg(long, default_value_t = 1)]
        from: u64,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        owner: Option<String>,
    },

    /// List user plans that have not finished
    Active,

    /// Find a run of plan ids by creation time (epoch ms, 0 = unbounded)
    Range {
        #[arg(long, default_value_t = 0)]
        start: i64,
        #[arg(long, default_value_t = 0)]
        end: i64,
        #[arg(long, default_value_t = 20)]
        count: usize,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Run one pruning pass and wait for it
    Prune {
        /// Seconds to wait for the run to finish
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let store = commands::open_store(&cli.db, cli.config.as_deref())?;
    let output = match cli.command {
        Commands::Stats => commands::stats(&store),
        Commands::Show { id } => commands::show(&store, id),
        Commands::List { from, limit, owner } => {
            commands::list(&store, from, limit, owner.as_deref())
        }
        Commands::Active => commands::active(&store),
        Commands::Range {
            start,
            end,
            count,
            owner,
        } => commands::range(&store, start, end, count, owner.as_deref()),
        Commands::Prune { timeout } => commands::prune(&store, Duration::from_secs(timeout)),
    };
    store.close();

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}
