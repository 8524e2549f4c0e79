//! # Presto Adapter CLI
//!
//! Runs statements and introspection queries through the bounded adapter
//! and prints the results as JSON.
//!
//! ## Usage
//!
//! ```bash
//! presto-adapter query "select * from hive.web.events" --row-limit 50
//! presto-adapter schemas hive
//! presto-adapter describe hive.web.events
//! presto-adapter preview hive.web.events --limit 5
//! presto-adapter evaluate models.sql
//! ```
//!
//! ## Tracing
//!
//! - `PA_TRACE=1` enables tracing to `PA_TRACE_FILE` (default `pa_trace.log`)
//! - `PA_TRACE_LEVEL` / `PA_TRACE_JSON` override `[logging]` level and format

use anyhow::Context;
use clap::{Parser, Subcommand};
use presto_adapter::config::LoggingConfig;
use presto_adapter::{split_statements, Config, QueryAdapter, Target, DEFAULT_PREVIEW_ROWS};
use serde::Serialize;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACE_FILE: &str = "pa_trace.log";

#[derive(Parser)]
#[command(name = "presto-adapter", version, about = "Bounded query runner for Presto")]
struct Cli {
    /// Configuration file (defaults to presto-adapter.toml + local overrides)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured row limit
    #[arg(long, global = true)]
    row_limit: Option<usize>,

    /// Override the configured byte limit
    #[arg(long, global = true)]
    byte_limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one statement
    Query { sql: String },
    /// List catalogs
    Catalogs,
    /// List schemas of a catalog
    Schemas { catalog: String },
    /// List every table
    Tables,
    /// Describe a table (catalog.schema.table)
    Describe { target: String },
    /// Show the first rows of a table (catalog.schema.table)
    Preview {
        target: String,
        #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        limit: usize,
    },
    /// Validate each `;`-separated statement of a file with explain
    Evaluate { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(&path.to_string_lossy())
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load().unwrap_or_else(|_| {
            eprintln!("Using default configuration");
            Config::default()
        }),
    };
    if let Some(rows) = cli.row_limit {
        config.limits.row_limit = rows;
    }
    if let Some(bytes) = cli.byte_limit {
        config.limits.byte_limit = bytes;
    }

    let _trace_guard = init_tracing(&config.logging);

    let adapter = QueryAdapter::from_config(&config)?;

    match cli.command {
        Command::Query { sql } => print_json(&adapter.execute(&sql).await?)?,
        Command::Catalogs => print_json(&adapter.catalogs().await?)?,
        Command::Schemas { catalog } => print_json(&adapter.schemas(&catalog).await?)?,
        Command::Tables => print_json(&adapter.tables().await?)?,
        Command::Describe { target } => {
            let target: Target = target.parse()?;
            print_json(&adapter.table(&target).await?)?;
        }
        Command::Preview { target, limit } => {
            let target: Target = target.parse()?;
            print_json(&adapter.preview(&target, limit).await?)?;
        }
        Command::Evaluate { file } => {
            let script = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let evaluations = adapter.evaluate(&split_statements(&script)).await;
            let failed = evaluations.iter().filter(|e| !e.is_success()).count();
            print_json(&evaluations)?;
            if failed > 0 {
                anyhow::bail!("{failed} of {} statements failed validation", evaluations.len());
            }
        }
    }

    adapter.close().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Install the file subscriber when `PA_TRACE` is set; the returned guard
/// flushes the writer on drop
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    if !env::var("PA_TRACE").is_ok_and(|v| v != "0") {
        return None;
    }
    let logging = logging.with_env_overrides();
    let path = env::var("PA_TRACE_FILE").unwrap_or_else(|_| DEFAULT_TRACE_FILE.to_string());

    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("presto-adapter: cannot open trace file '{path}': {e}");
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer);
    let installed = if logging.is_json() {
        subscriber.json().try_init()
    } else {
        subscriber.compact().try_init()
    };
    if let Err(e) = installed {
        eprintln!("presto-adapter: tracing disabled: {e}");
    }
    Some(guard)
}
