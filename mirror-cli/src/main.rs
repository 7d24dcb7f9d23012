//! Mirror: reconcile a target observability tenant with an exported archive.
//!
//! # Usage
//!
//! ```text
//! mirror sync [--config mirror.yaml] [--target-url URL] [--target-token TOKEN]
//!             [--archive-dir DIR] [--outputs-dir DIR] [--batch-size N]
//!             [--max-parallel N] [--threshold PCT] [--allow-empty-source]
//!             [--dry-run] [--json]
//! mirror plan [same target flags] [--json]
//! ```

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use commands::{plan::PlanArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mirror",
    version,
    about = "Mirror folders and dashboards from an export archive into a target tenant",
    long_about = None,
)]
struct Cli {
    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete orphans, then replace or create every archived resource in the target.
    Sync(SyncArgs),

    /// Show what `sync` would do without changing the target.
    Plan(PlanArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => return fail(anyhow::Error::new(err).context("failed to start tokio runtime")),
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Sync(args) => args.run().await,
            Commands::Plan(args) => args.run().await,
        }
    });

    match result {
        Ok(code) => code,
        Err(err) => fail(err),
    }
}

fn fail(err: anyhow::Error) -> ExitCode {
    eprintln!("{} {err:#}", "error:".red().bold());
    ExitCode::FAILURE
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
