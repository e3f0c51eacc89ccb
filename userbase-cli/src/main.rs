//! Userbase CLI - user records and workers from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{fetch, logs, serve, status, user, work};

/// Userbase - user records over HTTP and a toy worker pool
#[derive(Parser)]
#[command(name = "ub", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server until interrupted
    Serve {
        /// Address to listen on (overrides settings)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides settings)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Manage user records
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Double a list of integers through the worker pool
    Work {
        /// Values to process
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<i64>,
        /// Number of workers (defaults to settings)
        #[arg(long, short)]
        workers: Option<usize>,
        /// Simulated work per item in milliseconds (defaults to settings)
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// GET a URL and print the body
    Fetch {
        url: String,
        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Show storage status and user count
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => serve::run(host, port),
        Commands::User { command } => user::run(command),
        Commands::Work {
            values,
            workers,
            delay_ms,
            json,
        } => work::run(values, workers, delay_ms, json),
        Commands::Fetch { url, timeout } => fetch::run(&url, timeout),
        Commands::Logs { command } => logs::run(command),
        Commands::Status { json } => status::run(json),
    }
}
