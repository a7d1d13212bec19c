//! horizon-bridge
//!
//! Drains the Horizon outbox into the operator queue.
//!
//! Exit codes: 0 success, 2 at least one file was rejected, 1 fatal error.

use anyhow::Result;
use clap::{Parser, Subcommand};
use horizon_logging::{init_logging, LogConfig};
use std::process::ExitCode;

mod cli;

use cli::PathArgs;

const APP_NAME: &str = "horizon-bridge";

#[derive(Parser, Debug)]
#[command(name = "horizon-bridge", about = "Bridge Horizon outbox envelopes into the operator queue", version)]
struct Cli {
    /// Mirror info logs to stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Claim outbox files, validate them and update the operator queue
    Run {
        #[command(flatten)]
        paths: PathArgs,

        /// Maximum files to claim this run (0 = unlimited)
        #[arg(long, env = "HORIZON_BRIDGE_MAX_FILES", default_value_t = 0)]
        max_files: usize,

        /// Trace ID for this run (default: generated)
        #[arg(long, env = "HORIZON_BRIDGE_TRACE_ID")]
        trace_id: Option<String>,

        /// Print the run state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the last run, queue and inflight claims
    Status {
        #[command(flatten)]
        paths: PathArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move abandoned inflight claims back into the outbox
    Recover {
        #[command(flatten)]
        paths: PathArgs,

        /// Only claims made at least this many seconds ago
        #[arg(long)]
        older_than_secs: u64,

        /// Report what would move without moving anything
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved paths
    Config {
        #[command(flatten)]
        paths: PathArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn paths(&self) -> &PathArgs {
        match self {
            Commands::Run { paths, .. }
            | Commands::Status { paths, .. }
            | Commands::Recover { paths, .. }
            | Commands::Config { paths, .. } => paths,
        }
    }

    fn wants_json(&self) -> bool {
        match self {
            Commands::Run { json, .. }
            | Commands::Status { json, .. }
            | Commands::Recover { json, .. }
            | Commands::Config { json, .. } => *json,
        }
    }
}

fn run_command(cli: Cli) -> Result<u8> {
    let paths = cli.command.paths().resolve()?;

    let _log_guard = match init_logging(LogConfig {
        app_name: APP_NAME,
        log_dir: &paths.logs,
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match cli.command {
        Commands::Run {
            max_files,
            trace_id,
            json,
            ..
        } => cli::run::run(
            paths,
            cli::run::RunArgs {
                max_files,
                trace_id,
                json,
            },
        ),
        Commands::Status { json, .. } => cli::status::run(&paths, json).map(|()| 0),
        Commands::Recover {
            older_than_secs,
            dry_run,
            json,
            ..
        } => cli::recover::run(
            &paths,
            cli::recover::RecoverArgs {
                older_than_secs,
                dry_run,
                json,
            },
        )
        .map(|()| 0),
        Commands::Config { json, .. } => cli::config::run(&paths, json).map(|()| 0),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.command.wants_json();

    match run_command(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            if json_mode {
                cli::print_json_error(&err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
