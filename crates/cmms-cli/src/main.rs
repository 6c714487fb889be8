//! # cmms CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmms_cli::next_due::{run_next_due, NextDueArgs};
use cmms_cli::serve::{run_serve, ServeArgs};
use cmms_cli::tree::{run_tree, TreeArgs};

/// CMMS command-line tool.
///
/// Computes recurrence dates, checks equipment exports, and runs the API
/// server.
#[derive(Parser, Debug)]
#[command(name = "cmms", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the next due dates of a recurring task.
    NextDue(NextDueArgs),

    /// Validate an equipment export and print its tree.
    Tree(TreeArgs),

    /// Run the API server.
    Serve(ServeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // `serve` logs at info by default; the offline tools stay quiet.
    let floor = match cli.command {
        Commands::Serve(_) => 1,
        _ => 0,
    };
    let filter = match cli.verbose.max(floor) {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::NextDue(args) => run_next_due(&args),
        Commands::Tree(args) => run_tree(&args),
        Commands::Serve(args) => run_serve(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
