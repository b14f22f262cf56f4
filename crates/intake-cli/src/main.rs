//! # intake CLI entry point

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use intake_cli::steps::{run_steps, StepsArgs};
use intake_cli::validate::{run_validate, ValidateArgs};
use intake_cli::website::{run_check_website, WebsiteArgs};

/// Operator tooling for the loan intake service.
#[derive(Parser, Debug)]
#[command(name = "intake", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the step table.
    Steps(StepsArgs),

    /// Check a session snapshot directory against the step table.
    Validate(ValidateArgs),

    /// Fetch and score a business website.
    CheckWebsite(WebsiteArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
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
        Commands::Steps(args) => run_steps(&args),
        Commands::Validate(args) => run_validate(&args),
        Commands::CheckWebsite(args) => run_check_website(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
