pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shopmate",
    about = "Shopmate operator CLI",
    long_about = "Inspect configuration, check readiness, sync the store catalog into the search index, and try product searches.",
    after_help = "Examples:\n  shopmate doctor --json\n  shopmate config\n  shopmate sync\n  shopmate search \"beach towel\" --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check search index, upstream and model readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Refresh categories, products and coupons from the upstream store")]
    Sync,
    #[command(about = "Run the multi-strategy product search against the index")]
    Search {
        query: String,
        #[arg(long, default_value_t = commands::search::DEFAULT_LIMIT)]
        limit: usize,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Sync => commands::sync::run(),
        Command::Search { query, limit } => commands::search::run(&query, limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
