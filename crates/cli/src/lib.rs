pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::history::HistoryArgs;
use crate::commands::run::RunArgs;

#[derive(Debug, Parser)]
#[command(
    name = "adpilot",
    about = "Adpilot operator CLI",
    long_about = "Run the campaign decision agent, inspect run history, and manage the local \
                  store.",
    after_help = concat!(
        "Examples:\n",
        "  adpilot run --customer-id 123-456-7890 --dry-run\n",
        "  adpilot history --customer-id 1234567890 --limit 5\n",
        "  adpilot doctor --json"
    )
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the decision agent over every configured campaign of one customer")]
    Run(RunArgs),
    #[command(about = "List recent runs for a customer, newest first")]
    History(HistoryArgs),
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo customer's instruction and campaign documents")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::History(args) => commands::history::run(args),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
