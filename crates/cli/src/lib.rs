pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "docket",
    about = "Docket operator CLI",
    long_about = "Inspect docket configuration, check Redis readiness, and manage the demo agenda.",
    after_help = "Examples:\n  docket doctor --json\n  docket config\n  docket seed\n  docket list"
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
    #[command(about = "Validate config, digest schedule, and Redis connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Load the demo agenda items (idempotent)")]
    Seed {
        #[arg(long, help = "Remove the demo items instead of adding them")]
        clean: bool,
    },
    #[command(about = "Print the current agenda as the bot would render it")]
    List {
        #[arg(long, help = "Keep store scan order instead of display order")]
        unsorted: bool,
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
        Command::Seed { clean } => commands::seed::run(clean),
        Command::List { unsorted } => commands::list::run(unsorted),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
