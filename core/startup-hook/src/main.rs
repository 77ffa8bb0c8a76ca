//! `the-startup` - Claude Code hook collectors and metrics analysis.

mod display;
mod log_cmd;
mod logging;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "the-startup",
    about = "Developer-workflow companion for Claude Code",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process hook data from stdin or analyze collected metrics
    Log(log_cmd::LogArgs),
}

fn main() -> ExitCode {
    logging::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Log(args) => match log_cmd::run(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("{message}");
                ExitCode::FAILURE
            }
        },
    }
}
