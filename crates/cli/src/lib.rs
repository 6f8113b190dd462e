pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hoops_core::domain::AnalysisVariant;

#[derive(Debug, Parser)]
#[command(
    name = "hoops",
    about = "Hoops Insights operator CLI",
    long_about = "Count baskets in basketball clips, print feedback tiers, and inspect runtime readiness.",
    after_help = "Examples:\n  hoops analyze game.mp4 --variant tool_feedback\n  hoops feedback 7\n  hoops doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Analyze a video file and print the structured result as JSON")]
    Analyze {
        #[arg(help = "Path to a video file (mp4, webm, mov, ...)")]
        file: PathBuf,
        #[arg(long, help = "Output variant: feedback | tool_feedback | commentary")]
        variant: Option<AnalysisVariant>,
    },
    #[command(about = "Print the deterministic feedback tier for a basket count")]
    Feedback {
        #[arg(help = "Number of baskets scored")]
        count: u64,
    },
    #[command(about = "Ask the model for coaching feedback on a known basket count")]
    Coach {
        #[arg(help = "Number of baskets scored")]
        count: u64,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model readiness, and prompt templates")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Analyze { file, variant } => commands::analyze::run(&file, variant),
        Command::Feedback { count } => commands::feedback::run(count),
        Command::Coach { count } => commands::coach::run(count),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
