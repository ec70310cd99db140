//! Checkpoint CLI - checkpoint command

use anyhow::{Context, Result};
use checkpoint_core::config::STORE_DIR_NAME;
use checkpoint_core::logger::{self, LogOptions};
use clap::Parser;
use cli_lib::{Args, CliSequence};
use owo_colors::OwoColorize;
use std::process::ExitCode;

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();

    // Exits on --help, --version and malformed arguments
    let args = Args::parse_from(&argv);

    let options = LogOptions::default().with_store(&args.path.join(STORE_DIR_NAME));
    let _guard = match logger::init(options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, argv) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(action = %args.action, "{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, argv: Vec<String>) -> Result<Vec<String>> {
    let mut cli = CliSequence::new().context("Failed to assemble CLI sequence")?;
    cli.run(argv)
        .with_context(|| format!("checkpoint {} failed", args.action))
}
