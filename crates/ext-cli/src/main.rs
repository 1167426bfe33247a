//! Extension registry CLI
//!
//! Loads extension and skin manifests from disk and reports what the
//! registry makes of them.

mod cli;
mod commands;
mod context;
mod error;
mod logging;

use std::path::Path;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use context::Session;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose)?;
    tracing::debug!("Verbose mode enabled");

    match cli.command {
        Some(cmd) => execute_command(cmd, cli.config.as_deref(), cli.no_cache),
        None => {
            // No command provided - show help hint
            println!("{} Extension registry CLI", "extreg".green().bold());
            println!();
            println!("Run {} for available commands.", "extreg --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands, config: Option<&Path>, no_cache: bool) -> Result<()> {
    if let Commands::Completions { shell } = cmd {
        return commands::run_completions(shell);
    }

    let session = Session::new(config, no_cache)?;
    match cmd {
        Commands::Load {
            paths,
            attribute,
            output,
        } => commands::run_load(&session, &paths, attribute.as_deref(), output.as_deref()),
        Commands::Check { paths } => commands::run_check(&session, &paths),
        Commands::Resolve { class, paths } => commands::run_resolve(&session, &class, &paths),
        Commands::Credits { paths, json } => commands::run_credits(&session, &paths, json),
        Commands::Completions { shell } => commands::run_completions(shell),
    }
}
