//! Check command: verify that manifests load and their requirements hold

use std::path::PathBuf;

use colored::Colorize;

use crate::context::Session;
use crate::error::Result;

/// Run the check command
pub fn run_check(session: &Session, paths: &[PathBuf]) -> Result<()> {
    let registry = session.load(paths)?;

    for credit in registry.all_things().values() {
        println!(
            "  {} {} {}",
            "✓".green(),
            credit.name,
            credit.version.as_deref().unwrap_or("").dimmed()
        );
    }
    println!();
    println!(
        "{} {} loaded against MediaWiki {}, all requirements met.",
        "OK".green().bold(),
        plural(registry.all_things().len(), "unit"),
        session.config.host_version
    );
    Ok(())
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
