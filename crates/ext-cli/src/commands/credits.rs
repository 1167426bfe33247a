//! Credits command: list loaded extensions and skins

use std::path::PathBuf;

use colored::Colorize;
use ext_registry::Credit;

use crate::context::Session;
use crate::error::Result;

/// Run the credits command
pub fn run_credits(session: &Session, paths: &[PathBuf], json: bool) -> Result<()> {
    let registry = session.load(paths)?;
    let credits: Vec<&Credit> = registry.all_things().values().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&credits)?);
        return Ok(());
    }

    for kind in ["skin", "other"] {
        let group: Vec<&&Credit> = credits
            .iter()
            .filter(|credit| (credit.kind == "skin") == (kind == "skin"))
            .collect();
        if group.is_empty() {
            continue;
        }
        let label = if kind == "skin" { "Skins" } else { "Extensions" };
        println!("{}:", label.cyan().bold());
        for credit in group {
            println!("  {}", describe(credit));
        }
        println!();
    }
    Ok(())
}

fn describe(credit: &Credit) -> String {
    let mut line = format!("{:<24}", credit.name.green());
    if let Some(version) = &credit.version {
        line.push_str(&format!(" {version}"));
    }
    let authors = credit.authors();
    if !authors.is_empty() {
        line.push_str(&format!(" by {}", authors.join(", ")));
    }
    if let Some(license) = &credit.license_name {
        line.push_str(&format!(" ({})", license.dimmed()));
    }
    line
}
