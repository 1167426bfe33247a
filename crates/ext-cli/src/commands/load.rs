//! Load command: print the configuration a set of manifests produces

use std::path::{Path, PathBuf};

use colored::Colorize;
use ext_fs::{ConfigStore, NormalizedPath};

use crate::context::Session;
use crate::error::Result;

/// Run the load command
///
/// Prints the finished settings as JSON, or one attribute when `attribute`
/// is given. With `output` the settings are written to that file instead.
pub fn run_load(
    session: &Session,
    paths: &[PathBuf],
    attribute: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let mut registry = session.load(paths)?;

    if let Some(name) = attribute {
        let value = registry.attribute(name)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let config = registry.finish();
    match output {
        Some(path) => {
            ConfigStore::new().save(&NormalizedPath::new(path), &config)?;
            println!(
                "{} Wrote {} settings to {}",
                "OK".green().bold(),
                config.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
