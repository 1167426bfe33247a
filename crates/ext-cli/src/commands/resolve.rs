//! Resolve command: locate the file a class autoloads from

use std::path::PathBuf;

use crate::context::Session;
use crate::error::{CliError, Result};

/// Run the resolve command
pub fn run_resolve(session: &Session, class: &str, paths: &[PathBuf]) -> Result<()> {
    let registry = session.load(paths)?;
    let class = class.trim_start_matches('\\');
    match registry.autoloader().find(class) {
        Some(path) => {
            println!("{path}");
            Ok(())
        }
        None => Err(CliError::user(format!(
            "Class '{class}' is not provided by any loaded extension or skin"
        ))),
    }
}
