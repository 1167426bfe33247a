//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Extension registry - load extension and skin manifests and inspect the result
#[derive(Parser, Debug)]
#[command(name = "extreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "EXTREG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not read or write the persistent cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Load manifests and print the resulting configuration
    ///
    /// Each path is a manifest file, a directory holding extension.json or
    /// skin.json, or a directory whose subdirectories hold them.
    ///
    /// Examples:
    ///   extreg load extensions/Foo/extension.json
    ///   extreg load extensions skins
    ///   extreg load extensions --attribute HostPlugins
    ///   extreg load extensions --output settings.yaml
    Load {
        /// Manifest files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print a single registry attribute instead of the settings
        #[arg(short, long)]
        attribute: Option<String>,

        /// Write the settings to a file; the format follows its extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that manifests load and their requirements are met
    Check {
        /// Manifest files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the file a class autoloads from
    Resolve {
        /// Fully qualified class name
        class: String,

        /// Manifest files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the loaded extensions and skins
    Credits {
        /// Manifest files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
