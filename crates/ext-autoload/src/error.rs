use ext_fs::NormalizedPath;

/// Result type for autoloader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when a resolution is actually required.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No loader could resolve the class.
    #[error("Class '{class}' not found")]
    ClassNotFound { class: String },

    /// A bootstrap file listed for eager loading does not exist.
    #[error("Autoload file not found: {path}")]
    MissingFile { path: NormalizedPath },
}
