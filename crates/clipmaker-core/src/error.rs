//! Error types for configuration and run bookkeeping.

use thiserror::Error;

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} is not set. Add it to the environment or to .env.local")]
    MissingVar(&'static str),

    /// An environment variable is set but cannot be used.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Name of the variable.
        var: &'static str,
        /// The raw value that was rejected.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configured path does not exist or is not usable.
    #[error("path not usable: {path} ({reason})")]
    BadPath {
        /// The offending path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// IO error while preparing directories.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
