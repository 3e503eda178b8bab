//! CLI error types

use binding_core::config::ConfigError;
use binding_core::types::BindingError;
use thiserror::Error;

/// Errors surfaced by the `binding` command
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be assembled
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The object graph reported a failure
    #[error("Graph error: {0}")]
    Binding(#[from] BindingError),

    /// A command argument was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
