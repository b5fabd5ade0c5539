//! Error types for boardcheck.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Setup errors
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Background work did not drain within {secs} seconds")]
    BarrierTimeout { secs: u64 },

    #[error("Example enumeration failed: {0}")]
    ExampleSource(String),

    // Per-case errors
    #[error("Failed to create the project {workspace}: {reason}")]
    ProjectCreation { workspace: String, reason: String },

    #[error("Build of {workspace} failed: {reason}")]
    Build { workspace: String, reason: String },

    #[error("Diagnostics unavailable for {workspace}: {reason}")]
    Diagnostics { workspace: String, reason: String },

    // Infrastructure errors
    #[error("Toolchain error: {0}")]
    Toolchain(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means the environment is broken and the whole run
    /// must stop before any case executes.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Error::TargetNotFound(_)
                | Error::Setup(_)
                | Error::BarrierTimeout { .. }
                | Error::ExampleSource(_)
                | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
