//! Error types for the simulation driver.

use kinetrace_core::ReplayError;
use kinetrace_env::EnvError;
use thiserror::Error;

/// Errors that can occur while building, running or exporting a scenario.
#[derive(Debug, Error)]
pub enum SimError {
    /// The replay session refused an operation
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// The reference engine refused a body, force or spring
    #[error(transparent)]
    Engine(#[from] EnvError),

    /// Export or scene file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
