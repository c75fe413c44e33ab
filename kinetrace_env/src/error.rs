//! Error types for the engine abstraction.

use crate::BodyId;
use thiserror::Error;

/// Errors that can occur when talking to a physics engine.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The engine has no body with this id (removed between ticks, etc.)
    #[error("Unknown body: {0}")]
    UnknownBody(BodyId),

    /// The body exists but refuses kinematic writes (static/fixed bodies)
    #[error("Body {0} is static and cannot be moved")]
    StaticBody(BodyId),

    /// A value written to the engine was NaN or infinite
    #[error("Non-finite value for {field} on body {id}")]
    NonFinite { id: BodyId, field: &'static str },

    /// Dynamic bodies need a positive, finite mass
    #[error("Invalid mass {0}: must be positive and finite")]
    InvalidMass(f64),

    /// Engine-specific failure
    #[error("Engine error: {0}")]
    EngineError(String),
}

impl EnvError {
    /// Creates an engine-specific error.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineError(msg.into())
    }
}
