//! Error taxonomy for the replay core.
//!
//! Nothing here is fatal. Lookups that miss are skipped by callers, frames
//! out of range are clamped by the cursor, and mode violations leave the
//! session untouched.

use crate::session::Mode;
use kinetrace_env::{BodyId, EnvError};
use thiserror::Error;

/// Errors produced by the replay core.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Lookup by id found nothing (object deleted or never registered)
    #[error("Object {0} is not tracked")]
    MissingObject(BodyId),

    /// Frame index beyond what has been recorded for this object
    #[error("Frame {frame} is outside the recorded range {first}..{end}")]
    OutOfRangeFrame { frame: usize, first: usize, end: usize },

    /// Negative frame index handed to a defensive lookup
    #[error("Negative frame index {0}")]
    NegativeFrame(i64),

    /// Negative or non-finite elapsed time handed to a time lookup
    #[error("Invalid elapsed time {0}s")]
    InvalidTime(f64),

    /// Operation not permitted in the current session mode
    #[error("Cannot {op} while {mode}")]
    InvalidMode { op: &'static str, mode: Mode },

    /// Timestep edits must be positive and finite
    #[error("Timestep must be positive and finite, got {0}s")]
    InvalidTimestep(f64),

    /// Display precision beyond what an f64 carries
    #[error("Decimal places must be at most {max}, got {0}", max = crate::config::MAX_DECIMALS)]
    InvalidDecimals(u32),

    /// The world origin reference cannot be deleted
    #[error("Object {0} is the world origin and cannot be deleted")]
    OriginBody(BodyId),

    /// Chart id not known to the graph synchronizer
    #[error("Chart {0} does not exist")]
    MissingChart(usize),

    /// Engine refused a write
    #[error(transparent)]
    Engine(#[from] EnvError),

    /// Scene document could not be encoded or decoded
    #[error("Scene document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl ReplayError {
    /// Creates a mode violation error.
    pub fn invalid_mode(op: &'static str, mode: Mode) -> Self {
        Self::InvalidMode { op, mode }
    }

    /// True for errors that callers treat as "no update for this object".
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::MissingObject(_) | Self::OutOfRangeFrame { .. } | Self::NegativeFrame(_)
        )
    }
}
