//! kinetrace Core - Frame-Indexed Replay for 2-D Simulations
//!
//! This library records every tracked body once per engine tick and lets a
//! paused session travel back through that history without re-simulating:
//! 1. **Recording**: per-object, frame-indexed engine-space snapshots
//! 2. **Scrubbing**: recorded state written back into the live engine
//! 3. **Kinematics**: world-space position, velocity, finite-difference
//!    acceleration, angular motion and momentum for graphing
//!
//! The engine itself is external, reached through
//! [`kinetrace_env::PhysicsEngine`]. A [`Session`] owns it together with all
//! replay state and gates every operation on the run/edit/scrub [`Mode`].

pub mod config;
pub mod cursor;
pub mod derived;
pub mod edit;
pub mod error;
pub mod graph;
pub mod initial_state;
pub mod persist;
pub mod recorder;
pub mod session;
pub mod transform;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use config::{AngleUnit, DisplayConfig, ReplayConfig, MAX_DECIMALS};
pub use cursor::TimeCursor;
pub use derived::{DerivedPoint, HistoryView, Kinematics, Quantity, QuantityGroup};
pub use edit::{EditCommand, EditOutcome};
pub use error::ReplayError;
pub use graph::{Chart, ChartId, GraphSync, PointBatch, PointObserver, Series};
pub use initial_state::{InitialState, InitialStateRegistry};
pub use persist::{BodyRecord, ChartRecord, SceneDocument};
pub use recorder::{FrameRecorder, FrameSeries, Snapshot};
pub use session::{BodyChanges, Mode, Session};
pub use transform::TransformConfig;
