//! kinetrace Engine Abstraction Layer
//!
//! The replay core never owns the physics. Stepping, contact and constraint
//! mathematics live in an external engine that is reached only through the
//! [`PhysicsEngine`] trait defined here.
//!
//! # Core Concept: Engine Space
//!
//! Everything crossing this boundary is in the engine's native frame:
//! - Positions and outlines in engine units, engine axis sense
//! - Velocities in *per-step* units (displacement per tick, not per second)
//! - Angles in radians, engine rotational sense
//!
//! Conversion to a user-facing world frame is the job of
//! `kinetrace_core::transform`.
//!
//! # Example
//!
//! ```ignore
//! use kinetrace_env::{PhysicsEngine, KinematicState};
//!
//! fn freeze_all<E: PhysicsEngine>(engine: &mut E) {
//!     for id in engine.body_ids() {
//!         if let Some(sample) = engine.sample(id) {
//!             let mut state = sample.kinematic_state();
//!             state.velocity = nalgebra::Vector2::zeros();
//!             let _ = engine.write_state(id, &state);
//!         }
//!     }
//! }
//! ```

mod engine;
mod types;
mod error;

pub use engine::PhysicsEngine;
pub use types::{BodyId, BodySample, KinematicState, Outline};
pub use error::EnvError;
