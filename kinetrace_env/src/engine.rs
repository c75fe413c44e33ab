//! The engine trait the replay core drives.

use crate::{BodyId, BodySample, EnvError, KinematicState};

/// The central interface to an external physics engine.
///
/// The engine owns integration, contact and constraint solving. The replay
/// core only reads per-body samples, advances the engine one fixed step at a
/// time and, when scrubbing, writes recorded kinematic state back.
///
/// # Units
///
/// All values are engine space. Velocities are per-step quantities, so a
/// body moving at `v` covers `v` engine units per call to [`step`].
///
/// [`step`]: PhysicsEngine::step
pub trait PhysicsEngine {
    /// Ids of every body currently in the engine, in a stable order.
    ///
    /// Bodies may appear or disappear between ticks.
    fn body_ids(&self) -> Vec<BodyId>;

    /// Reads the live state of a body, or `None` if it no longer exists.
    fn sample(&self, id: BodyId) -> Option<BodySample>;

    /// Overwrites position, velocity, angle and angular velocity of a body.
    fn write_state(&mut self, id: BodyId, state: &KinematicState) -> Result<(), EnvError>;

    /// Advances the simulation exactly once by `dt` seconds, starting from
    /// elapsed simulation time `time`.
    ///
    /// Time-dependent inputs (applied forces with a start and end) must read
    /// `time` rather than an internal clock, which scrubbing cannot restore.
    fn step(&mut self, time: f64, dt: f64);

    /// Deletes a body.
    fn remove_body(&mut self, id: BodyId) -> Result<(), EnvError>;

    /// Re-derives geometry cached against a body's rotation.
    ///
    /// Constraint anchor offsets are stored relative to the angle the body
    /// had when they were last touched. After kinematic state has been
    /// written directly, they must be re-projected onto the new angle.
    fn refresh_anchors(&mut self);

    /// True if a body with this id exists.
    fn contains(&self, id: BodyId) -> bool {
        self.sample(id).is_some()
    }

    /// Number of bodies in the engine.
    fn body_count(&self) -> usize {
        self.body_ids().len()
    }
}
