//! Common types shared by the engine and the replay core.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Ordered vertex list of a body's shape, in engine space.
pub type Outline = Vec<Vector2<f64>>;

/// Stable identifier for a simulated body.
///
/// Assigned by the engine and never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(pub u64);

impl BodyId {
    /// Returns the raw integer id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The writable kinematic part of a body.
///
/// This is what the time cursor restores when scrubbing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// Center of mass position (engine units)
    pub position: Vector2<f64>,

    /// Velocity (engine units per step)
    pub velocity: Vector2<f64>,

    /// Orientation in radians
    pub angle: f64,

    /// Angular velocity (radians per step)
    pub angular_velocity: f64,
}

impl KinematicState {
    /// A body at rest at the given position.
    pub fn at_rest(position: Vector2<f64>) -> Self {
        Self {
            position,
            velocity: Vector2::zeros(),
            angle: 0.0,
            angular_velocity: 0.0,
        }
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
            && self.velocity.iter().all(|c| c.is_finite())
            && self.angle.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// Everything the replay core reads from a live body on each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySample {
    /// Body identity
    pub id: BodyId,

    /// Center of mass position (engine units)
    pub position: Vector2<f64>,

    /// Velocity (engine units per step)
    pub velocity: Vector2<f64>,

    /// Orientation in radians
    pub angle: f64,

    /// Angular velocity (radians per step)
    pub angular_velocity: f64,

    /// Current shape outline in engine space
    pub outline: Outline,

    /// Mass (not affected by any frame transform)
    pub mass: f64,

    /// Fixed/background bodies never move under simulation
    pub is_static: bool,
}

impl BodySample {
    /// Extracts the writable kinematic state.
    pub fn kinematic_state(&self) -> KinematicState {
        KinematicState {
            position: self.position,
            velocity: self.velocity,
            angle: self.angle,
            angular_velocity: self.angular_velocity,
        }
    }
}
