//! Derived-Quantity Engine
//!
//! Turns consecutive engine-space snapshots into world-space kinematics:
//! position, displacement, velocity, acceleration, angular motion and
//! momentum. Everything is computed at full precision; rounding happens only
//! when a value is presented (see [`Kinematics::display_value`]).
//!
//! Acceleration is a backward finite difference of the *engine-space*
//! velocities of frames `f` and `f-1`, transformed to world space and divided
//! by the real elapsed seconds between the two snapshots.

use crate::config::{AngleUnit, DisplayConfig};
use crate::error::ReplayError;
use crate::initial_state::InitialStateRegistry;
use crate::recorder::{FrameRecorder, Snapshot};
use crate::transform::TransformConfig;
use kinetrace_env::BodyId;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Elapsed intervals shorter than this give zero acceleration.
const MIN_INTERVAL_SECS: f64 = 1e-12;

/// A graphable derived quantity.
///
/// Declaration order is the order series appear in a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    X,
    Y,
    DeltaX,
    DeltaY,
    Vx,
    Vy,
    Speed,
    Ax,
    Ay,
    Acceleration,
    Theta,
    Omega,
    Px,
    Py,
    Momentum,
}

/// Groups used to compose a chart's axis title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuantityGroup {
    Position,
    Displacement,
    Velocity,
    Acceleration,
    AngularPosition,
    AngularVelocity,
    Momentum,
}

impl Quantity {
    pub const ALL: [Quantity; 15] = [
        Quantity::X,
        Quantity::Y,
        Quantity::DeltaX,
        Quantity::DeltaY,
        Quantity::Vx,
        Quantity::Vy,
        Quantity::Speed,
        Quantity::Ax,
        Quantity::Ay,
        Quantity::Acceleration,
        Quantity::Theta,
        Quantity::Omega,
        Quantity::Px,
        Quantity::Py,
        Quantity::Momentum,
    ];

    /// Series label.
    pub fn label(&self) -> &'static str {
        match self {
            Quantity::X => "X",
            Quantity::Y => "Y",
            Quantity::DeltaX => "\u{0394} X",
            Quantity::DeltaY => "\u{0394} Y",
            Quantity::Vx => "Vx",
            Quantity::Vy => "Vy",
            Quantity::Speed => "|V|",
            Quantity::Ax => "Ax",
            Quantity::Ay => "Ay",
            Quantity::Acceleration => "|A|",
            Quantity::Theta => "\u{03B8}",
            Quantity::Omega => "\u{03C9}",
            Quantity::Px => "px",
            Quantity::Py => "py",
            Quantity::Momentum => "|p|",
        }
    }

    /// Unit text, depending on the angle unit for θ and ω.
    pub fn units(&self, angle_unit: AngleUnit) -> &'static str {
        match self.group() {
            QuantityGroup::Position | QuantityGroup::Displacement => "m",
            QuantityGroup::Velocity => "m/s",
            QuantityGroup::Acceleration => "m/s/s",
            QuantityGroup::AngularPosition => angle_unit.angle_suffix(),
            QuantityGroup::AngularVelocity => angle_unit.rate_suffix(),
            QuantityGroup::Momentum => "kg*m/s",
        }
    }

    pub fn group(&self) -> QuantityGroup {
        match self {
            Quantity::X | Quantity::Y => QuantityGroup::Position,
            Quantity::DeltaX | Quantity::DeltaY => QuantityGroup::Displacement,
            Quantity::Vx | Quantity::Vy | Quantity::Speed => QuantityGroup::Velocity,
            Quantity::Ax | Quantity::Ay | Quantity::Acceleration => QuantityGroup::Acceleration,
            Quantity::Theta => QuantityGroup::AngularPosition,
            Quantity::Omega => QuantityGroup::AngularVelocity,
            Quantity::Px | Quantity::Py | Quantity::Momentum => QuantityGroup::Momentum,
        }
    }
}

impl QuantityGroup {
    /// Axis title fragment for this group.
    pub fn title(&self, angle_unit: AngleUnit) -> String {
        match self {
            QuantityGroup::Position => "Position (m)".to_string(),
            QuantityGroup::Displacement => "Displacement (m)".to_string(),
            QuantityGroup::Velocity => "Velocity (m/s)".to_string(),
            QuantityGroup::Acceleration => "Acceleration (m/s/s)".to_string(),
            QuantityGroup::AngularPosition => {
                format!("Angular Position ({})", angle_unit.angle_suffix())
            }
            QuantityGroup::AngularVelocity => {
                format!("Angular Velocity ({})", angle_unit.rate_suffix())
            }
            QuantityGroup::Momentum => "Momentum (kg*m/s)".to_string(),
        }
    }
}

/// One graph point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedPoint {
    pub time: f64,
    pub value: f64,
}

/// Full-precision world-space kinematics of one object at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub frame: usize,
    pub time: f64,
    pub position: Vector2<f64>,
    pub displacement: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub acceleration: Vector2<f64>,

    /// World angle in radians
    pub angle: f64,

    /// World angular rate in radians per second
    pub angular_rate: f64,

    pub momentum: Vector2<f64>,
}

impl Kinematics {
    /// Derives kinematics for `current` given its predecessor frame.
    ///
    /// `baseline` is the engine-space position displacement is measured
    /// from. With no predecessor, or a zero-length interval, acceleration
    /// is zero.
    pub fn derive(
        current: &Snapshot,
        previous: Option<&Snapshot>,
        baseline: Vector2<f64>,
        transform: &TransformConfig,
    ) -> Self {
        let position = transform.position_to_world(current.position);
        let displacement = position - transform.position_to_world(baseline);
        let velocity = transform.velocity_to_world(current.velocity);

        let acceleration = previous
            .map(|prev| finite_difference(prev, current, transform))
            .unwrap_or_else(Vector2::zeros);

        Self {
            frame: current.frame,
            time: current.time,
            position,
            displacement,
            velocity,
            acceleration,
            angle: transform.angle_to_world(current.angle),
            angular_rate: transform.angular_rate_to_world(current.angular_velocity),
            momentum: velocity * current.mass,
        }
    }

    /// Raw value of a quantity (angles in radians).
    pub fn value(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::X => self.position.x,
            Quantity::Y => self.position.y,
            Quantity::DeltaX => self.displacement.x,
            Quantity::DeltaY => self.displacement.y,
            Quantity::Vx => self.velocity.x,
            Quantity::Vy => self.velocity.y,
            Quantity::Speed => self.velocity.norm(),
            Quantity::Ax => self.acceleration.x,
            Quantity::Ay => self.acceleration.y,
            Quantity::Acceleration => self.acceleration.norm(),
            Quantity::Theta => self.angle,
            Quantity::Omega => self.angular_rate,
            Quantity::Px => self.momentum.x,
            Quantity::Py => self.momentum.y,
            Quantity::Momentum => self.momentum.norm(),
        }
    }

    /// Value as presented: angle unit applied, then rounded.
    pub fn display_value(&self, quantity: Quantity, display: &DisplayConfig) -> f64 {
        let raw = self.value(quantity);
        let value = match quantity.group() {
            QuantityGroup::AngularPosition | QuantityGroup::AngularVelocity => {
                display.angle_unit.convert_radians(raw)
            }
            _ => raw,
        };
        display.round(value)
    }

    /// Rounded graph point for a quantity, keyed by rounded world time.
    pub fn point(&self, quantity: Quantity, display: &DisplayConfig) -> DerivedPoint {
        DerivedPoint {
            time: display.round(self.time),
            value: self.display_value(quantity, display),
        }
    }
}

/// Backward difference of two frames' velocities, in world units per second².
fn finite_difference(
    previous: &Snapshot,
    current: &Snapshot,
    transform: &TransformConfig,
) -> Vector2<f64> {
    let elapsed = current.time - previous.time;
    if !(elapsed > MIN_INTERVAL_SECS) {
        return Vector2::zeros();
    }
    let delta_v = transform.velocity_to_world(current.velocity - previous.velocity);
    delta_v / elapsed
}

/// Read-only view over everything the derived engine consumes.
#[derive(Clone, Copy)]
pub struct HistoryView<'a> {
    pub recorder: &'a FrameRecorder,
    pub registry: &'a InitialStateRegistry,
    pub transform: &'a TransformConfig,
    pub display: &'a DisplayConfig,
}

impl<'a> HistoryView<'a> {
    /// Kinematics of an object at a recorded frame.
    pub fn kinematics(&self, id: BodyId, frame: usize) -> Result<Kinematics, ReplayError> {
        let current = self.recorder.get(id, frame)?;
        let previous = frame
            .checked_sub(1)
            .and_then(|f| self.recorder.get(id, f).ok());
        let baseline = self.baseline(id).unwrap_or(current.position);

        Ok(Kinematics::derive(current, previous, baseline, self.transform))
    }

    /// Engine-space displacement origin: the InitialState position, or the
    /// first recorded snapshot once the registry entry is gone.
    fn baseline(&self, id: BodyId) -> Option<Vector2<f64>> {
        self.registry
            .get(id)
            .map(|state| state.position)
            .or_else(|| {
                self.recorder
                    .series(id)
                    .and_then(|series| series.iter().next())
                    .map(|snapshot| snapshot.position)
            })
    }
}
