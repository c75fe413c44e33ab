//! Named kinematics scenarios.

use crate::engine::{rectangle, regular_polygon, AppliedForce, SimEngine, SpringLink};
use crate::error::SimError;
use crate::world::SimConfig;

use kinetrace_env::{BodyId, PhysicsEngine};
use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::FRAC_PI_2;

/// Engine-space force of the constant-force scenario (mass 2, so 2 units/s²).
pub const CONSTANT_FORCE: Vector2<f64> = Vector2::new(4.0, 0.0);
pub const CONSTANT_FORCE_MASS: f64 = 2.0;

/// Initial world velocity of the projectile scenario.
pub const LAUNCH_VELOCITY: Vector2<f64> = Vector2::new(6.0, 8.0);

/// Initial world spin of the spin scenario (rad/s).
pub const LAUNCH_SPIN: f64 = FRAC_PI_2;

/// Bodies generated by the scatter scenario.
pub const SCATTER_BODIES: usize = 8;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// KT-001: Ball dropped from rest under gravity
    FreeFall,

    /// KT-002: Box pushed by a constant force, no gravity
    ConstantForce,

    /// KT-003: Ball launched at an angle under gravity
    Projectile,

    /// KT-004: Box on a spring to a fixed point
    Spring,

    /// KT-005: Spinning box carrying a spring anchor
    Spin,

    /// KT-006: Run, rewind to the middle, resume
    Rewind,

    /// KT-007: Seeded random bodies, scrubbed and deleted
    Scatter,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FreeFall,
            ScenarioId::ConstantForce,
            ScenarioId::Projectile,
            ScenarioId::Spring,
            ScenarioId::Spin,
            ScenarioId::Rewind,
            ScenarioId::Scatter,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FreeFall => "free_fall",
            ScenarioId::ConstantForce => "constant_force",
            ScenarioId::Projectile => "projectile",
            ScenarioId::Spring => "spring",
            ScenarioId::Spin => "spin",
            ScenarioId::Rewind => "rewind",
            ScenarioId::Scatter => "scatter",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FreeFall => "Drop from rest: |Vy| = g*t, |A| = g, scrubbing reproduces state",
            ScenarioId::ConstantForce => "Constant force: finite-difference acceleration = F/m, V = a*t",
            ScenarioId::Projectile => "Launch at an angle: Vx constant, Vy = vy0 - g*t",
            ScenarioId::Spring => "Spring to a fixed point: oscillation about the rest length",
            ScenarioId::Spin => "Constant spin: theta = omega*t, anchors follow restored angles",
            ScenarioId::Rewind => "Rewind mid-run and resume: history is truncated, never merged",
            ScenarioId::Scatter => "Seeded random bodies: scrub idempotence and delete purge",
        }
    }

    /// Builds the scene for this scenario.
    pub fn build(&self, config: &SimConfig) -> Result<Scene, SimError> {
        match self {
            ScenarioId::FreeFall | ScenarioId::Rewind => Scene::dropped_ball(config),
            ScenarioId::ConstantForce => Scene::pushed_box(),
            ScenarioId::Projectile => {
                let mut scene = Scene::dropped_ball(config)?;
                scene.launch_velocity = Some(LAUNCH_VELOCITY);
                Ok(scene)
            }
            ScenarioId::Spring => Scene::spring(),
            ScenarioId::Spin => Scene::spinner(),
            ScenarioId::Scatter => Scene::scatter(config),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free_fall" | "freefall" | "kt-001" => Ok(ScenarioId::FreeFall),
            "constant_force" | "constantforce" | "kt-002" => Ok(ScenarioId::ConstantForce),
            "projectile" | "kt-003" => Ok(ScenarioId::Projectile),
            "spring" | "kt-004" => Ok(ScenarioId::Spring),
            "spin" | "kt-005" => Ok(ScenarioId::Spin),
            "rewind" | "kt-006" => Ok(ScenarioId::Rewind),
            "scatter" | "kt-007" => Ok(ScenarioId::Scatter),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

/// A built scene, ready to be wrapped in a [`crate::SimWorld`].
#[derive(Debug, Clone)]
pub struct Scene {
    pub engine: SimEngine,

    /// The body the scenario's checks are about
    pub subject: BodyId,

    /// Fixed ground body
    pub ground: BodyId,

    /// World velocity applied through the session before running
    pub launch_velocity: Option<Vector2<f64>>,

    /// World angular velocity applied through the session before running
    pub launch_spin: Option<f64>,
}

impl Scene {
    fn new(engine: SimEngine, subject: BodyId, ground: BodyId) -> Self {
        Self {
            engine,
            subject,
            ground,
            launch_velocity: None,
            launch_spin: None,
        }
    }

    fn with_ground(engine: &mut SimEngine) -> BodyId {
        engine.add_static(rectangle(200.0, 2.0), Vector2::new(0.0, 1000.0))
    }

    fn dropped_ball(config: &SimConfig) -> Result<Self, SimError> {
        let mut engine = SimEngine::new(config.engine_gravity());
        let ground = Self::with_ground(&mut engine);
        let ball = engine.add_body(regular_polygon(16, 0.5), Vector2::zeros(), 1.0)?;
        Ok(Self::new(engine, ball, ground))
    }

    fn pushed_box() -> Result<Self, SimError> {
        let mut engine = SimEngine::default();
        let ground = Self::with_ground(&mut engine);
        let crate_box = engine.add_body(rectangle(1.0, 1.0), Vector2::zeros(), CONSTANT_FORCE_MASS)?;
        engine.add_force(AppliedForce::constant(crate_box, CONSTANT_FORCE))?;
        Ok(Self::new(engine, crate_box, ground))
    }

    fn spring() -> Result<Self, SimError> {
        let mut engine = SimEngine::default();
        let ground = Self::with_ground(&mut engine);
        let weight = engine.add_body(rectangle(1.0, 1.0), Vector2::new(5.0, 0.0), 1.0)?;
        if let Some(body) = engine.body(weight) {
            let spring = SpringLink::to_point(body, Vector2::zeros(), Vector2::zeros(), 4.0)
                .with_rest_length(3.0);
            engine.add_spring(spring)?;
        }
        Ok(Self::new(engine, weight, ground))
    }

    fn spinner() -> Result<Self, SimError> {
        let mut engine = SimEngine::default();
        let ground = Self::with_ground(&mut engine);
        let wheel = engine.add_body(rectangle(2.0, 2.0), Vector2::zeros(), 1.0)?;
        if let Some(body) = engine.body(wheel) {
            // Zero stiffness: a tether that marks the anchor without pulling
            let tether = SpringLink::to_point(body, Vector2::new(1.0, 0.0), Vector2::new(0.0, -20.0), 0.0);
            engine.add_spring(tether)?;
        }
        let mut scene = Self::new(engine, wheel, ground);
        scene.launch_spin = Some(LAUNCH_SPIN);
        Ok(scene)
    }

    fn scatter(config: &SimConfig) -> Result<Self, SimError> {
        // Scene seed derived separately from the master seed
        let scene_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut rng = ChaCha8Rng::seed_from_u64(scene_seed);

        let mut engine = SimEngine::new(config.engine_gravity());
        let ground = Self::with_ground(&mut engine);
        let mut first = None;

        for _ in 0..SCATTER_BODIES {
            let outline = rectangle(rng.gen_range(0.5..3.0), rng.gen_range(0.5..3.0));
            let position = Vector2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..0.0));
            let id = engine.add_body(outline, position, rng.gen_range(0.5..5.0))?;

            // Per-second velocity to per-step engine units
            let velocity = Vector2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
            if let Some(sample) = engine.sample(id) {
                let mut state = sample.kinematic_state();
                state.velocity = velocity * config.step_seconds;
                state.angular_velocity = rng.gen_range(-1.0..1.0) * config.step_seconds;
                engine.write_state(id, &state)?;
            }
            first.get_or_insert(id);
        }

        Ok(Self::new(engine, first.unwrap_or(ground), ground))
    }
}
