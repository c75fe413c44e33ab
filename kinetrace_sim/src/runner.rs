//! Scenario runner - drives each scenario through record, scrub and resume
//! and checks the replayed kinematics against closed-form motion.

use crate::engine::SimEngine;
use crate::error::SimError;
use crate::scenarios::{Scene, ScenarioId, CONSTANT_FORCE, CONSTANT_FORCE_MASS, LAUNCH_SPIN};
use crate::world::{SimConfig, SimWorld};

use kinetrace_core::{
    DisplayConfig, EditCommand, GraphSync, PointBatch, PointObserver, Quantity, ReplayError,
    Session,
};
use kinetrace_env::{BodyId, KinematicState, PhysicsEngine};
use nalgebra::{Rotation2, Vector2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::Cell;
use std::f64::consts::PI;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Tolerance for quantities the integrator reproduces exactly up to
/// floating-point error.
const EXACT_TOLERANCE: f64 = 1e-6;

/// Tolerance for the spring's amplitude and period.
const SPRING_TOLERANCE: f64 = 0.15;

/// Spring scenario constants (see [`Scene`]): rest length 3, stretched to 5.
const SPRING_STIFFNESS: f64 = 4.0;
const SPRING_AMPLITUDE: f64 = 2.0;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Simulated time at the end of the run in seconds
    pub final_time_secs: f64,

    /// Number of tracked objects at end
    pub final_object_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

impl ScenarioResult {
    /// A failed result for a scenario that could not finish.
    pub fn aborted(scenario: ScenarioId, seed: u64, error: &SimError) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            final_object_count: 0,
            failure_reason: Some(error.to_string()),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Frames in the recorder at the end of the run
    pub frames_recorded: usize,

    /// Seeks performed
    pub seeks: u64,

    /// Chart point batches pushed to subscribers
    pub batches_pushed: u64,

    /// Largest deviation from the expected value among exact checks
    pub max_error: f64,
}

/// Counts pushed chart batches.
struct BatchCounter(Rc<Cell<u64>>);

impl PointObserver for BatchCounter {
    fn on_batch(&mut self, _batch: &PointBatch) {
        self.0.set(self.0.get() + 1);
    }
}

/// Collects comparison results; the first failure wins.
struct Checks {
    max_error: f64,
    failure: Option<String>,
}

impl Checks {
    fn new() -> Self {
        Self {
            max_error: 0.0,
            failure: None,
        }
    }

    fn close(&mut self, what: &str, actual: f64, expected: f64) {
        let error = (actual - expected).abs();
        if error.is_finite() {
            self.max_error = self.max_error.max(error);
        }
        self.within(what, actual, expected, EXACT_TOLERANCE);
    }

    fn within(&mut self, what: &str, actual: f64, expected: f64, tolerance: f64) {
        if !((actual - expected).abs() <= tolerance) {
            self.fail(format!("{}: got {:.6}, expected {:.6}", what, actual, expected));
        }
    }

    fn close_vector(&mut self, what: &str, actual: Vector2<f64>, expected: Vector2<f64>) {
        self.close(&format!("{} x", what), actual.x, expected.x);
        self.close(&format!("{} y", what), actual.y, expected.y);
    }

    fn ensure(&mut self, what: &str, ok: bool) {
        if !ok {
            self.fail(what.to_string());
        }
    }

    fn fail(&mut self, reason: String) {
        if self.failure.is_none() {
            warn!("Check failed: {}", reason);
            self.failure = Some(reason);
        }
    }
}

/// Runs kinematics scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Engine timestep in seconds
    step_seconds: f64,

    /// Simulated duration in seconds
    duration_secs: f64,

    display: DisplayConfig,
    mirror_x: bool,
    mirror_y: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        let defaults = SimConfig::default();
        Self {
            seed,
            step_seconds: defaults.step_seconds,
            duration_secs: defaults.duration_secs,
            display: defaults.display,
            mirror_x: false,
            mirror_y: false,
        }
    }

    /// Sets the engine timestep.
    pub fn with_timestep(mut self, seconds: f64) -> Self {
        self.step_seconds = seconds;
        self
    }

    /// Sets the simulated duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.display = display;
        self
    }

    pub fn with_mirror(mut self, mirror_x: bool, mirror_y: bool) -> Self {
        self.mirror_x = mirror_x;
        self.mirror_y = mirror_y;
        self
    }

    fn config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            step_seconds: self.step_seconds,
            duration_secs: self.duration_secs,
            display: self.display,
            mirror_x: self.mirror_x,
            mirror_y: self.mirror_y,
            ..Default::default()
        }
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        match self.run_world(scenario) {
            Ok((result, _)) => result,
            Err(e) => {
                warn!("Scenario {} aborted: {}", scenario, e);
                ScenarioResult::aborted(scenario, self.seed, &e)
            }
        }
    }

    /// Runs a scenario and hands back the world it ran in.
    pub fn run_world(&self, scenario: ScenarioId) -> Result<(ScenarioResult, SimWorld), SimError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let config = self.config();
        if !(config.step_seconds.is_finite() && config.step_seconds > 0.0) {
            return Err(ReplayError::InvalidTimestep(config.step_seconds).into());
        }
        let scene = scenario.build(&config)?;
        let (mut world, pushed) = self.prepare(config, &scene)?;

        let mut metrics = ScenarioMetrics::default();
        let mut checks = Checks::new();
        let total_ticks = match scenario {
            ScenarioId::FreeFall => self.run_free_fall(&mut world, &scene, &mut checks, &mut metrics)?,
            ScenarioId::ConstantForce => {
                self.run_constant_force(&mut world, &scene, &mut checks, &mut metrics)?
            }
            ScenarioId::Projectile => self.run_projectile(&mut world, &scene, &mut checks, &mut metrics)?,
            ScenarioId::Spring => self.run_spring(&mut world, &scene, &mut checks, &mut metrics)?,
            ScenarioId::Spin => self.run_spin(&mut world, &scene, &mut checks, &mut metrics)?,
            ScenarioId::Rewind => self.run_rewind(&mut world, &scene, &mut checks, &mut metrics)?,
            ScenarioId::Scatter => self.run_scatter(&mut world, &scene, &mut checks, &mut metrics)?,
        };

        let session = world.session();
        metrics.frames_recorded = session.recorder().frame_count();
        metrics.batches_pushed = pushed.get();
        metrics.max_error = checks.max_error;

        let passed = checks.failure.is_none();
        if passed {
            info!("Scenario {} passed ({} ticks)", scenario, total_ticks);
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks,
            final_time_secs: session.time(),
            final_object_count: session.recorder().object_count(),
            failure_reason: checks.failure,
            metrics,
        };
        Ok((result, world))
    }

    /// Wraps the scene, applies launch conditions and opens a chart on the
    /// subject.
    fn prepare(&self, config: SimConfig, scene: &Scene) -> Result<(SimWorld, Rc<Cell<u64>>), SimError> {
        let mut world = SimWorld::new(config, scene.engine.clone())?;
        let session = world.session_mut();

        if let Some(velocity) = scene.launch_velocity {
            session.apply(EditCommand::SetVelocity {
                id: scene.subject,
                velocity,
            })?;
        }
        if let Some(rate) = scene.launch_spin {
            session.apply(EditCommand::SetAngularVelocity {
                id: scene.subject,
                rate,
            })?;
        }

        let pushed = Rc::new(Cell::new(0));
        session.subscribe(Box::new(BatchCounter(pushed.clone())));
        let mut quantities = GraphSync::default_quantities();
        quantities.extend([Quantity::Vx, Quantity::Vy, Quantity::Ay]);
        session.add_chart(scene.subject, quantities)?;

        Ok((world, pushed))
    }

    /// Gravity as seen in the configured world frame.
    fn world_gravity(world: &SimWorld) -> Vector2<f64> {
        world
            .session()
            .transform()
            .vector_to_world(world.config.engine_gravity())
    }

    /// Seeks to `frame` and counts it.
    fn seek(world: &mut SimWorld, frame: usize, metrics: &mut ScenarioMetrics) -> Result<usize, SimError> {
        metrics.seeks += 1;
        world.scrub(frame)
    }

    fn live_state(session: &Session<SimEngine>, id: BodyId) -> Option<KinematicState> {
        session.engine().sample(id).map(|s| s.kinematic_state())
    }

    /// Scrubs a -> b -> a and requires the two visits to `a` to agree with
    /// each other and with the recording.
    fn check_scrub_round_trip(
        world: &mut SimWorld,
        id: BodyId,
        a: usize,
        b: usize,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), SimError> {
        Self::seek(world, a, metrics)?;
        let first = Self::live_state(world.session(), id);
        Self::seek(world, b, metrics)?;
        Self::seek(world, a, metrics)?;
        let second = Self::live_state(world.session(), id);
        let recorded = world.session().snapshot_at(id, a)?.kinematic_state();

        checks.ensure(
            &format!("scrub {}->{}->{} changed the state of {}", a, b, a, id),
            first.is_some() && first == second && second == Some(recorded),
        );
        Ok(())
    }

    /// KT-001: FreeFall - a body dropped from rest.
    ///
    /// **Assertion**: V = g*t and A = g at every frame after the first;
    /// scrubbing 5 -> 10 -> 5 reproduces the same state.
    fn run_free_fall(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-001: FreeFall - drop from rest");
        let frames = world.run_for_duration()?;
        world.stop()?;

        let gravity = Self::world_gravity(world);
        for frame in 0..frames {
            let k = world.session().kinematics(scene.subject, frame)?;
            checks.close_vector(&format!("velocity at frame {}", frame), k.velocity, gravity * k.time);
            if frame > 0 {
                checks.close_vector(&format!("acceleration at frame {}", frame), k.acceleration, gravity);
            } else {
                checks.ensure("acceleration at frame 0 is zero", k.acceleration == Vector2::zeros());
            }
        }

        Self::check_scrub_round_trip(world, scene.subject, 5, 10, checks, metrics)?;
        Ok(frames as u64)
    }

    /// KT-002: ConstantForce - a constant push with no gravity.
    ///
    /// **Assertion**: finite-difference acceleration = F/m and V = a*t.
    fn run_constant_force(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-002: ConstantForce - F = ma");
        let frames = world.run_for_duration()?;
        world.stop()?;

        let expected = world
            .session()
            .transform()
            .vector_to_world(CONSTANT_FORCE / CONSTANT_FORCE_MASS);
        for frame in 1..frames {
            let k = world.session().kinematics(scene.subject, frame)?;
            checks.close_vector(&format!("acceleration at frame {}", frame), k.acceleration, expected);
            checks.close_vector(&format!("velocity at frame {}", frame), k.velocity, expected * k.time);
            checks.close_vector(
                &format!("momentum at frame {}", frame),
                k.momentum,
                expected * k.time * CONSTANT_FORCE_MASS,
            );
        }

        let middle = frames / 2;
        Self::check_scrub_round_trip(world, scene.subject, middle, frames - 1, checks, metrics)?;
        Ok(frames as u64)
    }

    /// KT-003: Projectile - launched at an angle under gravity.
    ///
    /// **Assertion**: the horizontal velocity never changes and
    /// V = V0 + g*t throughout.
    fn run_projectile(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-003: Projectile - launch at an angle");
        let launch = scene.launch_velocity.unwrap_or_else(Vector2::zeros);
        let frames = world.run_for_duration()?;
        world.stop()?;

        let gravity = Self::world_gravity(world);
        for frame in 0..frames {
            let k = world.session().kinematics(scene.subject, frame)?;
            checks.close_vector(
                &format!("velocity at frame {}", frame),
                k.velocity,
                launch + gravity * k.time,
            );
        }

        // Mid-flight scrub, then a step in each direction
        let middle = frames / 2;
        Self::seek(world, middle, metrics)?;
        let session = world.session_mut();
        let forward = session.step_forward()?;
        let back = session.step_backward()?;
        metrics.seeks += 2;
        checks.ensure("single steps move the cursor by one", forward == middle + 1 && back == middle);
        Ok(frames as u64)
    }

    /// KT-004: Spring - a weight on a spring to a fixed point.
    ///
    /// Runs at least one full period. **Assertion**: the displacement swings
    /// through twice the amplitude and returns; the anchor tracks the body
    /// after a seek.
    fn run_spring(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-004: Spring - oscillation");
        let period = 2.0 * PI * (1.0 / SPRING_STIFFNESS).sqrt();
        let period_ticks = (period / self.step_seconds).round() as usize;
        let ticks = world.config.target_ticks().max(period_ticks + 1);
        let frames = world.run_ticks(ticks)?;
        world.stop()?;

        let session = world.session();
        let mut extreme: f64 = 0.0;
        for frame in 0..frames {
            let k = session.kinematics(scene.subject, frame)?;
            extreme = extreme.max(k.displacement.norm());
        }
        checks.within("peak displacement", extreme, 2.0 * SPRING_AMPLITUDE, SPRING_TOLERANCE);

        let after_period = session.kinematics(scene.subject, period_ticks.min(frames - 1))?;
        checks.within(
            "displacement after one period",
            after_period.displacement.norm(),
            0.0,
            SPRING_TOLERANCE,
        );

        let quarter = (period_ticks / 4).min(frames - 1);
        Self::seek(world, quarter, metrics)?;
        let recorded = world.session().snapshot_at(scene.subject, quarter)?.position;
        match world.engine().spring_ends(0) {
            Some((end_a, _)) => checks.close_vector("spring anchor after seek", end_a, recorded),
            None => checks.fail("spring link missing".to_string()),
        }
        Ok(frames as u64)
    }

    /// KT-005: Spin - constant rotation with an anchor at the rim.
    ///
    /// **Assertion**: theta = omega*t, omega constant, and the rim anchor is
    /// re-projected onto the restored angle after every seek.
    fn run_spin(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-005: Spin - angular replay");
        let frames = world.run_for_duration()?;
        world.stop()?;

        for frame in 0..frames {
            let k = world.session().kinematics(scene.subject, frame)?;
            checks.close(&format!("omega at frame {}", frame), k.angular_rate, LAUNCH_SPIN);
            checks.close(&format!("theta at frame {}", frame), k.angle, LAUNCH_SPIN * k.time);
        }

        let rim = Vector2::new(1.0, 0.0);
        for frame in [frames / 3, frames - 1, 1] {
            Self::seek(world, frame, metrics)?;
            let angle = world.session().snapshot_at(scene.subject, frame)?.angle;
            match world.engine().springs().first() {
                Some(tether) => {
                    checks.close_vector(
                        &format!("rim anchor at frame {}", frame),
                        tether.point_a,
                        Rotation2::new(angle) * rim,
                    );
                }
                None => checks.fail("tether missing".to_string()),
            }
        }
        Ok(frames as u64)
    }

    /// KT-006: Rewind - pause mid-run, resume from an earlier frame.
    ///
    /// **Assertion**: history is truncated at the resume frame, stays
    /// contiguous, and matches an uninterrupted run exactly.
    fn run_rewind(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-006: Rewind - truncate and resume");
        let first_leg = world.config.target_ticks();
        world.run_ticks(first_leg)?;
        let resume_at = first_leg / 2;
        world.rewind_and_resume(resume_at)?;
        metrics.seeks += 1;

        let second_leg = first_leg - resume_at;
        let frames = world.run_ticks(second_leg)?;
        world.stop()?;
        checks.ensure(
            &format!("{} frames after rewind, expected {}", frames, first_leg),
            frames == first_leg,
        );

        let session = world.session();
        match session.recorder().series(scene.subject) {
            Some(series) => checks.ensure(
                "recorded frames are contiguous",
                series.iter().enumerate().all(|(i, s)| s.frame == i),
            ),
            None => checks.fail(format!("{} not recorded", scene.subject)),
        }
        match session.graphs().charts().first() {
            Some(chart) => checks.ensure(
                &format!("chart has {} points, expected {}", chart.len(), frames),
                chart.len() == frames,
            ),
            None => checks.fail("chart closed".to_string()),
        }

        // Straight run of the same length for comparison
        let mut straight = SimWorld::new(world.config.clone(), scene.engine.clone())?;
        straight.run_ticks(first_leg)?;
        for frame in 0..frames {
            let resumed = session.snapshot_at(scene.subject, frame)?;
            let reference = straight.session().snapshot_at(scene.subject, frame)?;
            if resumed.kinematic_state() != reference.kinematic_state() || resumed.time != reference.time {
                checks.fail(format!("frame {} differs from an uninterrupted run", frame));
                break;
            }
        }
        Ok((first_leg + second_leg) as u64)
    }

    /// KT-007: Scatter - seeded random bodies.
    ///
    /// **Assertion**: seeking any recorded frame twice restores every body
    /// exactly; deleting a body purges it from every store.
    fn run_scatter(
        &self,
        world: &mut SimWorld,
        scene: &Scene,
        checks: &mut Checks,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, SimError> {
        info!("KT-007: Scatter - random bodies");
        let frames = world.run_for_duration()?;
        world.stop()?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(0x9e3779b97f4a7c15) ^ 1);
        let ids = world.session().engine().body_ids();
        for _ in 0..5 {
            let target = rng.gen_range(0..frames);
            let detour = rng.gen_range(0..frames);
            for &id in &ids {
                Self::check_scrub_round_trip(world, id, target, detour, checks, metrics)?;
            }
        }

        let session = world.session_mut();
        session.reset()?;
        session.apply(EditCommand::Delete { id: scene.subject })?;
        checks.ensure(
            "deleted body still referenced",
            !session.engine().contains(scene.subject)
                && session.registry().get(scene.subject).is_none()
                && !session.recorder().is_registered(scene.subject)
                && session.graphs().charts().is_empty(),
        );
        debug!("Deleted {}; {} bodies left", scene.subject, session.engine().body_count());

        let rerun = world.run_ticks(3)?;
        world.stop()?;
        checks.ensure(
            "remaining bodies keep recording",
            world.session().recorder().object_count() == ids.len() - 1,
        );
        Ok((frames + rerun) as u64)
    }
}
