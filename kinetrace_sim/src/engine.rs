//! Reference physics engine for driving the replay core.
//!
//! A small rigid-body integrator:
//! - Polygon bodies with mass, rotational inertia and a static flag
//! - Uniform gravity
//! - Applied forces with a start and optional end time, acting at an offset
//!   from the body center (so they also produce torque)
//! - Damped spring links whose body anchors rotate with the body
//!
//! No contacts, no collisions. Like the engines the core is written for,
//! it works in per-step units: a velocity `v` moves a body `v` engine units
//! per step, and Y points down.

use kinetrace_env::{BodyId, BodySample, EnvError, KinematicState, Outline, PhysicsEngine};
use nalgebra::{Rotation2, Vector2};
use std::collections::BTreeMap;
use tracing::debug;

/// Axis-aligned rectangle centered on the origin.
pub fn rectangle(width: f64, height: f64) -> Outline {
    let (w, h) = (width / 2.0, height / 2.0);
    vec![
        Vector2::new(-w, -h),
        Vector2::new(w, -h),
        Vector2::new(w, h),
        Vector2::new(-w, h),
    ]
}

/// Regular polygon centered on the origin (circles use 16 sides).
pub fn regular_polygon(sides: usize, radius: f64) -> Outline {
    let sides = sides.max(3);
    (0..sides)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / sides as f64;
            Vector2::new(radius * a.cos(), radius * a.sin())
        })
        .collect()
}

fn cross(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Area centroid of a simple polygon (vertex mean when degenerate).
fn centroid(outline: &[Vector2<f64>]) -> Vector2<f64> {
    let mut area = 0.0;
    let mut sum = Vector2::zeros();
    for (i, &a) in outline.iter().enumerate() {
        let b = outline[(i + 1) % outline.len()];
        let c = cross(a, b);
        area += c;
        sum += (a + b) * c;
    }
    if area.abs() < 1e-12 {
        let n = outline.len().max(1) as f64;
        return outline.iter().fold(Vector2::zeros(), |acc, v| acc + v) / n;
    }
    sum / (3.0 * area)
}

/// Moment of inertia of a uniform polygon about its centroid.
fn polygon_inertia(outline: &[Vector2<f64>], mass: f64) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &a) in outline.iter().enumerate() {
        let b = outline[(i + 1) % outline.len()];
        let c = cross(a, b).abs();
        numerator += c * (a.dot(&a) + a.dot(&b) + b.dot(&b));
        denominator += c;
    }
    if denominator < 1e-12 {
        return mass;
    }
    mass * numerator / (6.0 * denominator)
}

/// A rigid body.
#[derive(Debug, Clone)]
pub struct SimBody {
    pub id: BodyId,

    /// Outline relative to the centroid at angle 0
    pub local_outline: Outline,

    pub state: KinematicState,
    pub mass: f64,
    pub inertia: f64,

    /// Static bodies ignore gravity, forces and springs
    pub is_static: bool,
}

impl SimBody {
    /// Current outline in engine space.
    pub fn outline(&self) -> Outline {
        let rotation = Rotation2::new(self.state.angle);
        self.local_outline
            .iter()
            .map(|v| rotation * v + self.state.position)
            .collect()
    }

    fn sample(&self) -> BodySample {
        BodySample {
            id: self.id,
            position: self.state.position,
            velocity: self.state.velocity,
            angle: self.state.angle,
            angular_velocity: self.state.angular_velocity,
            outline: self.outline(),
            mass: self.mass,
            is_static: self.is_static,
        }
    }
}

/// A force applied to one body over a time window.
#[derive(Debug, Clone)]
pub struct AppliedForce {
    pub body: BodyId,

    /// Application point relative to the body center (engine axes)
    pub offset: Vector2<f64>,

    /// Force in mass * engine units / s²
    pub force: Vector2<f64>,

    /// Elapsed time the force switches on
    pub start: f64,

    /// Elapsed time the force switches off (None = never)
    pub end: Option<f64>,
}

impl AppliedForce {
    /// A force acting at the center from t=0 on.
    pub fn constant(body: BodyId, force: Vector2<f64>) -> Self {
        Self {
            body,
            offset: Vector2::zeros(),
            force,
            start: 0.0,
            end: None,
        }
    }

    pub fn is_active(&self, time: f64) -> bool {
        time >= self.start && self.end.map_or(true, |end| time < end)
    }
}

/// A damped spring from an anchor on `body_a` to an anchor on `body_b`, or
/// to a fixed engine-space point when `body_b` is `None`.
#[derive(Debug, Clone)]
pub struct SpringLink {
    pub body_a: BodyId,

    /// Anchor offset from `body_a`'s center, valid at `angle_a`
    pub point_a: Vector2<f64>,

    /// Body angle `point_a` was last projected at
    pub angle_a: f64,

    pub body_b: Option<BodyId>,

    /// Offset from `body_b`'s center, or a fixed point
    pub point_b: Vector2<f64>,
    pub angle_b: f64,

    /// Force per unit of stretch
    pub stiffness: f64,

    /// Force per unit/s of stretch rate
    pub damping: f64,

    pub rest_length: f64,
}

impl SpringLink {
    /// Spring from a body anchor to a fixed point, at rest at its current
    /// length.
    pub fn to_point(body: &SimBody, point_a: Vector2<f64>, fixed: Vector2<f64>, stiffness: f64) -> Self {
        let rest_length = (body.state.position + point_a - fixed).norm();
        Self {
            body_a: body.id,
            point_a,
            angle_a: body.state.angle,
            body_b: None,
            point_b: fixed,
            angle_b: 0.0,
            stiffness,
            damping: 0.0,
            rest_length,
        }
    }

    pub fn with_rest_length(mut self, rest_length: f64) -> Self {
        self.rest_length = rest_length;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }
}

/// Rotates an anchor offset from its reference angle onto a body's current
/// angle.
fn reproject(point: &mut Vector2<f64>, reference: &mut f64, body: &SimBody) {
    if body.is_static {
        return;
    }
    *point = Rotation2::new(body.state.angle - *reference) * *point;
    *reference = body.state.angle;
}

/// The reference engine.
#[derive(Debug, Clone)]
pub struct SimEngine {
    bodies: BTreeMap<BodyId, SimBody>,
    forces: Vec<AppliedForce>,
    springs: Vec<SpringLink>,

    /// Engine-space gravity in units/s²
    gravity: Vector2<f64>,

    next_id: u64,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new(Vector2::zeros())
    }
}

impl SimEngine {
    /// Creates an empty engine with the given engine-space gravity.
    pub fn new(gravity: Vector2<f64>) -> Self {
        Self {
            bodies: BTreeMap::new(),
            forces: Vec::new(),
            springs: Vec::new(),
            gravity,
            next_id: 1,
        }
    }

    pub fn gravity(&self) -> Vector2<f64> {
        self.gravity
    }

    /// Adds a dynamic body at rest. The outline is recentered on its
    /// centroid.
    pub fn add_body(&mut self, outline: Outline, position: Vector2<f64>, mass: f64) -> Result<BodyId, EnvError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(EnvError::InvalidMass(mass));
        }
        Ok(self.insert(outline, position, mass, false))
    }

    /// Adds a fixed body. Static bodies report zero mass.
    pub fn add_static(&mut self, outline: Outline, position: Vector2<f64>) -> BodyId {
        self.insert(outline, position, 0.0, true)
    }

    fn insert(&mut self, outline: Outline, position: Vector2<f64>, mass: f64, is_static: bool) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;

        let center = centroid(&outline);
        let local_outline: Outline = outline.iter().map(|v| v - center).collect();
        let inertia = if is_static {
            0.0
        } else {
            polygon_inertia(&local_outline, mass)
        };

        self.bodies.insert(
            id,
            SimBody {
                id,
                local_outline,
                state: KinematicState::at_rest(position),
                mass,
                inertia,
                is_static,
            },
        );
        debug!("Added {} body {} at {:?}", if is_static { "static" } else { "dynamic" }, id, position);
        id
    }

    pub fn body(&self, id: BodyId) -> Option<&SimBody> {
        self.bodies.get(&id)
    }

    /// Registers an applied force.
    pub fn add_force(&mut self, force: AppliedForce) -> Result<usize, EnvError> {
        let body = self
            .bodies
            .get(&force.body)
            .ok_or(EnvError::UnknownBody(force.body))?;
        if body.is_static {
            return Err(EnvError::StaticBody(force.body));
        }
        if !(force.force.iter().all(|c| c.is_finite()) && force.start.is_finite()) {
            return Err(EnvError::NonFinite {
                id: force.body,
                field: "force",
            });
        }
        self.forces.push(force);
        Ok(self.forces.len() - 1)
    }

    pub fn forces(&self) -> &[AppliedForce] {
        &self.forces
    }

    /// Registers a spring link.
    pub fn add_spring(&mut self, spring: SpringLink) -> Result<usize, EnvError> {
        for id in std::iter::once(spring.body_a).chain(spring.body_b) {
            if !self.bodies.contains_key(&id) {
                return Err(EnvError::UnknownBody(id));
            }
        }
        self.springs.push(spring);
        Ok(self.springs.len() - 1)
    }

    pub fn springs(&self) -> &[SpringLink] {
        &self.springs
    }

    /// Engine-space end points of a spring.
    pub fn spring_ends(&self, index: usize) -> Option<(Vector2<f64>, Vector2<f64>)> {
        let spring = self.springs.get(index)?;
        let a = self.bodies.get(&spring.body_a)?;
        let end_a = a.state.position + spring.point_a;
        let end_b = match spring.body_b {
            Some(id) => self.bodies.get(&id)?.state.position + spring.point_b,
            None => spring.point_b,
        };
        Some((end_a, end_b))
    }

    fn reproject_anchors(&mut self) {
        let bodies = &self.bodies;
        for spring in &mut self.springs {
            if let Some(a) = bodies.get(&spring.body_a) {
                reproject(&mut spring.point_a, &mut spring.angle_a, a);
            }
            if let Some(b) = spring.body_b.and_then(|id| bodies.get(&id)) {
                reproject(&mut spring.point_b, &mut spring.angle_b, b);
            }
        }
    }

    /// Net force and torque on every dynamic body at `time`.
    fn accumulate(&self, time: f64, dt: f64) -> BTreeMap<BodyId, (Vector2<f64>, f64)> {
        let mut loads: BTreeMap<BodyId, (Vector2<f64>, f64)> = self
            .bodies
            .values()
            .filter(|b| !b.is_static)
            .map(|b| (b.id, (self.gravity * b.mass, 0.0)))
            .collect();

        let mut apply = |id: BodyId, offset: Vector2<f64>, force: Vector2<f64>| {
            if let Some((f, torque)) = loads.get_mut(&id) {
                *f += force;
                *torque += cross(offset, force);
            }
        };

        for force in self.forces.iter().filter(|f| f.is_active(time)) {
            apply(force.body, force.offset, force.force);
        }

        for spring in &self.springs {
            let Some(a) = self.bodies.get(&spring.body_a) else {
                continue;
            };
            let b = spring.body_b.and_then(|id| self.bodies.get(&id));
            let end_a = a.state.position + spring.point_a;
            let (end_b, velocity_b) = match b {
                Some(b) => (b.state.position + spring.point_b, b.state.velocity),
                None => (spring.point_b, Vector2::zeros()),
            };

            let delta = end_b - end_a;
            let length = delta.norm();
            if length < 1e-12 {
                continue;
            }
            let direction = delta / length;
            let stretch_rate = (velocity_b - a.state.velocity).dot(&direction) / dt;
            let magnitude = spring.stiffness * (length - spring.rest_length) + spring.damping * stretch_rate;
            let force = direction * magnitude;

            apply(spring.body_a, spring.point_a, force);
            if let Some(b) = b {
                apply(b.id, spring.point_b, -force);
            }
        }

        loads
    }
}

impl PhysicsEngine for SimEngine {
    fn body_ids(&self) -> Vec<BodyId> {
        self.bodies.keys().copied().collect()
    }

    fn sample(&self, id: BodyId) -> Option<BodySample> {
        self.bodies.get(&id).map(SimBody::sample)
    }

    fn write_state(&mut self, id: BodyId, state: &KinematicState) -> Result<(), EnvError> {
        let body = self.bodies.get_mut(&id).ok_or(EnvError::UnknownBody(id))?;
        if !state.is_finite() {
            return Err(EnvError::NonFinite {
                id,
                field: "kinematic state",
            });
        }
        body.state = *state;
        Ok(())
    }

    /// Semi-implicit Euler in per-step units: `v += a*dt²`, then `x += v`.
    fn step(&mut self, time: f64, dt: f64) {
        self.reproject_anchors();
        let loads = self.accumulate(time, dt);
        let dt2 = dt * dt;

        for (id, (force, torque)) in loads {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };
            let state = &mut body.state;
            state.velocity += force / body.mass * dt2;
            state.angular_velocity += torque / body.inertia * dt2;
            state.position += state.velocity;
            state.angle += state.angular_velocity;
        }
    }

    fn remove_body(&mut self, id: BodyId) -> Result<(), EnvError> {
        self.bodies.remove(&id).ok_or(EnvError::UnknownBody(id))?;
        self.forces.retain(|f| f.body != id);
        self.springs
            .retain(|s| s.body_a != id && s.body_b != Some(id));
        debug!("Removed body {}", id);
        Ok(())
    }

    fn refresh_anchors(&mut self) {
        self.reproject_anchors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rectangle_mass_properties() {
        let mut engine = SimEngine::default();
        let id = engine.add_body(rectangle(2.0, 4.0), Vector2::new(1.0, 1.0), 3.0).unwrap();

        let body = engine.body(id).unwrap();
        assert_relative_eq!(body.inertia, 3.0 * (4.0 + 16.0) / 12.0, epsilon = 1e-9);
        assert_eq!(body.outline()[0], Vector2::new(0.0, -1.0));
    }

    #[test]
    fn test_outline_recentered_and_rotated() {
        let mut engine = SimEngine::default();
        let square = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
        ];
        let id = engine.add_body(square, Vector2::zeros(), 1.0).unwrap();
        engine
            .write_state(
                id,
                &KinematicState {
                    angle: FRAC_PI_2,
                    ..KinematicState::at_rest(Vector2::zeros())
                },
            )
            .unwrap();

        let outline = engine.sample(id).unwrap().outline;
        assert_relative_eq!(outline[0].x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(outline[0].y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gravity_per_step_units() {
        let dt = 0.1;
        let mut engine = SimEngine::new(Vector2::new(0.0, 9.8));
        let ground = engine.add_static(rectangle(10.0, 1.0), Vector2::new(0.0, 50.0));
        let ball = engine.add_body(regular_polygon(16, 1.0), Vector2::zeros(), 1.0).unwrap();

        for i in 0..10 {
            engine.step(i as f64 * dt, dt);
        }

        let v = engine.sample(ball).unwrap().velocity;
        assert_relative_eq!(v.y / dt, 9.8, epsilon = 1e-9);
        assert_eq!(engine.sample(ground).unwrap().position, Vector2::new(0.0, 50.0));
    }

    #[test]
    fn test_force_window_and_torque() {
        let dt = 0.1;
        let mut engine = SimEngine::default();
        let id = engine.add_body(rectangle(2.0, 2.0), Vector2::zeros(), 2.0).unwrap();
        engine
            .add_force(AppliedForce {
                body: id,
                offset: Vector2::new(1.0, 0.0),
                force: Vector2::new(0.0, 4.0),
                start: 0.2,
                end: Some(0.4),
            })
            .unwrap();

        engine.step(0.0, dt);
        assert_eq!(engine.sample(id).unwrap().velocity, Vector2::zeros());

        engine.step(0.2, dt);
        let sample = engine.sample(id).unwrap();
        assert_relative_eq!(sample.velocity.y, 2.0 * dt * dt, epsilon = 1e-12);
        assert!(sample.angular_velocity > 0.0);

        engine.step(0.4, dt);
        assert_relative_eq!(engine.sample(id).unwrap().velocity.y, 2.0 * dt * dt, epsilon = 1e-12);
    }

    #[test]
    fn test_force_on_static_body_rejected() {
        let mut engine = SimEngine::default();
        let wall = engine.add_static(rectangle(1.0, 1.0), Vector2::zeros());
        assert!(matches!(
            engine.add_force(AppliedForce::constant(wall, Vector2::new(1.0, 0.0))),
            Err(EnvError::StaticBody(_))
        ));
        assert!(matches!(
            engine.add_force(AppliedForce::constant(BodyId(99), Vector2::zeros())),
            Err(EnvError::UnknownBody(_))
        ));
    }

    #[test]
    fn test_spring_pulls_toward_anchor() {
        let dt = 0.05;
        let mut engine = SimEngine::default();
        let id = engine.add_body(rectangle(1.0, 1.0), Vector2::new(5.0, 0.0), 1.0).unwrap();
        let spring = SpringLink::to_point(engine.body(id).unwrap(), Vector2::zeros(), Vector2::zeros(), 10.0)
            .with_rest_length(2.0);
        engine.add_spring(spring).unwrap();

        engine.step(0.0, dt);
        assert!(engine.sample(id).unwrap().velocity.x < 0.0);
    }

    #[test]
    fn test_anchors_follow_restored_angle() {
        let mut engine = SimEngine::default();
        let id = engine.add_body(rectangle(2.0, 2.0), Vector2::zeros(), 1.0).unwrap();
        let spring = SpringLink::to_point(
            engine.body(id).unwrap(),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, -5.0),
            1.0,
        );
        engine.add_spring(spring).unwrap();

        let mut state = engine.sample(id).unwrap().kinematic_state();
        state.angle = FRAC_PI_2;
        engine.write_state(id, &state).unwrap();
        engine.refresh_anchors();

        let (end_a, _) = engine.spring_ends(0).unwrap();
        assert_relative_eq!(end_a.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(end_a.y, 1.0, epsilon = 1e-12);

        // Idempotent for an unchanged angle
        engine.refresh_anchors();
        let (again, _) = engine.spring_ends(0).unwrap();
        assert_relative_eq!(again.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_remove_body_drops_links() {
        let mut engine = SimEngine::default();
        let id = engine.add_body(rectangle(1.0, 1.0), Vector2::zeros(), 1.0).unwrap();
        engine.add_force(AppliedForce::constant(id, Vector2::new(1.0, 0.0))).unwrap();
        let spring = SpringLink::to_point(engine.body(id).unwrap(), Vector2::zeros(), Vector2::new(1.0, 0.0), 1.0);
        engine.add_spring(spring).unwrap();

        engine.remove_body(id).unwrap();
        assert!(engine.forces().is_empty());
        assert!(engine.springs().is_empty());
        assert!(engine.remove_body(id).is_err());
    }

    #[test]
    fn test_non_positive_mass_rejected() {
        let mut engine = SimEngine::default();
        for mass in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                engine.add_body(rectangle(1.0, 1.0), Vector2::zeros(), mass),
                Err(EnvError::InvalidMass(_))
            ));
        }
        assert_eq!(engine.body_count(), 0);

        let id = engine.add_body(rectangle(1.0, 1.0), Vector2::zeros(), 0.5).unwrap();
        engine.add_force(AppliedForce::constant(id, Vector2::new(1.0, 0.0))).unwrap();
        engine.step(0.0, 0.1);
        assert!(engine.sample(id).unwrap().kinematic_state().is_finite());
    }

    #[test]
    fn test_non_finite_write_rejected() {
        let mut engine = SimEngine::default();
        let id = engine.add_body(rectangle(1.0, 1.0), Vector2::zeros(), 1.0).unwrap();
        let mut state = KinematicState::at_rest(Vector2::zeros());
        state.velocity.x = f64::NAN;
        assert!(matches!(
            engine.write_state(id, &state),
            Err(EnvError::NonFinite { .. })
        ));
    }
}
