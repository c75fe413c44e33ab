//! Minimal in-memory engine for unit tests.

use kinetrace_env::{BodyId, BodySample, EnvError, KinematicState, PhysicsEngine};
use nalgebra::Vector2;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ToyBody {
    pub state: KinematicState,
    pub mass: f64,
    pub is_static: bool,

    /// Constant engine-space acceleration in units per second²
    pub acceleration: Vector2<f64>,
}

/// Point bodies under constant acceleration, semi-implicit Euler in
/// per-step units.
#[derive(Debug, Clone, Default)]
pub struct ToyEngine {
    pub bodies: BTreeMap<BodyId, ToyBody>,
    pub next_id: u64,
    pub anchor_refreshes: usize,
    pub steps: usize,
}

impl ToyEngine {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn add(&mut self, position: Vector2<f64>, acceleration: Vector2<f64>) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(
            id,
            ToyBody {
                state: KinematicState::at_rest(position),
                mass: 1.0,
                is_static: false,
                acceleration,
            },
        );
        id
    }

    pub fn add_static(&mut self, position: Vector2<f64>) -> BodyId {
        let id = self.add(position, Vector2::zeros());
        if let Some(body) = self.bodies.get_mut(&id) {
            body.is_static = true;
        }
        id
    }

    pub fn state(&self, id: BodyId) -> KinematicState {
        self.bodies[&id].state
    }
}

impl PhysicsEngine for ToyEngine {
    fn body_ids(&self) -> Vec<BodyId> {
        self.bodies.keys().copied().collect()
    }

    fn sample(&self, id: BodyId) -> Option<BodySample> {
        self.bodies.get(&id).map(|b| BodySample {
            id,
            position: b.state.position,
            velocity: b.state.velocity,
            angle: b.state.angle,
            angular_velocity: b.state.angular_velocity,
            outline: vec![b.state.position],
            mass: b.mass,
            is_static: b.is_static,
        })
    }

    fn write_state(&mut self, id: BodyId, state: &KinematicState) -> Result<(), EnvError> {
        let body = self.bodies.get_mut(&id).ok_or(EnvError::UnknownBody(id))?;
        body.state = *state;
        Ok(())
    }

    fn step(&mut self, _time: f64, dt: f64) {
        self.steps += 1;
        for body in self.bodies.values_mut().filter(|b| !b.is_static) {
            body.state.velocity += body.acceleration * dt * dt;
            body.state.position += body.state.velocity;
            body.state.angle += body.state.angular_velocity;
        }
    }

    fn remove_body(&mut self, id: BodyId) -> Result<(), EnvError> {
        self.bodies
            .remove(&id)
            .map(|_| ())
            .ok_or(EnvError::UnknownBody(id))
    }

    fn refresh_anchors(&mut self) {
        self.anchor_refreshes += 1;
    }
}
