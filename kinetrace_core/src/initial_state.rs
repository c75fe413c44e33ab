//! Initial-State Registry
//!
//! One canonical snapshot per tracked object, captured when the object is
//! created or loaded. Reset restores these values, and displacement is
//! measured against them. Playback never touches the registry; only direct
//! edits do, so a reset reproduces the edited configuration.

use kinetrace_env::{BodyId, BodySample, KinematicState, Outline};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The canonical starting state of one object (engine space).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub id: BodyId,

    /// Always 0: the state the object starts a run from
    pub frame: usize,

    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub angle: f64,
    pub angular_velocity: f64,

    /// Deep copy of the outline at capture time
    pub outline: Outline,
}

impl InitialState {
    /// Captures a live body sample.
    pub fn capture(sample: &BodySample) -> Self {
        Self {
            id: sample.id,
            frame: 0,
            position: sample.position,
            velocity: sample.velocity,
            angle: sample.angle,
            angular_velocity: sample.angular_velocity,
            outline: sample.outline.clone(),
        }
    }

    /// The state written back to the engine on reset.
    pub fn kinematic_state(&self) -> KinematicState {
        KinematicState {
            position: self.position,
            velocity: self.velocity,
            angle: self.angle,
            angular_velocity: self.angular_velocity,
        }
    }

    /// Replaces the kinematic fields, keeping id and outline.
    pub fn set_kinematic_state(&mut self, state: &KinematicState) {
        self.position = state.position;
        self.velocity = state.velocity;
        self.angle = state.angle;
        self.angular_velocity = state.angular_velocity;
    }
}

/// Id-keyed table of initial states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialStateRegistry {
    states: BTreeMap<BodyId, InitialState>,
}

impl InitialStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures (or re-captures) the initial state of a body.
    pub fn capture(&mut self, sample: &BodySample) {
        self.states.insert(sample.id, InitialState::capture(sample));
    }

    /// Inserts a fully formed state, e.g. from a scene document.
    pub fn insert(&mut self, state: InitialState) {
        self.states.insert(state.id, state);
    }

    pub fn get(&self, id: BodyId) -> Option<&InitialState> {
        self.states.get(&id)
    }

    /// Applies a direct edit. Returns false if the id is unknown.
    pub fn update<F>(&mut self, id: BodyId, edit: F) -> bool
    where
        F: FnOnce(&mut InitialState),
    {
        match self.states.get_mut(&id) {
            Some(state) => {
                edit(state);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: BodyId) -> Option<InitialState> {
        self.states.remove(&id)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.states.contains_key(&id)
    }

    /// Rescales stored velocities and angular velocities after a timestep edit.
    pub fn rescale_rates(&mut self, factor: f64) {
        for state in self.states.values_mut() {
            state.velocity *= factor;
            state.angular_velocity *= factor;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &InitialState> {
        self.states.values()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
