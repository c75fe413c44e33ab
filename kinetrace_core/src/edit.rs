//! Edit dispatch
//!
//! Every user edit is one [`EditCommand`] consumed by [`Session::apply`].
//! Body values arrive in world units and are converted through the
//! transform layer before they reach the engine and the initial-state
//! registry.

use crate::config::{AngleUnit, MAX_DECIMALS};
use crate::derived::Quantity;
use crate::error::ReplayError;
use crate::graph::ChartId;
use crate::session::{Mode, Session};
use crate::transform::TransformConfig;
use kinetrace_env::{BodyId, KinematicState, PhysicsEngine};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// A single scene, frame or chart edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    /// Place a body at a world position
    Move { id: BodyId, position: Vector2<f64> },

    /// Set a body's world angle (radians)
    Rotate { id: BodyId, angle: f64 },

    /// Set a body's world velocity (units per second)
    SetVelocity { id: BodyId, velocity: Vector2<f64> },

    /// Set a body's world angular velocity (radians per second)
    SetAngularVelocity { id: BodyId, rate: f64 },

    Delete { id: BodyId },

    /// Engine timestep in seconds
    SetTimestep { seconds: f64 },

    SetMirror { mirror_x: bool, mirror_y: bool },

    /// Body defining the world origin, or `None` for the engine origin
    SetOrigin { id: Option<BodyId> },

    SetDecimals { decimals: u32 },

    SetAngleUnit { unit: AngleUnit },

    AddChart {
        id: BodyId,
        #[serde(default = "crate::graph::GraphSync::default_quantities")]
        quantities: BTreeSet<Quantity>,
    },

    RemoveChart { chart: ChartId },

    ToggleQuantity {
        chart: ChartId,
        quantity: Quantity,
        enabled: bool,
    },
}

/// What an applied edit produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    ChartAdded(ChartId),
}

const BODY_EDIT: &[Mode] = &[Mode::Editing];
const FRAME_EDIT: &[Mode] = &[Mode::Editing, Mode::Paused];

impl<E: PhysicsEngine> Session<E> {
    /// Applies one edit, or returns an error and changes nothing.
    pub fn apply(&mut self, command: EditCommand) -> Result<EditOutcome, ReplayError> {
        match command {
            EditCommand::Move { id, position } => {
                self.edit_body("move a body", id, |t, s| {
                    s.position = t.position_to_engine(position);
                })?;
            }
            EditCommand::Rotate { id, angle } => {
                self.edit_body("rotate a body", id, |t, s| {
                    s.angle = t.angle_to_engine(angle);
                })?;
            }
            EditCommand::SetVelocity { id, velocity } => {
                self.edit_body("set a velocity", id, |t, s| {
                    s.velocity = t.velocity_to_engine(velocity);
                })?;
            }
            EditCommand::SetAngularVelocity { id, rate } => {
                self.edit_body("set an angular velocity", id, |t, s| {
                    s.angular_velocity = t.angular_rate_to_engine(rate);
                })?;
            }
            EditCommand::Delete { id } => self.delete_body(id)?,
            EditCommand::SetTimestep { seconds } => self.set_timestep(seconds)?,
            EditCommand::SetMirror { mirror_x, mirror_y } => {
                self.require("change the axes", FRAME_EDIT)?;
                self.transform.mirror_x = mirror_x;
                self.transform.mirror_y = mirror_y;
                self.rebuild_charts();
            }
            EditCommand::SetOrigin { id } => self.set_origin_body(id)?,
            EditCommand::SetDecimals { decimals } => {
                self.require("change the precision", FRAME_EDIT)?;
                if decimals > MAX_DECIMALS {
                    return Err(ReplayError::InvalidDecimals(decimals));
                }
                self.display.decimals = decimals;
                self.rebuild_charts();
            }
            EditCommand::SetAngleUnit { unit } => {
                self.require("change the angle unit", FRAME_EDIT)?;
                self.display.angle_unit = unit;
                self.rebuild_charts();
            }
            EditCommand::AddChart { id, quantities } => {
                let chart = self.add_chart(id, quantities)?;
                return Ok(EditOutcome::ChartAdded(chart));
            }
            EditCommand::RemoveChart { chart } => self.remove_chart(chart)?,
            EditCommand::ToggleQuantity {
                chart,
                quantity,
                enabled,
            } => self.set_quantity(chart, quantity, enabled)?,
        }
        Ok(EditOutcome::Applied)
    }

    /// Writes an edited state to the live body and its initial state.
    fn edit_body<F>(&mut self, op: &'static str, id: BodyId, edit: F) -> Result<(), ReplayError>
    where
        F: FnOnce(&TransformConfig, &mut KinematicState),
    {
        self.require(op, BODY_EDIT)?;
        let sample = self
            .engine
            .sample(id)
            .ok_or(ReplayError::MissingObject(id))?;

        let mut state = sample.kinematic_state();
        edit(&self.transform, &mut state);
        self.engine.write_state(id, &state)?;
        self.engine.refresh_anchors();
        self.registry.update(id, |initial| initial.set_kinematic_state(&state));

        if self.origin_body == Some(id) {
            self.sync_origin();
            self.rebuild_charts();
        }
        Ok(())
    }

    fn delete_body(&mut self, id: BodyId) -> Result<(), ReplayError> {
        self.require("delete a body", BODY_EDIT)?;
        if self.origin_body == Some(id) {
            return Err(ReplayError::OriginBody(id));
        }
        if !self.engine.contains(id) {
            return Err(ReplayError::MissingObject(id));
        }

        self.engine.remove_body(id)?;
        self.purge(id);
        info!("Deleted {}", id);
        Ok(())
    }
}
