//! Scene documents
//!
//! The in-memory shape a save/load collaborator serializes: an id-indexed
//! body table plus the world frame, display settings and chart
//! subscriptions. Relations are stored as ids only.

use crate::config::{DisplayConfig, MAX_DECIMALS};
use crate::derived::Quantity;
use crate::error::ReplayError;
use crate::initial_state::InitialState;
use crate::session::{Mode, Session};
use crate::transform::TransformConfig;
use kinetrace_env::{BodyId, EnvError, KinematicState, PhysicsEngine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One tracked body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    pub initial: InitialState,
    pub live: KinematicState,
    pub mass: f64,
    pub is_static: bool,
}

/// One chart subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub object_id: BodyId,
    pub quantities: BTreeSet<Quantity>,
}

/// Everything needed to restore a scene's replay state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub bodies: BTreeMap<BodyId, BodyRecord>,
    pub transform: TransformConfig,
    pub display: DisplayConfig,
    #[serde(default)]
    pub origin_body: Option<BodyId>,
    #[serde(default)]
    pub charts: Vec<ChartRecord>,
}

impl SceneDocument {
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl<E: PhysicsEngine> Session<E> {
    /// Captures the current scene.
    pub fn to_document(&self) -> SceneDocument {
        let bodies = self
            .registry
            .iter()
            .filter_map(|initial| {
                let Some(sample) = self.engine.sample(initial.id) else {
                    debug!("Not saving {}: missing from engine", initial.id);
                    return None;
                };
                let record = BodyRecord {
                    initial: initial.clone(),
                    live: sample.kinematic_state(),
                    mass: sample.mass,
                    is_static: sample.is_static,
                };
                Some((initial.id, record))
            })
            .collect();

        let charts = self
            .graphs
            .charts()
            .iter()
            .map(|chart| ChartRecord {
                object_id: chart.object_id,
                quantities: chart.quantities().clone(),
            })
            .collect();

        SceneDocument {
            bodies,
            transform: self.transform,
            display: self.display,
            origin_body: self.origin_body,
            charts,
        }
    }

    /// Restores a document onto matching engine bodies.
    ///
    /// History is discarded. Records whose id the engine does not have are
    /// skipped. Returns the number of bodies restored.
    ///
    /// The document is checked before anything changes; a rejected document
    /// leaves the session as it was.
    pub fn apply_document(&mut self, document: &SceneDocument) -> Result<usize, ReplayError> {
        self.require("load a scene", &[Mode::Editing])?;
        self.validate_document(document)?;

        self.sync_bodies();
        self.recorder.clear();
        self.transform = document.transform;
        self.config.step_seconds = document.transform.time_scale;
        self.display = document.display;

        let mut restored = 0;
        for (id, record) in &document.bodies {
            if !self.engine.contains(*id) {
                debug!("Skipping {}: not in engine", id);
                continue;
            }
            self.engine.write_state(*id, &record.live)?;
            self.registry.insert(record.initial.clone());
            restored += 1;
        }
        self.engine.refresh_anchors();

        self.origin_body = document.origin_body.filter(|id| self.engine.contains(*id));
        self.sync_origin();

        let open: Vec<_> = self.graphs.charts().iter().map(|c| c.id).collect();
        for id in open {
            self.graphs.remove_chart(id)?;
        }
        for chart in &document.charts {
            if let Err(e) = self.add_chart(chart.object_id, chart.quantities.clone()) {
                debug!("Skipping chart on {}: {}", chart.object_id, e);
            }
        }

        self.cursor.place(0);
        self.frame = 0;
        self.time = 0.0;
        info!(
            "Loaded scene: {} of {} bodies, {} charts",
            restored,
            document.bodies.len(),
            self.graphs.charts().len()
        );
        Ok(restored)
    }

    fn validate_document(&self, document: &SceneDocument) -> Result<(), ReplayError> {
        let time_scale = document.transform.time_scale;
        if !(time_scale.is_finite() && time_scale > 0.0) {
            return Err(ReplayError::InvalidTimestep(time_scale));
        }
        if document.display.decimals > MAX_DECIMALS {
            return Err(ReplayError::InvalidDecimals(document.display.decimals));
        }

        for (&id, record) in &document.bodies {
            if !self.engine.contains(id) {
                continue;
            }
            let field = if !record.live.is_finite() {
                "live state"
            } else if !record.initial.kinematic_state().is_finite() {
                "initial state"
            } else {
                continue;
            };
            return Err(EnvError::NonFinite { id, field }.into());
        }
        Ok(())
    }
}
