//! Frame Recorder - the authoritative history
//!
//! Append-only, per-object, frame-indexed sequences of raw engine-space
//! snapshots. History is never merged: resuming from an earlier frame
//! truncates first, so the recorded future is always a function of the
//! engine steps taken after that frame alone.

use crate::error::ReplayError;
use kinetrace_env::{BodyId, BodySample, KinematicState, Outline};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One object's state at one frame, in engine space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: BodyId,
    pub frame: usize,

    /// Elapsed simulated seconds at this frame
    pub time: f64,

    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub angle: f64,
    pub angular_velocity: f64,

    /// Deep copy: engines mutate outlines in place
    pub outline: Outline,

    pub mass: f64,
}

impl Snapshot {
    /// Freezes a live body sample as frame `frame` at `time`.
    pub fn from_sample(sample: &BodySample, frame: usize, time: f64) -> Self {
        Self {
            id: sample.id,
            frame,
            time,
            position: sample.position,
            velocity: sample.velocity,
            angle: sample.angle,
            angular_velocity: sample.angular_velocity,
            outline: sample.outline.clone(),
            mass: sample.mass,
        }
    }

    /// The state the time cursor writes back.
    pub fn kinematic_state(&self) -> KinematicState {
        KinematicState {
            position: self.position,
            velocity: self.velocity,
            angle: self.angle,
            angular_velocity: self.angular_velocity,
        }
    }
}

/// Contiguous snapshots of one object starting at `first_frame`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameSeries {
    first_frame: usize,
    snapshots: Vec<Snapshot>,
}

impl FrameSeries {
    /// Empty series whose first snapshot will be `first_frame`.
    pub fn starting_at(first_frame: usize) -> Self {
        Self {
            first_frame,
            snapshots: Vec::new(),
        }
    }

    /// Frame of the first snapshot (0 for objects present from the start).
    pub fn first_frame(&self) -> usize {
        self.first_frame
    }

    /// One past the last recorded frame.
    pub fn end_frame(&self) -> usize {
        self.first_frame + self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot at absolute frame index.
    pub fn get(&self, frame: usize) -> Option<&Snapshot> {
        frame
            .checked_sub(self.first_frame)
            .and_then(|i| self.snapshots.get(i))
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Drops every snapshot with frame >= `frame`.
    pub fn truncate(&mut self, frame: usize) {
        self.snapshots.truncate(frame.saturating_sub(self.first_frame));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}

/// Per-object frame history.
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    series: BTreeMap<BodyId, FrameSeries>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an empty series for an object. Existing history is kept.
    pub fn register(&mut self, id: BodyId, first_frame: usize) {
        self.series
            .entry(id)
            .or_insert_with(|| FrameSeries::starting_at(first_frame));
    }

    /// Purges an object's history. Returns false if it was not registered.
    pub fn unregister(&mut self, id: BodyId) -> bool {
        self.series.remove(&id).is_some()
    }

    pub fn is_registered(&self, id: BodyId) -> bool {
        self.series.contains_key(&id)
    }

    /// Appends a snapshot to its object's series.
    ///
    /// Unregistered ids are ignored (the object may have appeared mid-tick).
    /// The first snapshot of an empty series sets its first frame.
    /// A snapshot behind the end of the series replaces everything from its
    /// frame on; a snapshot that would leave a gap is refused.
    pub fn record(&mut self, snapshot: Snapshot) -> bool {
        let Some(series) = self.series.get_mut(&snapshot.id) else {
            debug!("Skipping snapshot for unregistered object {}", snapshot.id);
            return false;
        };

        // Empty series start at their first snapshot
        if series.is_empty() {
            series.first_frame = snapshot.frame;
        }

        if snapshot.frame < series.first_frame {
            warn!(
                "Refusing snapshot for {} at frame {}: series starts at {}",
                snapshot.id, snapshot.frame, series.first_frame
            );
            return false;
        }

        let end = series.end_frame();
        if snapshot.frame < end {
            debug!(
                "Discarding stale history of {} from frame {} (had {})",
                snapshot.id, snapshot.frame, end
            );
            series.truncate(snapshot.frame);
        } else if snapshot.frame > end {
            warn!(
                "Refusing snapshot for {} at frame {}: series ends at {}",
                snapshot.id, snapshot.frame, end
            );
            return false;
        }

        series.snapshots.push(snapshot);
        true
    }

    /// Drops every snapshot with frame >= `frame` in every series.
    pub fn truncate(&mut self, frame: usize) {
        for series in self.series.values_mut() {
            series.truncate(frame);
        }
    }

    /// Drops all history but keeps registrations.
    pub fn clear(&mut self) {
        for series in self.series.values_mut() {
            series.snapshots.clear();
            series.first_frame = 0;
        }
    }

    /// Snapshot of an object at a frame.
    pub fn get(&self, id: BodyId, frame: usize) -> Result<&Snapshot, ReplayError> {
        let series = self.series.get(&id).ok_or(ReplayError::MissingObject(id))?;
        series.get(frame).ok_or(ReplayError::OutOfRangeFrame {
            frame,
            first: series.first_frame(),
            end: series.end_frame(),
        })
    }

    /// Like [`get`](Self::get), but rejects negative indices instead of
    /// reading before the start of the series.
    pub fn get_signed(&self, id: BodyId, frame: i64) -> Result<&Snapshot, ReplayError> {
        let frame = usize::try_from(frame).map_err(|_| ReplayError::NegativeFrame(frame))?;
        self.get(id, frame)
    }

    /// Most recent snapshot of an object.
    pub fn latest(&self, id: BodyId) -> Option<&Snapshot> {
        self.series.get(&id).and_then(FrameSeries::latest)
    }

    pub fn series(&self, id: BodyId) -> Option<&FrameSeries> {
        self.series.get(&id)
    }

    /// Number of recorded frames (one past the furthest frame of any object).
    pub fn frame_count(&self) -> usize {
        self.series
            .values()
            .map(FrameSeries::end_frame)
            .max()
            .unwrap_or(0)
    }

    /// Number of registered objects.
    pub fn object_count(&self) -> usize {
        self.series.len()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.series.keys().copied()
    }

    /// Recorded time of a frame, from any object that has it.
    pub fn time_at(&self, frame: usize) -> Option<f64> {
        self.series
            .values()
            .find_map(|series| series.get(frame))
            .map(|snapshot| snapshot.time)
    }

    /// Rescales every recorded velocity and angular velocity in place.
    ///
    /// Only called on a timestep edit: per-step engine rates change meaning
    /// when the step length changes.
    pub fn rescale_rates(&mut self, factor: f64) {
        for snapshot in self
            .series
            .values_mut()
            .flat_map(|series| series.snapshots.iter_mut())
        {
            snapshot.velocity *= factor;
            snapshot.angular_velocity *= factor;
        }
    }
}
