//! Replay Session - the single context value
//!
//! Owns the engine and every piece of replay state, and gates each operation
//! on an explicit mode:
//!
//! - `Editing`: scene can be changed, nothing is recorded
//! - `Running`: the driver calls [`Session::tick`] at a fixed cadence
//! - `Paused`: the time cursor scrubs through recorded history
//!
//! Operations not allowed in the current mode return
//! [`ReplayError::InvalidMode`] and change nothing.

use crate::config::{DisplayConfig, ReplayConfig};
use crate::cursor::TimeCursor;
use crate::derived::{HistoryView, Kinematics, Quantity};
use crate::error::ReplayError;
use crate::graph::{ChartId, GraphSync, PointObserver};
use crate::initial_state::InitialStateRegistry;
use crate::recorder::{FrameRecorder, Snapshot};
use crate::transform::TransformConfig;
use kinetrace_env::{BodyId, BodySample, PhysicsEngine};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Run/edit/scrub state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Editing,
    Running,
    Paused,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Editing => write!(f, "editing"),
            Mode::Running => write!(f, "running"),
            Mode::Paused => write!(f, "paused"),
        }
    }
}

/// Bodies registered and purged by one [`Session::sync_bodies`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyChanges {
    pub added: Vec<BodyId>,
    pub removed: Vec<BodyId>,
}

/// Replay state for one scene.
pub struct Session<E: PhysicsEngine> {
    pub(crate) engine: E,
    pub(crate) registry: InitialStateRegistry,
    pub(crate) recorder: FrameRecorder,
    pub(crate) graphs: GraphSync,
    pub(crate) cursor: TimeCursor,
    pub(crate) transform: TransformConfig,
    pub(crate) display: DisplayConfig,
    pub(crate) config: ReplayConfig,
    pub(crate) mode: Mode,

    /// Next frame to be recorded
    pub(crate) frame: usize,

    /// Elapsed simulated seconds at `frame`
    pub(crate) time: f64,

    /// Body whose position and angle define the world origin
    pub(crate) origin_body: Option<BodyId>,
}

impl<E: PhysicsEngine> Session<E> {
    /// Wraps an engine and captures the initial state of every body in it.
    ///
    /// A non-positive or non-finite `step_seconds` falls back to the default
    /// timestep.
    pub fn new(engine: E, mut config: ReplayConfig) -> Self {
        if !(config.step_seconds.is_finite() && config.step_seconds > 0.0) {
            let fallback = ReplayConfig::default().step_seconds;
            warn!(
                "Invalid timestep {}s, using {}s",
                config.step_seconds, fallback
            );
            config.step_seconds = fallback;
        }

        let mut session = Self {
            engine,
            registry: InitialStateRegistry::new(),
            recorder: FrameRecorder::new(),
            graphs: GraphSync::new(),
            cursor: TimeCursor::new(),
            transform: TransformConfig::with_time_scale(config.step_seconds),
            display: DisplayConfig::default(),
            config,
            mode: Mode::Editing,
            frame: 0,
            time: 0.0,
            origin_body: None,
        };
        session.sync_bodies();
        session
    }

    /// Replaces the display settings.
    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.display = display;
        self
    }

    // ========== Accessors ==========

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Direct engine access. Bodies added or removed here are picked up by
    /// the next [`sync_bodies`](Self::sync_bodies) or tick.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn registry(&self) -> &InitialStateRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> &FrameRecorder {
        &self.recorder
    }

    pub fn graphs(&self) -> &GraphSync {
        &self.graphs
    }

    pub fn transform(&self) -> &TransformConfig {
        &self.transform
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Next frame the running loop will record.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cursor_frame(&self) -> usize {
        self.cursor.frame()
    }

    /// Recorded time at the cursor, or the live clock if that frame is not
    /// recorded yet.
    pub fn cursor_time(&self) -> f64 {
        self.recorder
            .time_at(self.cursor.frame())
            .unwrap_or(self.time)
    }

    pub fn origin_body(&self) -> Option<BodyId> {
        self.origin_body
    }

    /// Read-only view for derived-quantity lookups.
    pub fn history(&self) -> HistoryView<'_> {
        HistoryView {
            recorder: &self.recorder,
            registry: &self.registry,
            transform: &self.transform,
            display: &self.display,
        }
    }

    /// Charts plus a history view over the remaining fields.
    pub(crate) fn charts_and_history(&mut self) -> (&mut GraphSync, HistoryView<'_>) {
        (
            &mut self.graphs,
            HistoryView {
                recorder: &self.recorder,
                registry: &self.registry,
                transform: &self.transform,
                display: &self.display,
            },
        )
    }

    pub(crate) fn require(&self, op: &'static str, allowed: &[Mode]) -> Result<(), ReplayError> {
        if allowed.contains(&self.mode) {
            Ok(())
        } else {
            Err(ReplayError::invalid_mode(op, self.mode))
        }
    }

    // ========== Mode transitions ==========

    /// Starts or resumes the run.
    ///
    /// From `Paused`, history after the cursor is discarded first.
    pub fn run(&mut self) -> Result<(), ReplayError> {
        match self.mode {
            Mode::Editing => {
                self.mode = Mode::Running;
                info!("Run started at frame {}", self.frame);
                Ok(())
            }
            Mode::Paused => self.resume_from(self.cursor.frame()),
            Mode::Running => Err(ReplayError::invalid_mode("run", self.mode)),
        }
    }

    /// Stops the running loop; the cursor sits on the live state.
    pub fn pause(&mut self) -> Result<(), ReplayError> {
        self.require("pause", &[Mode::Running])?;
        self.cursor.place(self.frame);
        self.mode = Mode::Paused;
        info!("Paused at frame {} (t={:.3}s)", self.frame, self.time);
        Ok(())
    }

    /// Scrubs to `frame`, drops all history from there on, and resumes.
    ///
    /// Charts are truncated in the same step as the recorder, so no
    /// consumer ever sees points from the discarded future.
    pub fn resume_from(&mut self, frame: usize) -> Result<(), ReplayError> {
        self.require("resume", &[Mode::Paused])?;

        let frame = if frame == self.cursor.frame() {
            frame
        } else {
            let reached = self.cursor.seek(
                &mut self.engine,
                &self.recorder,
                self.config.min_scrub_objects,
                frame,
            );
            self.restore_unrecorded(reached);
            reached
        };

        if frame < self.frame {
            info!(
                "Resuming from frame {}: discarding {} recorded frames",
                frame,
                self.frame - frame
            );
            self.time = self
                .recorder
                .time_at(frame)
                .unwrap_or(frame as f64 * self.transform.time_scale);
            self.recorder.truncate(frame);
            self.graphs.truncate(frame);
            self.frame = frame;
        }

        self.mode = Mode::Running;
        Ok(())
    }

    /// Clears all history and restores every object to its initial state.
    pub fn reset(&mut self) -> Result<(), ReplayError> {
        self.require("reset", &[Mode::Editing, Mode::Paused])?;

        self.recorder.clear();
        for state in self.registry.iter() {
            if let Err(e) = self.engine.write_state(state.id, &state.kinematic_state()) {
                debug!("Reset skipping {}: {}", state.id, e);
            }
        }
        self.engine.refresh_anchors();
        self.sync_origin();
        self.graphs.clear(self.display.angle_unit);

        self.cursor.place(0);
        self.frame = 0;
        self.time = 0.0;
        self.mode = Mode::Editing;
        info!("Reset to initial states ({} objects)", self.registry.len());
        Ok(())
    }

    // ========== Running ==========

    /// One engine tick: record the live state as the current frame, append
    /// chart points, then advance the engine by one step.
    ///
    /// Returns the frame that was recorded.
    pub fn tick(&mut self) -> Result<usize, ReplayError> {
        self.require("tick", &[Mode::Running])?;
        self.sync_bodies();

        let frame = self.frame;
        let ids: Vec<BodyId> = self.recorder.object_ids().collect();
        for id in ids {
            match self.engine.sample(id) {
                Some(sample) => {
                    self.recorder
                        .record(Snapshot::from_sample(&sample, frame, self.time));
                }
                None => debug!("Object {} vanished before frame {}", id, frame),
            }
        }

        let (graphs, view) = self.charts_and_history();
        graphs.on_frame(frame, &view);

        let dt = self.transform.time_scale;
        self.engine.step(self.time, dt);
        self.frame += 1;
        self.time += dt;

        debug!("Recorded frame {} at t={:.3}s", frame, self.time - dt);
        Ok(frame)
    }

    /// Registers bodies the engine gained and purges the ones it lost.
    pub fn sync_bodies(&mut self) -> BodyChanges {
        let mut changes = BodyChanges::default();

        let live: BTreeSet<BodyId> = self.engine.body_ids().into_iter().collect();
        for &id in &live {
            if self.recorder.is_registered(id) {
                continue;
            }
            if let Some(sample) = self.engine.sample(id) {
                if self.tracks(&sample) {
                    self.track(&sample);
                    changes.added.push(id);
                }
            }
        }

        let gone: Vec<BodyId> = self
            .recorder
            .object_ids()
            .filter(|id| !live.contains(id))
            .collect();
        for id in gone {
            self.purge(id);
            changes.removed.push(id);
        }

        changes
    }

    fn tracks(&self, sample: &BodySample) -> bool {
        !sample.is_static || self.config.track_static_bodies
    }

    fn track(&mut self, sample: &BodySample) {
        if !self.registry.contains(sample.id) {
            self.registry.capture(sample);
        }
        self.recorder.register(sample.id, self.frame);
        debug!("Tracking {} from frame {}", sample.id, self.frame);
    }

    /// Forgets everything about an object.
    pub(crate) fn purge(&mut self, id: BodyId) {
        self.recorder.unregister(id);
        self.registry.remove(id);
        let charts = self.graphs.remove_charts_for(id);
        if self.origin_body == Some(id) {
            warn!("Origin body {} removed; world origin left in place", id);
            self.origin_body = None;
        }
        info!("Purged {} ({} charts closed)", id, charts);
    }

    // ========== Scrubbing ==========

    /// Restores the engine to a recorded frame. Returns the frame reached.
    pub fn seek(&mut self, frame: usize) -> Result<usize, ReplayError> {
        self.require("seek", &[Mode::Paused])?;
        let reached = self.cursor.seek(
            &mut self.engine,
            &self.recorder,
            self.config.min_scrub_objects,
            frame,
        );
        self.after_seek();
        Ok(reached)
    }

    /// Restores the engine to the recorded frame nearest `seconds`.
    pub fn seek_time(&mut self, seconds: f64) -> Result<usize, ReplayError> {
        self.require("seek", &[Mode::Paused])?;
        let reached = self.cursor.seek_time(
            &mut self.engine,
            &self.recorder,
            self.config.min_scrub_objects,
            seconds,
            self.transform.time_scale,
        )?;
        self.after_seek();
        Ok(reached)
    }

    pub fn step_forward(&mut self) -> Result<usize, ReplayError> {
        self.require("step forward", &[Mode::Paused])?;
        let reached =
            self.cursor
                .step_forward(&mut self.engine, &self.recorder, self.config.min_scrub_objects);
        self.after_seek();
        Ok(reached)
    }

    pub fn step_backward(&mut self) -> Result<usize, ReplayError> {
        self.require("step backward", &[Mode::Paused])?;
        let reached =
            self.cursor
                .step_backward(&mut self.engine, &self.recorder, self.config.min_scrub_objects);
        self.after_seek();
        Ok(reached)
    }

    /// Puts bodies whose history starts after `frame` back in their
    /// initial state, so nothing from a later frame survives a rewind.
    fn restore_unrecorded(&mut self, frame: usize) {
        let pending: Vec<BodyId> = self
            .recorder
            .object_ids()
            .filter(|&id| {
                self.recorder
                    .series(id)
                    .is_some_and(|series| series.first_frame() > frame)
            })
            .collect();
        if pending.is_empty() {
            return;
        }

        for id in pending {
            let Some(state) = self.registry.get(id).map(|s| s.kinematic_state()) else {
                continue;
            };
            if let Err(e) = self.engine.write_state(id, &state) {
                debug!("Seek skipping {}: {}", id, e);
            }
        }
        self.engine.refresh_anchors();
    }

    fn after_seek(&mut self) {
        let frame = self.cursor.frame();
        self.restore_unrecorded(frame);
        let time = self.cursor_time();
        self.graphs.mark_cursor(time, &self.display);
    }

    // ========== Pull interfaces ==========

    pub fn latest_snapshot(&self, id: BodyId) -> Option<&Snapshot> {
        self.recorder.latest(id)
    }

    pub fn snapshot_at(&self, id: BodyId, frame: usize) -> Result<&Snapshot, ReplayError> {
        self.recorder.get(id, frame)
    }

    /// Full-precision world kinematics of an object at a recorded frame.
    pub fn kinematics(&self, id: BodyId, frame: usize) -> Result<Kinematics, ReplayError> {
        self.history().kinematics(id, frame)
    }

    /// World positions for the overlay trail: every `trail_stride`-th
    /// recorded frame up to the cursor (or the newest frame while running).
    pub fn trail(&self, id: BodyId) -> Result<Vec<Vector2<f64>>, ReplayError> {
        let series = self
            .recorder
            .series(id)
            .ok_or(ReplayError::MissingObject(id))?;
        let end = match self.mode {
            Mode::Paused => (self.cursor.frame() + 1).min(series.end_frame()),
            _ => series.end_frame(),
        };
        let stride = self.display.trail_stride.max(1);

        Ok(series
            .iter()
            .take_while(|s| s.frame < end)
            .filter(|s| s.frame % stride == 0)
            .map(|s| self.transform.position_to_world(s.position))
            .collect())
    }

    // ========== Charts ==========

    /// Registers a push subscriber for chart points.
    pub fn subscribe(&mut self, observer: Box<dyn PointObserver>) {
        self.graphs.subscribe(observer);
    }

    /// Opens a chart on a tracked object, filled from its recorded history.
    pub fn add_chart(
        &mut self,
        object_id: BodyId,
        quantities: BTreeSet<Quantity>,
    ) -> Result<ChartId, ReplayError> {
        if !self.recorder.is_registered(object_id) {
            return Err(ReplayError::MissingObject(object_id));
        }
        let (graphs, view) = self.charts_and_history();
        Ok(graphs.add_chart(object_id, quantities, &view))
    }

    pub fn remove_chart(&mut self, id: ChartId) -> Result<(), ReplayError> {
        self.graphs.remove_chart(id).map(|_| ())
    }

    pub fn set_quantity(
        &mut self,
        chart: ChartId,
        quantity: Quantity,
        enabled: bool,
    ) -> Result<(), ReplayError> {
        let (graphs, view) = self.charts_and_history();
        graphs.set_quantity(chart, quantity, enabled, &view)
    }

    /// Replays every chart after the world frame or display settings changed.
    pub(crate) fn rebuild_charts(&mut self) {
        let (graphs, view) = self.charts_and_history();
        graphs.rebuild_all(&view);
    }

    // ========== World frame ==========

    /// Changes the engine timestep, rescaling every stored per-step rate.
    ///
    /// Recorded snapshots, initial states and live engine bodies all have
    /// their velocities and angular velocities multiplied by `new / old`, so
    /// world-space values stay the same. Recorded times are untouched.
    pub fn set_timestep(&mut self, seconds: f64) -> Result<(), ReplayError> {
        self.require("change the timestep", &[Mode::Editing, Mode::Paused])?;
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ReplayError::InvalidTimestep(seconds));
        }

        let factor = seconds / self.transform.time_scale;
        self.recorder.rescale_rates(factor);
        self.registry.rescale_rates(factor);
        for id in self.engine.body_ids() {
            let Some(sample) = self.engine.sample(id) else {
                continue;
            };
            let mut state = sample.kinematic_state();
            state.velocity *= factor;
            state.angular_velocity *= factor;
            self.engine.write_state(id, &state)?;
        }

        info!(
            "Timestep {:.4}s -> {:.4}s (rates x{:.4})",
            self.transform.time_scale, seconds, factor
        );
        self.transform.time_scale = seconds;
        self.config.step_seconds = seconds;
        self.rebuild_charts();
        Ok(())
    }

    /// Makes a body the world origin reference.
    pub fn set_origin_body(&mut self, id: Option<BodyId>) -> Result<(), ReplayError> {
        self.require("move the origin", &[Mode::Editing, Mode::Paused])?;
        match id {
            Some(id) if !self.engine.contains(id) => Err(ReplayError::MissingObject(id)),
            _ => {
                self.origin_body = id;
                if id.is_none() {
                    self.transform.origin_position = Vector2::zeros();
                    self.transform.origin_angle = 0.0;
                }
                self.sync_origin();
                self.rebuild_charts();
                Ok(())
            }
        }
    }

    /// Pulls the origin pose from the origin body's current state.
    pub(crate) fn sync_origin(&mut self) {
        let Some(id) = self.origin_body else {
            return;
        };
        match self.engine.sample(id) {
            Some(sample) => {
                self.transform.origin_position = sample.position;
                self.transform.origin_angle = sample.angle;
            }
            None => debug!("Origin body {} not in engine", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToyEngine;
    use approx::assert_relative_eq;

    const DT: f64 = 0.1;

    fn config(dt: f64) -> ReplayConfig {
        ReplayConfig {
            step_seconds: dt,
            ..Default::default()
        }
    }

    /// Ground plus one body falling at 9.8 (engine Y points down).
    fn free_fall() -> (Session<ToyEngine>, BodyId) {
        let mut engine = ToyEngine::new();
        engine.add_static(Vector2::new(0.0, 50.0));
        let ball = engine.add(Vector2::zeros(), Vector2::new(0.0, 9.8));
        (Session::new(engine, config(DT)), ball)
    }

    fn run_ticks<E: PhysicsEngine>(session: &mut Session<E>, n: usize) {
        for _ in 0..n {
            session.tick().unwrap();
        }
    }

    #[test]
    fn test_free_fall_kinematics() {
        let (mut session, ball) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 11);

        let k = session.kinematics(ball, 10).unwrap();
        assert_relative_eq!(k.velocity.y.abs(), 9.8, epsilon = 1e-9);
        assert_relative_eq!(k.velocity.y, -9.8, epsilon = 1e-9);

        for frame in 1..=10 {
            let k = session.kinematics(ball, frame).unwrap();
            assert_relative_eq!(k.acceleration.norm(), 9.8, epsilon = 1e-9);
        }
        assert_eq!(session.kinematics(ball, 0).unwrap().acceleration, Vector2::zeros());
    }

    #[test]
    fn test_free_fall_scrub_reproduces_state() {
        let (mut session, ball) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 11);
        session.pause().unwrap();

        session.seek(5).unwrap();
        let at_five = session.engine().state(ball);
        session.seek(10).unwrap();
        assert_ne!(session.engine().state(ball), at_five);
        session.seek(5).unwrap();
        assert_eq!(session.engine().state(ball), at_five);

        assert_eq!(session.recorder().frame_count(), 11);
        assert_eq!(session.cursor_frame(), 5);
        assert_relative_eq!(session.cursor_time(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_resume_truncates_then_appends() {
        let (mut session, ball) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 20);
        let original = session.snapshot_at(ball, 10).unwrap().clone();

        session.pause().unwrap();
        session.seek(8).unwrap();
        session.run().unwrap();
        run_ticks(&mut session, 5);

        let series = session.recorder().series(ball).unwrap();
        assert_eq!(series.len(), 13);
        let frames: Vec<usize> = series.iter().map(|s| s.frame).collect();
        assert_eq!(frames, (0..13).collect::<Vec<_>>());

        let replayed = session.snapshot_at(ball, 10).unwrap();
        assert_eq!(replayed.position, original.position);
        assert_relative_eq!(replayed.time, original.time, epsilon = 1e-12);
    }

    #[test]
    fn test_resume_truncates_charts() {
        let (mut session, ball) = free_fall();
        let chart = session
            .add_chart(ball, GraphSync::default_quantities())
            .unwrap();
        session.run().unwrap();
        run_ticks(&mut session, 10);
        assert_eq!(session.graphs().chart(chart).unwrap().len(), 10);

        session.pause().unwrap();
        session.resume_from(4).unwrap();
        assert_eq!(session.graphs().chart(chart).unwrap().len(), 4);
        assert_eq!(session.mode(), Mode::Running);

        run_ticks(&mut session, 2);
        assert_eq!(session.graphs().chart(chart).unwrap().len(), 6);
    }

    #[test]
    fn test_constant_acceleration() {
        let a = 2.0;
        let dt = 0.05;
        let n = 20;
        let mut engine = ToyEngine::new();
        engine.add_static(Vector2::new(0.0, 10.0));
        let body = engine.add(Vector2::zeros(), Vector2::new(a, 0.0));
        let mut session = Session::new(engine, config(dt));

        session.run().unwrap();
        run_ticks(&mut session, n + 1);

        let k = session.kinematics(body, n).unwrap();
        assert_relative_eq!(k.acceleration.x, a, epsilon = 1e-6);
        assert_relative_eq!(k.velocity.x, a * n as f64 * dt, epsilon = 1e-6);
    }

    #[test]
    fn test_mode_gating() {
        let (mut session, _) = free_fall();

        assert!(matches!(
            session.tick(),
            Err(ReplayError::InvalidMode { mode: Mode::Editing, .. })
        ));
        assert!(session.pause().is_err());
        assert!(session.seek(0).is_err());

        session.run().unwrap();
        assert!(session.run().is_err());
        assert!(session.reset().is_err());
        assert!(session.set_timestep(0.2).is_err());
        assert!(session.seek(0).is_err());
    }

    #[test]
    fn test_reset_restores_initial_states() {
        let (mut session, ball) = free_fall();
        let start = session.engine().state(ball);
        session.run().unwrap();
        run_ticks(&mut session, 6);
        session.pause().unwrap();
        session.reset().unwrap();

        assert_eq!(session.mode(), Mode::Editing);
        assert_eq!(session.engine().state(ball), start);
        assert_eq!(session.recorder().frame_count(), 0);
        assert_eq!(session.frame(), 0);
        assert_eq!(session.time(), 0.0);
    }

    #[test]
    fn test_removed_body_purged_on_tick() {
        let (mut session, ball) = free_fall();
        let chart = session.add_chart(ball, GraphSync::default_quantities()).unwrap();
        session.run().unwrap();
        run_ticks(&mut session, 3);

        session.engine_mut().remove_body(ball).unwrap();
        session.tick().unwrap();

        assert!(matches!(
            session.snapshot_at(ball, 0),
            Err(ReplayError::MissingObject(_))
        ));
        assert!(session.registry().get(ball).is_none());
        assert!(session.graphs().chart(chart).is_none());
    }

    #[test]
    fn test_body_added_mid_run_is_frame_addressed() {
        let (mut session, _) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 3);

        let late = session.engine_mut().add(Vector2::new(1.0, 1.0), Vector2::zeros());
        run_ticks(&mut session, 2);

        let series = session.recorder().series(late).unwrap();
        assert_eq!(series.first_frame(), 3);
        assert_eq!(session.snapshot_at(late, 4).unwrap().frame, 4);
        assert!(session.snapshot_at(late, 2).is_err());
        assert!(session.registry().contains(late));
    }

    #[test]
    fn test_rewind_before_late_body_rerecords_it() {
        let (mut session, _) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 4);

        let spawn = Vector2::new(1.0, 1.0);
        let late = session.engine_mut().add(spawn, Vector2::new(0.0, 9.8));
        run_ticks(&mut session, 4);
        assert_eq!(session.recorder().series(late).unwrap().first_frame(), 4);

        session.pause().unwrap();
        session.seek(2).unwrap();
        assert_eq!(session.engine().state(late).position, spawn);
        assert_eq!(session.engine().state(late).velocity, Vector2::zeros());

        session.run().unwrap();
        run_ticks(&mut session, 4);

        let series = session.recorder().series(late).unwrap();
        let frames: Vec<usize> = series.iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![2, 3, 4, 5]);
        assert_eq!(session.snapshot_at(late, 2).unwrap().position, spawn);
        assert_eq!(session.frame(), 6);
    }

    #[test]
    fn test_latest_snapshot_tracks_last_tick() {
        let (mut session, ball) = free_fall();
        assert!(session.latest_snapshot(ball).is_none());

        session.run().unwrap();
        run_ticks(&mut session, 5);
        let latest = session.latest_snapshot(ball).unwrap();
        assert_eq!(latest.frame, 4);
        assert_eq!(latest.id, ball);

        session.pause().unwrap();
        session.reset().unwrap();
        session
            .apply(crate::edit::EditCommand::Delete { id: ball })
            .unwrap();
        assert!(session.latest_snapshot(ball).is_none());
    }

    #[test]
    fn test_invalid_step_seconds_falls_back() {
        for step_seconds in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let mut engine = ToyEngine::new();
            engine.add_static(Vector2::zeros());
            let ball = engine.add(Vector2::zeros(), Vector2::new(0.0, 9.8));
            let mut session = Session::new(engine, config(step_seconds));

            assert_relative_eq!(session.transform().time_scale, 1.0 / 60.0);
            session.run().unwrap();
            run_ticks(&mut session, 3);
            let k = session.kinematics(ball, 2).unwrap();
            assert!(k.velocity.y.is_finite());
            assert!(k.acceleration.y.is_finite());
        }
    }

    #[test]
    fn test_seek_noop_with_single_object() {
        let mut engine = ToyEngine::new();
        let ball = engine.add(Vector2::zeros(), Vector2::new(0.0, 9.8));
        let mut session = Session::new(engine, config(DT));
        session.run().unwrap();
        run_ticks(&mut session, 5);
        session.pause().unwrap();

        let live = session.engine().state(ball);
        assert_eq!(session.seek(1).unwrap(), 5);
        assert_eq!(session.engine().state(ball), live);
    }

    #[test]
    fn test_untracked_static_bodies() {
        let mut engine = ToyEngine::new();
        let ground = engine.add_static(Vector2::zeros());
        let ball = engine.add(Vector2::zeros(), Vector2::zeros());
        let session = Session::new(
            engine,
            ReplayConfig {
                track_static_bodies: false,
                ..config(DT)
            },
        );

        assert!(!session.recorder().is_registered(ground));
        assert!(session.recorder().is_registered(ball));
    }

    #[test]
    fn test_timestep_edit_keeps_world_values() {
        let (mut session, ball) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 6);
        session.pause().unwrap();
        let before = session.kinematics(ball, 5).unwrap();

        session.set_timestep(0.05).unwrap();
        let after = session.kinematics(ball, 5).unwrap();
        assert_relative_eq!(after.velocity.y, before.velocity.y, epsilon = 1e-9);
        assert_relative_eq!(session.transform().time_scale, 0.05);

        assert!(matches!(
            session.set_timestep(0.0),
            Err(ReplayError::InvalidTimestep(_))
        ));
        assert!(session.set_timestep(f64::INFINITY).is_err());
    }

    #[test]
    fn test_trail_follows_cursor() {
        let (mut session, ball) = free_fall();
        session.run().unwrap();
        run_ticks(&mut session, 10);
        assert_eq!(session.trail(ball).unwrap().len(), 4);

        session.pause().unwrap();
        session.seek(4).unwrap();
        assert_eq!(session.trail(ball).unwrap().len(), 2);
        assert!(session.trail(BodyId(99)).is_err());
    }

    #[test]
    fn test_origin_body_sets_world_origin() {
        let mut engine = ToyEngine::new();
        let marker = engine.add_static(Vector2::new(20.0, 500.0));
        let ball = engine.add(Vector2::new(30.0, 480.0), Vector2::zeros());
        let mut session = Session::new(engine, config(DT));

        session.set_origin_body(Some(marker)).unwrap();
        session.run().unwrap();
        run_ticks(&mut session, 1);

        let k = session.kinematics(ball, 0).unwrap();
        assert_relative_eq!(k.position.x, 10.0);
        assert_relative_eq!(k.position.y, 20.0);
        assert!(session.set_origin_body(Some(BodyId(42))).is_err());
    }
}
