//! SimWorld - the replay session driven by the reference engine.

use crate::engine::SimEngine;
use crate::error::SimError;

use kinetrace_core::{DisplayConfig, EditCommand, Mode, ReplayConfig, Session};
use nalgebra::Vector2;
use tracing::{debug, info};

/// Runs never record fewer frames than this, whatever the duration.
pub const MIN_TICKS: usize = 12;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for generated scenes
    pub seed: u64,

    /// Engine timestep in seconds
    pub step_seconds: f64,

    /// Simulated duration in seconds
    pub duration_secs: f64,

    /// Downward gravitational acceleration in world units/s²
    pub gravity: f64,

    /// Precision and angle unit of chart values
    pub display: DisplayConfig,

    /// World axis mirroring
    pub mirror_x: bool,
    pub mirror_y: bool,

    /// Record fixed bodies too
    pub track_static_bodies: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            step_seconds: 1.0 / 60.0,
            duration_secs: 2.0,
            gravity: 9.8,
            display: DisplayConfig::default(),
            mirror_x: false,
            mirror_y: false,
            track_static_bodies: true,
        }
    }
}

impl SimConfig {
    /// Number of ticks a full run takes.
    pub fn target_ticks(&self) -> usize {
        let ticks = (self.duration_secs / self.step_seconds).round();
        if ticks.is_finite() && ticks > 0.0 {
            (ticks as usize).max(MIN_TICKS)
        } else {
            MIN_TICKS
        }
    }

    /// Gravity in engine space (engine Y points down).
    pub fn engine_gravity(&self) -> Vector2<f64> {
        Vector2::new(0.0, self.gravity)
    }

    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            step_seconds: self.step_seconds,
            track_static_bodies: self.track_static_bodies,
            ..Default::default()
        }
    }
}

/// The SimWorld - a session over the reference engine.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    session: Session<SimEngine>,
}

impl SimWorld {
    /// Wraps a fully built engine and applies the configured world frame.
    pub fn new(config: SimConfig, engine: SimEngine) -> Result<Self, SimError> {
        let mut session = Session::new(engine, config.replay_config()).with_display(config.display);
        session.apply(EditCommand::SetMirror {
            mirror_x: config.mirror_x,
            mirror_y: config.mirror_y,
        })?;
        Ok(Self { config, session })
    }

    pub fn session(&self) -> &Session<SimEngine> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<SimEngine> {
        &mut self.session
    }

    pub fn engine(&self) -> &SimEngine {
        self.session.engine()
    }

    /// Runs (or resumes) for `ticks` ticks. Returns the number of recorded
    /// frames afterwards.
    pub fn run_ticks(&mut self, ticks: usize) -> Result<usize, SimError> {
        if self.session.mode() != Mode::Running {
            self.session.run()?;
        }

        for tick in 0..ticks {
            let frame = self.session.tick()?;
            if tick % 30 == 0 {
                debug!(
                    "  t={:.2}s | frame={} | objects={}",
                    self.session.time(),
                    frame,
                    self.session.recorder().object_count()
                );
            }
        }
        Ok(self.session.recorder().frame_count())
    }

    /// Runs for the configured duration.
    pub fn run_for_duration(&mut self) -> Result<usize, SimError> {
        let ticks = self.config.target_ticks();
        info!(
            "Running {} ticks of {:.4}s ({:.2}s)",
            ticks, self.config.step_seconds, self.config.duration_secs
        );
        self.run_ticks(ticks)
    }

    /// Pauses if needed and scrubs to a recorded frame.
    pub fn scrub(&mut self, frame: usize) -> Result<usize, SimError> {
        if self.session.mode() == Mode::Running {
            self.session.pause()?;
        }
        Ok(self.session.seek(frame)?)
    }

    /// Pauses if needed, discards history after `frame` and resumes.
    pub fn rewind_and_resume(&mut self, frame: usize) -> Result<(), SimError> {
        if self.session.mode() == Mode::Running {
            self.session.pause()?;
        }
        Ok(self.session.resume_from(frame)?)
    }

    /// Stops the run, keeping history.
    pub fn stop(&mut self) -> Result<(), SimError> {
        if self.session.mode() == Mode::Running {
            self.session.pause()?;
        }
        Ok(())
    }
}
