//! Time Cursor
//!
//! Scrubbing restores recorded state into the live engine instead of
//! re-simulating. A seek reads every tracked object's snapshot at the target
//! frame, writes its kinematic state back, and re-projects rotation-dependent
//! constraint anchors. It never appends to the recorder.

use crate::error::ReplayError;
use crate::recorder::FrameRecorder;
use kinetrace_env::PhysicsEngine;
use tracing::debug;

/// Current scrub position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeCursor {
    frame: usize,
}

impl TimeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame the live engine state currently corresponds to.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Moves the cursor without touching the engine (the running loop owns
    /// the engine state while it advances).
    pub(crate) fn place(&mut self, frame: usize) {
        self.frame = frame;
    }

    /// Restores every tracked object to its snapshot at `frame`.
    ///
    /// The frame is clamped to the recorded range. Objects with no snapshot
    /// at that frame, and snapshots the engine refuses, are skipped. Returns
    /// the frame actually restored; with fewer than `min_objects` tracked
    /// objects nothing happens and the current frame is returned.
    pub fn seek<E: PhysicsEngine>(
        &mut self,
        engine: &mut E,
        recorder: &FrameRecorder,
        min_objects: usize,
        frame: usize,
    ) -> usize {
        if recorder.object_count() < min_objects {
            debug!(
                "Seek ignored: {} tracked objects (need {})",
                recorder.object_count(),
                min_objects
            );
            return self.frame;
        }

        let Some(last) = recorder.frame_count().checked_sub(1) else {
            debug!("Seek ignored: nothing recorded");
            return self.frame;
        };
        let target = frame.min(last);

        for id in recorder.object_ids() {
            let snapshot = match recorder.get(id, target) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    debug!("Seek skipping {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = engine.write_state(id, &snapshot.kinematic_state()) {
                debug!("Seek skipping {}: {}", id, e);
            }
        }
        engine.refresh_anchors();

        self.frame = target;
        target
    }

    /// Seeks to the recorded frame whose time is nearest `seconds`.
    pub fn seek_time<E: PhysicsEngine>(
        &mut self,
        engine: &mut E,
        recorder: &FrameRecorder,
        min_objects: usize,
        seconds: f64,
        time_scale: f64,
    ) -> Result<usize, ReplayError> {
        let frame = frame_at_time(recorder, seconds, time_scale)?;
        Ok(self.seek(engine, recorder, min_objects, frame))
    }

    /// Scrubs one frame forward.
    pub fn step_forward<E: PhysicsEngine>(
        &mut self,
        engine: &mut E,
        recorder: &FrameRecorder,
        min_objects: usize,
    ) -> usize {
        let frame = self.frame.saturating_add(1);
        self.seek(engine, recorder, min_objects, frame)
    }

    /// Scrubs one frame backward.
    pub fn step_backward<E: PhysicsEngine>(
        &mut self,
        engine: &mut E,
        recorder: &FrameRecorder,
        min_objects: usize,
    ) -> usize {
        let frame = self.frame.saturating_sub(1);
        self.seek(engine, recorder, min_objects, frame)
    }
}

/// Recorded frame nearest to an elapsed time.
///
/// Recorded times are non-decreasing, so this is a binary search. Frames
/// no surviving object covers fall back to `frame * time_scale`.
pub fn frame_at_time(
    recorder: &FrameRecorder,
    seconds: f64,
    time_scale: f64,
) -> Result<usize, ReplayError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ReplayError::InvalidTime(seconds));
    }

    let time_of = |frame: usize| {
        recorder
            .time_at(frame)
            .unwrap_or(frame as f64 * time_scale)
    };

    let count = recorder.frame_count();
    let (mut lo, mut hi) = (0, count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if time_of(mid) < seconds {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    if lo == 0 {
        return Ok(0);
    }
    if lo == count {
        return Ok(count - 1);
    }
    let before = seconds - time_of(lo - 1);
    let after = time_of(lo) - seconds;
    Ok(if before <= after { lo - 1 } else { lo })
}
