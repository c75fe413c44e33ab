//! The "FRAME" Layer - Engine Space <-> World Space
//!
//! The engine works in its own fixed frame: screen-style Y axis pointing
//! down, velocities measured per step. Users want a world frame with an
//! arbitrary origin, optional axis mirroring, rotation, and per-second rates.
//!
//! Every `*_to_world` / `*_to_engine` pair here is an exact inverse for all
//! four mirror combinations and any origin rotation.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// Parameters of the engine -> world mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Engine-space position of the world origin
    pub origin_position: Vector2<f64>,

    /// Engine-space orientation of the world X axis (radians)
    pub origin_angle: f64,

    /// Mirror the world X axis
    pub mirror_x: bool,

    /// Mirror the world Y axis. The engine's Y axis already points opposite
    /// to the display convention, so `false` means "negate Y".
    pub mirror_y: bool,

    /// Seconds per engine step (step milliseconds / 1000)
    pub time_scale: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            origin_position: Vector2::zeros(),
            origin_angle: 0.0,
            mirror_x: false,
            mirror_y: false,
            time_scale: 1.0 / 60.0,
        }
    }
}

impl TransformConfig {
    /// Identity origin with the given timestep.
    pub fn with_time_scale(time_scale: f64) -> Self {
        Self {
            time_scale,
            ..Default::default()
        }
    }

    /// Points the origin at an engine-space position and orientation.
    pub fn with_origin(mut self, position: Vector2<f64>, angle: f64) -> Self {
        self.origin_position = position;
        self.origin_angle = angle;
        self
    }

    /// Sets both mirror flags.
    pub fn with_mirror(mut self, mirror_x: bool, mirror_y: bool) -> Self {
        self.mirror_x = mirror_x;
        self.mirror_y = mirror_y;
        self
    }

    // ========== Positions ==========

    /// Engine position -> world position.
    pub fn position_to_world(&self, p: Vector2<f64>) -> Vector2<f64> {
        self.vector_to_world(p - self.origin_position)
    }

    /// World position -> engine position.
    pub fn position_to_engine(&self, p: Vector2<f64>) -> Vector2<f64> {
        self.vector_to_engine(p) + self.origin_position
    }

    // ========== Free vectors ==========

    /// Engine free vector (displacement, force) -> world.
    pub fn vector_to_world(&self, v: Vector2<f64>) -> Vector2<f64> {
        self.mirror(Rotation2::new(-self.origin_angle) * v)
    }

    /// World free vector -> engine.
    pub fn vector_to_engine(&self, v: Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(self.origin_angle) * self.mirror(v)
    }

    // ========== Velocities (per step <-> per second) ==========

    /// Engine per-step velocity -> world per-second velocity.
    pub fn velocity_to_world(&self, v: Vector2<f64>) -> Vector2<f64> {
        self.vector_to_world(v) / self.time_scale
    }

    /// World per-second velocity -> engine per-step velocity.
    pub fn velocity_to_engine(&self, v: Vector2<f64>) -> Vector2<f64> {
        self.vector_to_engine(v) * self.time_scale
    }

    // ========== Angles ==========

    /// Engine body angle -> world angle (includes origin rotation).
    pub fn angle_to_world(&self, a: f64) -> f64 {
        self.rotation_sign() * (a - self.origin_angle)
    }

    /// World angle -> engine body angle.
    pub fn angle_to_engine(&self, a: f64) -> f64 {
        self.rotation_sign() * a + self.origin_angle
    }

    /// Engine per-step angular velocity -> world per-second rate.
    pub fn angular_rate_to_world(&self, w: f64) -> f64 {
        self.rotation_sign() * w / self.time_scale
    }

    /// World per-second angular rate -> engine per-step angular velocity.
    pub fn angular_rate_to_engine(&self, w: f64) -> f64 {
        self.rotation_sign() * w * self.time_scale
    }

    /// -1 when an odd number of axes is flipped, +1 otherwise.
    ///
    /// Y counts as flipped when `mirror_y` is false, so the flips are odd
    /// exactly when both flags agree.
    pub fn rotation_sign(&self) -> f64 {
        if self.mirror_x == self.mirror_y {
            -1.0
        } else {
            1.0
        }
    }

    fn mirror(&self, mut v: Vector2<f64>) -> Vector2<f64> {
        if self.mirror_x {
            v.x = -v.x;
        }
        if !self.mirror_y {
            v.y = -v.y;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_default_flips_y_only() {
        let t = TransformConfig::with_time_scale(0.1);
        let w = t.position_to_world(Vector2::new(3.0, 4.0));
        assert_relative_eq!(w.x, 3.0);
        assert_relative_eq!(w.y, -4.0);
    }

    #[test]
    fn test_origin_translation() {
        let t = TransformConfig::default().with_origin(Vector2::new(20.0, 500.0), 0.0);
        let w = t.position_to_world(Vector2::new(30.0, 480.0));
        assert_relative_eq!(w.x, 10.0);
        assert_relative_eq!(w.y, 20.0);
    }

    #[test]
    fn test_free_vectors_ignore_origin() {
        let t = TransformConfig::default().with_origin(Vector2::new(100.0, 100.0), 0.0);
        let v = t.vector_to_world(Vector2::new(1.0, 1.0));
        assert_relative_eq!(v.x, 1.0);
        assert_relative_eq!(v.y, -1.0);
    }

    #[test]
    fn test_velocity_timebase() {
        // 0.98 engine units per 0.1 s step = 9.8 units/s, Y flipped
        let t = TransformConfig::with_time_scale(0.1);
        let v = t.velocity_to_world(Vector2::new(0.0, 0.98));
        assert_relative_eq!(v.y, -9.8, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_origin() {
        // World X axis points along engine +Y
        let t = TransformConfig::default()
            .with_origin(Vector2::zeros(), FRAC_PI_2)
            .with_mirror(false, true);
        let w = t.vector_to_world(Vector2::new(0.0, 1.0));
        assert_relative_eq!(w.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(w.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_sign_rule() {
        let base = TransformConfig::default();
        assert_eq!(base.with_mirror(false, false).rotation_sign(), -1.0);
        assert_eq!(base.with_mirror(true, true).rotation_sign(), -1.0);
        assert_eq!(base.with_mirror(true, false).rotation_sign(), 1.0);
        assert_eq!(base.with_mirror(false, true).rotation_sign(), 1.0);
    }

    #[test]
    fn test_angular_rate_scaling() {
        let t = TransformConfig::with_time_scale(0.02);
        assert_relative_eq!(t.angular_rate_to_world(0.01), -0.5, epsilon = 1e-12);
        assert_relative_eq!(t.angular_rate_to_engine(-0.5), 0.01, epsilon = 1e-12);
    }

    fn any_config() -> impl Strategy<Value = TransformConfig> {
        (
            -1e3..1e3f64,
            -1e3..1e3f64,
            -10.0..10.0f64,
            any::<bool>(),
            any::<bool>(),
            1e-3..1.0f64,
        )
            .prop_map(|(ox, oy, angle, mx, my, ts)| {
                TransformConfig::with_time_scale(ts)
                    .with_origin(Vector2::new(ox, oy), angle)
                    .with_mirror(mx, my)
            })
    }

    proptest! {
        #[test]
        fn prop_position_round_trip(t in any_config(), x in -1e4..1e4f64, y in -1e4..1e4f64) {
            let p = Vector2::new(x, y);
            let back = t.position_to_engine(t.position_to_world(p));
            prop_assert!((back - p).norm() < 1e-6);
            let back = t.position_to_world(t.position_to_engine(p));
            prop_assert!((back - p).norm() < 1e-6);
        }

        #[test]
        fn prop_vector_round_trip(t in any_config(), x in -1e4..1e4f64, y in -1e4..1e4f64) {
            let v = Vector2::new(x, y);
            prop_assert!((t.vector_to_engine(t.vector_to_world(v)) - v).norm() < 1e-6);
            prop_assert!((t.velocity_to_engine(t.velocity_to_world(v)) - v).norm() < 1e-6);
        }

        #[test]
        fn prop_angle_round_trip(t in any_config(), a in -20.0..20.0f64) {
            prop_assert!((t.angle_to_engine(t.angle_to_world(a)) - a).abs() < 1e-9);
            prop_assert!((t.angular_rate_to_engine(t.angular_rate_to_world(a)) - a).abs() < 1e-9);
        }

        #[test]
        fn prop_vectors_keep_length(t in any_config(), x in -1e3..1e3f64, y in -1e3..1e3f64) {
            let v = Vector2::new(x, y);
            prop_assert!((t.vector_to_world(v).norm() - v.norm()).abs() < 1e-6);
        }
    }
}
