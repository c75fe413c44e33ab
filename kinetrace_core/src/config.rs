//! Replay and display configuration.

use serde::{Deserialize, Serialize};

/// Unit used when presenting angles and angular rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Converts a radian value into this unit.
    pub fn convert_radians(&self, radians: f64) -> f64 {
        match self {
            AngleUnit::Degrees => radians.to_degrees(),
            AngleUnit::Radians => radians,
        }
    }

    /// Unit suffix for angular position.
    pub fn angle_suffix(&self) -> &'static str {
        match self {
            AngleUnit::Degrees => "deg",
            AngleUnit::Radians => "rad",
        }
    }

    /// Unit suffix for angular rate.
    pub fn rate_suffix(&self) -> &'static str {
        match self {
            AngleUnit::Degrees => "deg/s",
            AngleUnit::Radians => "rad/s",
        }
    }
}

/// How derived values are presented to charts and overlays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Decimal places kept at display/graph-append time (default: 3)
    pub decimals: u32,

    /// Angle presentation unit (default: degrees)
    pub angle_unit: AngleUnit,

    /// Overlay trail draws every Nth recorded frame (default: 3)
    pub trail_stride: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            decimals: 3,
            angle_unit: AngleUnit::Degrees,
            trail_stride: 3,
        }
    }
}

impl DisplayConfig {
    /// Rounds to the configured number of decimals.
    pub fn round(&self, value: f64) -> f64 {
        round_to(value, self.decimals)
    }
}

/// Most decimal places an `f64` can meaningfully carry.
pub const MAX_DECIMALS: u32 = 15;

/// Rounds `value` to `decimals` places, capped at [`MAX_DECIMALS`].
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    (value * scale).round() / scale
}

/// Session-level replay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Scrubbing is a no-op below this many tracked objects (default: 2)
    pub min_scrub_objects: usize,

    /// Record fixed/background bodies as well (default: true)
    pub track_static_bodies: bool,

    /// Engine timestep in seconds (default: 1/60)
    pub step_seconds: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            min_scrub_objects: 2,
            track_static_bodies: true,
            step_seconds: 1.0 / 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_to_decimals() {
        assert_relative_eq!(round_to(9.80049, 3), 9.8, epsilon = 1e-12);
        assert_relative_eq!(round_to(-1.23456, 2), -1.23, epsilon = 1e-12);
        assert_relative_eq!(round_to(2.5, 0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_round_to_caps_huge_precision() {
        for decimals in [MAX_DECIMALS, 309, 400, u32::MAX] {
            let rounded = round_to(9.80049, decimals);
            assert!(rounded.is_finite(), "decimals {}", decimals);
            assert_relative_eq!(rounded, 9.80049, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_angle_unit_conversion() {
        assert_relative_eq!(
            AngleUnit::Degrees.convert_radians(std::f64::consts::PI),
            180.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(AngleUnit::Radians.convert_radians(1.5), 1.5);
        assert_eq!(AngleUnit::Degrees.rate_suffix(), "deg/s");
    }

    #[test]
    fn test_defaults() {
        let display = DisplayConfig::default();
        assert_eq!(display.decimals, 3);
        assert_eq!(display.trail_stride, 3);

        let replay = ReplayConfig::default();
        assert_eq!(replay.min_scrub_objects, 2);
        assert!(replay.track_static_bodies);
    }
}
