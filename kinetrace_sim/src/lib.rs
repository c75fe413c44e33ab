//! kinetrace Simulation Driver
//!
//! Runs the replay core against a small reference rigid-body engine and
//! checks the replayed kinematics against closed-form motion.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      SimWorld                        │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ Session (recorder, cursor, registry, charts)   │  │
//! │  └───────────────┬────────────────────────────────┘  │
//! │                  │ PhysicsEngine                     │
//! │  ┌───────────────▼────────────────────────────────┐  │
//! │  │ SimEngine (bodies, forces, springs, gravity)   │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use kinetrace_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_duration(2.0)
//!     .run(ScenarioId::FreeFall);
//! assert!(result.passed);
//! ```

mod engine;
mod error;
mod exporter;
mod runner;
mod world;
pub mod scenarios;

pub use engine::{rectangle, regular_polygon, AppliedForce, SimBody, SimEngine, SpringLink};
pub use error::SimError;
pub use exporter::{load_scene, save_scene, ChartExport, ObjectFrame, ReplayExport, ReplayFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld, MIN_TICKS};
