//! JSON exporter for replay visualization.
//!
//! Exports the recorded history in world space, rounded the way the charts
//! present it, plus scene save/load helpers.

use crate::engine::SimEngine;
use crate::error::SimError;

use kinetrace_core::{AngleUnit, Chart, Quantity, SceneDocument, Series, Session};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

/// One object at one frame, in world units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectFrame {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,

    /// Angle in the export's angle unit
    pub angle: f64,
    pub omega: f64,

    /// World-space outline vertices
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outline: Vec<[f64; 2]>,
}

/// A single recorded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub frame: usize,

    /// Simulation time in seconds
    pub time_sec: f64,

    pub objects: Vec<ObjectFrame>,
}

/// A chart and its series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartExport {
    pub id: usize,
    pub object_id: u64,
    pub title: String,
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_time: Option<f64>,
}

impl ChartExport {
    fn new(chart: &Chart, angle_unit: AngleUnit) -> Self {
        Self {
            id: chart.id,
            object_id: chart.object_id.as_u64(),
            title: chart.axis_title(angle_unit),
            series: chart.series().to_vec(),
            cursor_time: chart.cursor_time(),
        }
    }
}

/// Complete replay export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    pub angle_unit: AngleUnit,
    pub decimals: u32,

    /// All frames
    pub frames: Vec<ReplayFrame>,

    pub charts: Vec<ChartExport>,

    /// Final results
    pub passed: bool,

    /// Largest deviation seen by the scenario checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_error: Option<f64>,
}

impl ReplayExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            angle_unit: AngleUnit::default(),
            decimals: 3,
            frames: Vec::new(),
            charts: Vec::new(),
            passed: false,
            max_error: None,
        }
    }

    /// Fills frames and charts from a session's history.
    pub fn from_session(scenario: &str, seed: u64, session: &Session<SimEngine>) -> Result<Self, SimError> {
        let display = session.display();
        let transform = session.transform();
        let mut export = Self::new(scenario, seed);
        export.angle_unit = display.angle_unit;
        export.decimals = display.decimals;

        let ids: Vec<_> = session.recorder().object_ids().collect();
        for frame in 0..session.recorder().frame_count() {
            let mut objects = Vec::with_capacity(ids.len());
            let mut time_sec = None;

            for &id in &ids {
                let kinematics = match session.kinematics(id, frame) {
                    Ok(k) => k,
                    Err(e) if e.is_skippable() => continue,
                    Err(e) => return Err(e.into()),
                };
                time_sec.get_or_insert(display.round(kinematics.time));

                let outline = session
                    .snapshot_at(id, frame)?
                    .outline
                    .iter()
                    .map(|v| {
                        let w = transform.position_to_world(*v);
                        [display.round(w.x), display.round(w.y)]
                    })
                    .collect();

                objects.push(ObjectFrame {
                    id: id.as_u64(),
                    x: kinematics.display_value(Quantity::X, display),
                    y: kinematics.display_value(Quantity::Y, display),
                    vx: kinematics.display_value(Quantity::Vx, display),
                    vy: kinematics.display_value(Quantity::Vy, display),
                    angle: kinematics.display_value(Quantity::Theta, display),
                    omega: kinematics.display_value(Quantity::Omega, display),
                    outline,
                });
            }

            export.add_frame(ReplayFrame {
                frame,
                time_sec: time_sec.unwrap_or_default(),
                objects,
            });
        }

        export.charts = session
            .graphs()
            .charts()
            .iter()
            .map(|chart| ChartExport::new(chart, display.angle_unit))
            .collect();

        debug!(
            "Exported {} frames, {} charts",
            export.frames.len(),
            export.charts.len()
        );
        Ok(export)
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: ReplayFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, max_error: Option<f64>) {
        self.passed = passed;
        self.max_error = max_error;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Saves the session's scene document.
pub fn save_scene(session: &Session<SimEngine>, path: &str) -> Result<(), SimError> {
    let json = session.to_document().to_json()?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    info!("Scene saved to {}", path);
    Ok(())
}

/// Loads a scene document onto the session's bodies. Returns the number of
/// bodies restored.
pub fn load_scene(session: &mut Session<SimEngine>, path: &str) -> Result<usize, SimError> {
    let text = std::fs::read_to_string(path)?;
    let document = SceneDocument::from_json(&text)?;
    let restored = session.apply_document(&document)?;
    info!("Scene loaded from {} ({} bodies)", path, restored);
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;
    use kinetrace_env::PhysicsEngine;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("kinetrace_{}_{}.json", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_export_from_free_fall() {
        let runner = ScenarioRunner::new(42).with_timestep(0.1).with_duration(1.5);
        let (result, world) = runner.run_world(ScenarioId::FreeFall).unwrap();

        let mut export = ReplayExport::from_session("free_fall", 42, world.session()).unwrap();
        export.finalize(result.passed, Some(result.metrics.max_error));

        assert_eq!(export.frames.len(), 15);
        assert_eq!(export.charts.len(), 1);
        assert_eq!(export.duration_sec, 1.4);

        // Ground and ball
        let last = export.frames.last().unwrap();
        assert_eq!(last.objects.len(), 2);
        let ball = last
            .objects
            .iter()
            .find(|o| o.vy != 0.0)
            .expect("falling object");
        assert_eq!(ball.vy, -13.72);
        assert!(!ball.outline.is_empty());

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["scenario"], "free_fall");
        assert_eq!(json["angle_unit"], "degrees");
    }

    #[test]
    fn test_write_to_file() {
        let export = ReplayExport::new("empty", 1);
        let path = temp_path("export");
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: ReplayExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.scenario, "empty");
        assert!(back.frames.is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_scene_save_and_load() {
        let runner = ScenarioRunner::new(3);
        let (_, world) = runner.run_world(ScenarioId::Projectile).unwrap();
        let path = temp_path("scene");
        save_scene(world.session(), &path).unwrap();

        let config = world.config.clone();
        let scene = ScenarioId::Projectile.build(&config).unwrap();
        let mut fresh = crate::SimWorld::new(config, scene.engine).unwrap();
        let restored = load_scene(fresh.session_mut(), &path).unwrap();

        assert_eq!(restored, 2);
        let ids = fresh.engine().body_ids();
        for id in ids {
            assert_eq!(
                fresh.engine().sample(id).unwrap().kinematic_state(),
                world.engine().sample(id).unwrap().kinematic_state()
            );
        }
        assert_eq!(fresh.session().graphs().charts().len(), 1);

        // The launch velocity came back as an initial state
        fresh.session_mut().reset().unwrap();
        let launched = world.session().registry().get(scene.subject).unwrap().velocity;
        assert_eq!(
            fresh.engine().sample(scene.subject).unwrap().velocity,
            launched
        );
        assert_ne!(launched, nalgebra::Vector2::zeros());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut world = crate::SimWorld::new(
            Default::default(),
            ScenarioId::FreeFall.build(&Default::default()).unwrap().engine,
        )
        .unwrap();
        assert!(matches!(
            load_scene(world.session_mut(), "/nonexistent/kinetrace.json"),
            Err(SimError::Io(_))
        ));
    }
}
