//! Graph Data Synchronizer
//!
//! Each chart follows one tracked object and holds one labeled series per
//! enabled quantity. Charts grow by one point per series per recorded frame,
//! shrink in lockstep with the recorder when history is truncated, and are
//! replayed from frame 0 whenever their quantity set or the world frame
//! changes (a new series has no backlog to extend).

use crate::config::{AngleUnit, DisplayConfig};
use crate::derived::{DerivedPoint, HistoryView, Quantity, QuantityGroup};
use crate::error::ReplayError;
use kinetrace_env::BodyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

pub type ChartId = usize;

/// One labeled series of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub quantity: Quantity,
    pub label: String,
    pub units: String,
    pub points: Vec<DerivedPoint>,
}

impl Series {
    fn new(quantity: Quantity, angle_unit: AngleUnit) -> Self {
        Self {
            quantity,
            label: quantity.label().to_string(),
            units: quantity.units(angle_unit).to_string(),
            points: Vec::new(),
        }
    }
}

/// Points appended to one chart for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBatch {
    pub chart: ChartId,
    pub object_id: BodyId,
    pub frame: usize,
    pub points: Vec<(Quantity, DerivedPoint)>,
}

/// Push interface for live chart consumers.
pub trait PointObserver {
    /// Called once per chart for every newly recorded frame.
    fn on_batch(&mut self, batch: &PointBatch);
}

/// A chart subscribed to one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chart {
    pub id: ChartId,
    pub object_id: BodyId,
    quantities: BTreeSet<Quantity>,

    /// Frame of the first point in every series
    first_frame: usize,

    series: Vec<Series>,

    /// Time marker shown while scrubbing
    cursor_time: Option<f64>,
}

impl Chart {
    fn new(id: ChartId, object_id: BodyId, quantities: BTreeSet<Quantity>, angle_unit: AngleUnit) -> Self {
        let mut chart = Self {
            id,
            object_id,
            quantities,
            first_frame: 0,
            series: Vec::new(),
            cursor_time: None,
        };
        chart.reset_series(angle_unit);
        chart
    }

    /// Enabled quantities, in series order.
    pub fn quantities(&self) -> &BTreeSet<Quantity> {
        &self.quantities
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn series_for(&self, quantity: Quantity) -> Option<&Series> {
        self.series.iter().find(|s| s.quantity == quantity)
    }

    /// Points per series (all series have the same length).
    pub fn len(&self) -> usize {
        self.series.first().map_or(0, |s| s.points.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_frame(&self) -> usize {
        self.first_frame
    }

    pub fn cursor_time(&self) -> Option<f64> {
        self.cursor_time
    }

    /// Points of every series at a frame (tooltip while scrubbing).
    pub fn points_at(&self, frame: usize) -> Vec<(Quantity, DerivedPoint)> {
        let Some(index) = frame.checked_sub(self.first_frame) else {
            return Vec::new();
        };
        self.series
            .iter()
            .filter_map(|s| s.points.get(index).map(|p| (s.quantity, *p)))
            .collect()
    }

    /// Y axis title built from the enabled quantity groups.
    pub fn axis_title(&self, angle_unit: AngleUnit) -> String {
        let groups: BTreeSet<QuantityGroup> = self.quantities.iter().map(Quantity::group).collect();
        groups
            .iter()
            .map(|g| g.title(angle_unit))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn reset_series(&mut self, angle_unit: AngleUnit) {
        self.series = self
            .quantities
            .iter()
            .map(|q| Series::new(*q, angle_unit))
            .collect();
        self.first_frame = 0;
    }

    /// Appends this frame's points. Frames that would break index alignment
    /// with the recorder are skipped.
    fn append(&mut self, frame: usize, view: &HistoryView<'_>) -> Option<PointBatch> {
        if self.is_empty() {
            self.first_frame = frame;
        } else if frame != self.first_frame + self.len() {
            debug!(
                "Chart {} expected frame {}, got {}",
                self.id,
                self.first_frame + self.len(),
                frame
            );
            return None;
        }

        let kinematics = match view.kinematics(self.object_id, frame) {
            Ok(k) => k,
            Err(e) => {
                debug!("Chart {} skipping frame {}: {}", self.id, frame, e);
                return None;
            }
        };

        let mut points = Vec::with_capacity(self.series.len());
        for series in &mut self.series {
            let point = kinematics.point(series.quantity, view.display);
            series.points.push(point);
            points.push((series.quantity, point));
        }

        Some(PointBatch {
            chart: self.id,
            object_id: self.object_id,
            frame,
            points,
        })
    }

    fn truncate(&mut self, frame: usize) {
        let keep = frame.saturating_sub(self.first_frame);
        for series in &mut self.series {
            series.points.truncate(keep);
        }
    }

    /// Replays the whole recorded history of the object.
    fn rebuild(&mut self, view: &HistoryView<'_>) {
        self.reset_series(view.display.angle_unit);

        let Some(history) = view.recorder.series(self.object_id) else {
            return;
        };
        for frame in history.first_frame()..history.end_frame() {
            self.append(frame, view);
        }
    }
}

/// All active charts plus their push subscribers.
#[derive(Default)]
pub struct GraphSync {
    charts: Vec<Chart>,
    next_id: ChartId,
    observers: Vec<Box<dyn PointObserver>>,
}

impl GraphSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default quantity set of a new chart.
    pub fn default_quantities() -> BTreeSet<Quantity> {
        [Quantity::X, Quantity::Y].into_iter().collect()
    }

    /// Registers a push subscriber.
    pub fn subscribe(&mut self, observer: Box<dyn PointObserver>) {
        self.observers.push(observer);
    }

    /// Opens a chart on an object and fills it from recorded history.
    pub fn add_chart(
        &mut self,
        object_id: BodyId,
        quantities: BTreeSet<Quantity>,
        view: &HistoryView<'_>,
    ) -> ChartId {
        let id = self.next_id;
        self.next_id += 1;

        let mut chart = Chart::new(id, object_id, quantities, view.display.angle_unit);
        chart.rebuild(view);
        self.charts.push(chart);
        id
    }

    pub fn remove_chart(&mut self, id: ChartId) -> Result<Chart, ReplayError> {
        let index = self
            .charts
            .iter()
            .position(|c| c.id == id)
            .ok_or(ReplayError::MissingChart(id))?;
        Ok(self.charts.remove(index))
    }

    /// Drops every chart following a deleted object.
    pub fn remove_charts_for(&mut self, object_id: BodyId) -> usize {
        let before = self.charts.len();
        self.charts.retain(|c| c.object_id != object_id);
        before - self.charts.len()
    }

    pub fn chart(&self, id: ChartId) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// Enables or disables one quantity and replays the chart's history.
    pub fn set_quantity(
        &mut self,
        id: ChartId,
        quantity: Quantity,
        enabled: bool,
        view: &HistoryView<'_>,
    ) -> Result<(), ReplayError> {
        let chart = self
            .charts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ReplayError::MissingChart(id))?;

        let changed = if enabled {
            chart.quantities.insert(quantity)
        } else {
            chart.quantities.remove(&quantity)
        };
        if changed {
            chart.rebuild(view);
        }
        Ok(())
    }

    /// Appends one point per enabled series of every chart for a new frame.
    pub fn on_frame(&mut self, frame: usize, view: &HistoryView<'_>) {
        for chart in &mut self.charts {
            if let Some(batch) = chart.append(frame, view) {
                for observer in &mut self.observers {
                    observer.on_batch(&batch);
                }
            }
        }
    }

    /// Truncates every series of every chart to end before `frame`.
    pub fn truncate(&mut self, frame: usize) {
        for chart in &mut self.charts {
            chart.truncate(frame);
        }
    }

    /// Empties every chart, keeping subscriptions and quantity sets.
    pub fn clear(&mut self, angle_unit: AngleUnit) {
        for chart in &mut self.charts {
            chart.reset_series(angle_unit);
            chart.cursor_time = None;
        }
    }

    /// Replays every chart, e.g. after the world frame changed.
    pub fn rebuild_all(&mut self, view: &HistoryView<'_>) {
        for chart in &mut self.charts {
            chart.rebuild(view);
        }
    }

    /// Moves the scrub marker of every chart.
    pub fn mark_cursor(&mut self, time: f64, display: &DisplayConfig) {
        let time = display.round(time);
        for chart in &mut self.charts {
            chart.cursor_time = Some(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initial_state::InitialStateRegistry;
    use crate::recorder::{FrameRecorder, Snapshot};
    use crate::transform::TransformConfig;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DT: f64 = 0.1;

    /// Object 1 moving +1 engine unit per step along X.
    fn history(frames: usize) -> FrameRecorder {
        let mut recorder = FrameRecorder::new();
        recorder.register(BodyId(1), 0);
        for f in 0..frames {
            recorder.record(snapshot(f));
        }
        recorder
    }

    fn snapshot(frame: usize) -> Snapshot {
        Snapshot {
            id: BodyId(1),
            frame,
            time: frame as f64 * DT,
            position: Vector2::new(frame as f64, 0.0),
            velocity: Vector2::new(1.0, 0.0),
            angle: 0.0,
            angular_velocity: 0.0,
            outline: vec![],
            mass: 1.0,
        }
    }

    struct Fixture {
        recorder: FrameRecorder,
        registry: InitialStateRegistry,
        transform: TransformConfig,
        display: DisplayConfig,
    }

    impl Fixture {
        fn new(frames: usize) -> Self {
            Self {
                recorder: history(frames),
                registry: InitialStateRegistry::new(),
                transform: TransformConfig::with_time_scale(DT),
                display: DisplayConfig::default(),
            }
        }

        fn view(&self) -> HistoryView<'_> {
            HistoryView {
                recorder: &self.recorder,
                registry: &self.registry,
                transform: &self.transform,
                display: &self.display,
            }
        }
    }

    struct Collector(Rc<RefCell<Vec<PointBatch>>>);

    impl PointObserver for Collector {
        fn on_batch(&mut self, batch: &PointBatch) {
            self.0.borrow_mut().push(batch.clone());
        }
    }

    #[test]
    fn test_new_chart_replays_history() {
        let fx = Fixture::new(5);
        let mut graphs = GraphSync::new();
        let id = graphs.add_chart(BodyId(1), GraphSync::default_quantities(), &fx.view());

        let chart = graphs.chart(id).unwrap();
        assert_eq!(chart.series().len(), 2);
        assert_eq!(chart.len(), 5);
        let x = chart.series_for(Quantity::X).unwrap();
        assert_relative_eq!(x.points[4].value, 4.0);
        assert_relative_eq!(x.points[4].time, 0.4);
    }

    #[test]
    fn test_on_frame_appends_and_notifies() {
        let mut fx = Fixture::new(3);
        let mut graphs = GraphSync::new();
        let batches = Rc::new(RefCell::new(Vec::new()));
        graphs.subscribe(Box::new(Collector(batches.clone())));

        let quantities: BTreeSet<Quantity> = [Quantity::Vx, Quantity::Ax].into_iter().collect();
        let id = graphs.add_chart(BodyId(1), quantities, &fx.view());

        fx.recorder.record(snapshot(3));
        graphs.on_frame(3, &fx.view());

        assert_eq!(graphs.chart(id).unwrap().len(), 4);
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].frame, 3);
        assert_eq!(batches[0].points.len(), 2);
        assert_relative_eq!(batches[0].points[0].1.value, 10.0);
        assert_relative_eq!(batches[0].points[1].1.value, 0.0);
    }

    #[test]
    fn test_misaligned_frame_skipped() {
        let fx = Fixture::new(4);
        let mut graphs = GraphSync::new();
        let id = graphs.add_chart(BodyId(1), GraphSync::default_quantities(), &fx.view());

        graphs.on_frame(2, &fx.view());
        assert_eq!(graphs.chart(id).unwrap().len(), 4);
    }

    #[test]
    fn test_truncate_all_series() {
        let fx = Fixture::new(10);
        let mut graphs = GraphSync::new();
        let a = graphs.add_chart(BodyId(1), GraphSync::default_quantities(), &fx.view());
        let b = graphs.add_chart(BodyId(1), [Quantity::Speed].into_iter().collect(), &fx.view());

        graphs.truncate(6);
        assert_eq!(graphs.chart(a).unwrap().len(), 6);
        assert_eq!(graphs.chart(b).unwrap().len(), 6);
        assert!(graphs.chart(a).unwrap().points_at(6).is_empty());
        assert_eq!(graphs.chart(a).unwrap().points_at(5).len(), 2);
    }

    #[test]
    fn test_toggle_quantity_rebuilds_backlog() {
        let fx = Fixture::new(6);
        let mut graphs = GraphSync::new();
        let id = graphs.add_chart(BodyId(1), GraphSync::default_quantities(), &fx.view());

        graphs.set_quantity(id, Quantity::Vx, true, &fx.view()).unwrap();
        let chart = graphs.chart(id).unwrap();
        assert_eq!(chart.series().len(), 3);
        assert_eq!(chart.series_for(Quantity::Vx).unwrap().points.len(), 6);

        graphs.set_quantity(id, Quantity::X, false, &fx.view()).unwrap();
        assert!(graphs.chart(id).unwrap().series_for(Quantity::X).is_none());

        assert!(matches!(
            graphs.set_quantity(99, Quantity::X, true, &fx.view()),
            Err(ReplayError::MissingChart(99))
        ));
    }

    #[test]
    fn test_axis_title_and_removal() {
        let fx = Fixture::new(1);
        let mut graphs = GraphSync::new();
        let quantities: BTreeSet<Quantity> =
            [Quantity::Vy, Quantity::X, Quantity::Omega].into_iter().collect();
        let id = graphs.add_chart(BodyId(1), quantities, &fx.view());

        assert_eq!(
            graphs.chart(id).unwrap().axis_title(AngleUnit::Degrees),
            "Position (m) Velocity (m/s) Angular Velocity (deg/s)"
        );

        assert_eq!(graphs.remove_charts_for(BodyId(1)), 1);
        assert!(graphs.charts().is_empty());
        assert!(graphs.remove_chart(id).is_err());
    }

    #[test]
    fn test_clear_and_cursor_marker() {
        let fx = Fixture::new(4);
        let mut graphs = GraphSync::new();
        let id = graphs.add_chart(BodyId(1), GraphSync::default_quantities(), &fx.view());

        graphs.mark_cursor(0.30000001, &fx.display);
        assert_eq!(graphs.chart(id).unwrap().cursor_time(), Some(0.3));

        graphs.clear(AngleUnit::Degrees);
        let chart = graphs.chart(id).unwrap();
        assert!(chart.is_empty());
        assert_eq!(chart.cursor_time(), None);
        assert_eq!(chart.quantities().len(), 2);
    }
}
