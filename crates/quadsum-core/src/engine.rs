//! The contract shared by both engines.

use serde::Serialize;
use tracing::debug;

use crate::timing::{Timeline, TimingEvent, TimingSummary};
use crate::{BoundingBox, Point, QuadsumError, Repetition, Result};

/// Deepest tree accepted. Keeps every cell and node index within `u32`.
pub const MAX_SUPPORTED_DEPTH: u32 = 15;

/// A validated build request: depth, bounding box and points.
#[derive(Debug, Clone, Copy)]
pub struct Workload<'a> {
    max_depth: u32,
    bbox: BoundingBox,
    points: &'a [Point],
}

impl<'a> Workload<'a> {
    /// Validate the request. Nothing is dispatched for a rejected workload.
    pub fn new(max_depth: u32, bbox: BoundingBox, points: &'a [Point]) -> Result<Self> {
        if max_depth < 1 {
            return Err(QuadsumError::invalid("max depth must be at least 1"));
        }
        if max_depth > MAX_SUPPORTED_DEPTH {
            return Err(QuadsumError::invalid(format!(
                "max depth {max_depth} exceeds the supported limit of {MAX_SUPPORTED_DEPTH}"
            )));
        }
        if !bbox.is_valid() {
            return Err(QuadsumError::invalid(format!(
                "bounding box must be finite with positive width and height, got {bbox:?}"
            )));
        }
        if points.is_empty() {
            return Err(QuadsumError::invalid("point set is empty"));
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(QuadsumError::invalid(format!(
                "point {index} has a non-finite component: {:?}",
                points[index]
            )));
        }
        Ok(Self {
            max_depth,
            bbox,
            points,
        })
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn points(&self) -> &'a [Point] {
        self.points
    }
}

/// A finished build together with the timing events of its measured runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput<T> {
    pub output: T,
    pub events: Vec<TimingEvent>,
    /// Number of runs whose events are included.
    pub measured_runs: usize,
}

impl<T> RunOutput<T> {
    /// Net and total kernel time averaged over the measured runs.
    pub fn summary(&self) -> TimingSummary {
        TimingSummary::from_events(&self.events).per_run(self.measured_runs)
    }
}

/// A summary engine.
pub trait Engine: Send + Sync {
    /// The finished structure handed back to the caller.
    type Output: Send;

    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Build the structure for `workload`, recording each phase on `timeline`.
    fn build(&self, workload: &Workload<'_>, timeline: &mut Timeline) -> Result<Self::Output>;

    /// Validate the inputs and build once.
    fn run(
        &self,
        max_depth: u32,
        bbox: BoundingBox,
        points: &[Point],
    ) -> Result<RunOutput<Self::Output>> {
        self.run_repeated(max_depth, bbox, points, Repetition::once())
    }

    /// Build `repetition.iterations` times from scratch on one timeline and
    /// keep the events of the runs after the warm-up. Returns the structure of
    /// the last run.
    fn run_repeated(
        &self,
        max_depth: u32,
        bbox: BoundingBox,
        points: &[Point],
        repetition: Repetition,
    ) -> Result<RunOutput<Self::Output>> {
        repetition.validate()?;
        let workload = Workload::new(max_depth, bbox, points)?;

        let mut timeline = Timeline::new();
        let mut output = None;
        for iteration in 0..repetition.iterations {
            if iteration == repetition.warmup {
                timeline.clear();
            }
            output = Some(self.build(&workload, &mut timeline)?);
            debug!(engine = self.name(), iteration, "Run complete");
        }

        let output = output.ok_or_else(|| QuadsumError::invalid("no run was executed"))?;
        Ok(RunOutput {
            output,
            events: timeline.into_events(),
            measured_runs: repetition.measured(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Point> {
        vec![Point::new(0.5, 0.5, 1.0)]
    }

    #[test]
    fn test_workload_accepts_valid_input() {
        let points = points();
        let workload = Workload::new(3, BoundingBox::unit(), &points).unwrap();
        assert_eq!(workload.max_depth(), 3);
        assert_eq!(workload.points().len(), 1);
    }

    #[test]
    fn test_workload_rejects_bad_depth() {
        let points = points();
        assert!(matches!(
            Workload::new(0, BoundingBox::unit(), &points),
            Err(QuadsumError::InvalidConfiguration { .. })
        ));
        assert!(Workload::new(MAX_SUPPORTED_DEPTH + 1, BoundingBox::unit(), &points).is_err());
    }

    #[test]
    fn test_workload_rejects_degenerate_box() {
        let points = points();
        let flat = BoundingBox::new(0.0, 0.0, 1.0, 0.0);
        assert!(Workload::new(2, flat, &points).is_err());
    }

    #[test]
    fn test_workload_rejects_empty_and_non_finite_points() {
        assert!(Workload::new(2, BoundingBox::unit(), &[]).is_err());
        let bad = [Point::new(0.1, f32::NAN, 1.0)];
        let err = Workload::new(2, BoundingBox::unit(), &bad).unwrap_err();
        assert!(err.to_string().contains("point 0"));
    }
}
