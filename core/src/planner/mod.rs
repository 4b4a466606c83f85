//! Support point planning along a straight span.
//!
//! Produces normalized positions in `[0, 1]`. Two boundary points always sit
//! `edge_offset` in from each end, except when the span is too short for two
//! supports, in which case a single support goes at the midpoint. An offset
//! that would put a boundary point off the span is rejected.
//!
//! With [`PointOrdering::Legacy`] (the default) a subdivided span lists its
//! interior points first and the two boundary points last, so the sequence is
//! not monotonic. Consumers that care about order should ask for
//! [`PointOrdering::Sorted`].

use crate::geometry::{Centerline, Point3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanError {
    /// Zero spacing means no placement is required for this pipe.
    #[error("Empty request: target spacing is zero")]
    EmptyRequest,

    #[error("Invalid span length: {0}")]
    InvalidSpan(f64),

    #[error("Invalid target spacing: {0}")]
    InvalidSpacing(f64),

    /// Boundary supports would fall outside the span.
    #[error("Edge offset {offset} does not fit a span of {span}")]
    InvalidOffset { offset: f64, span: f64 },
}

/// All lengths in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub span_length: f64,
    pub edge_offset: f64,
    pub min_spacing: f64,
    pub target_spacing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOrdering {
    /// Interior points, then start boundary, then end boundary.
    #[default]
    Legacy,
    /// Ascending by ratio.
    Sorted,
}

/// Which branch of the planner produced the points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCase {
    /// Span shorter than one spacing and too short for two end supports.
    SingleCenter,
    /// Span shorter than one spacing, two end supports.
    BoundaryPair,
    /// Span at least one spacing long.
    Subdivided { splits: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementPlan {
    pub case: PlanCase,
    pub ratios: Vec<f64>,
}

/// A planned ratio resolved against the pipe's centerline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementPoint {
    pub ratio: f64,
    pub position: Point3,
}

impl PlacementPlan {
    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn ordered(mut self, ordering: PointOrdering) -> Self {
        if ordering == PointOrdering::Sorted {
            self.ratios.sort_by(|a, b| a.total_cmp(b));
        }
        self
    }

    /// Evaluate every ratio on the centerline, keeping plan order.
    pub fn points(&self, centerline: &Centerline) -> Vec<PlacementPoint> {
        self.ratios
            .iter()
            .filter_map(|&ratio| {
                centerline
                    .evaluate(ratio)
                    .map(|position| PlacementPoint { ratio, position })
            })
            .collect()
    }
}

/// Stateless planner; the only knob is the output ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementPlanner {
    pub ordering: PointOrdering,
}

impl PlacementPlanner {
    pub fn new(ordering: PointOrdering) -> Self {
        Self { ordering }
    }

    pub fn plan(&self, request: &PlacementRequest) -> Result<PlacementPlan, PlanError> {
        plan(request).map(|p| p.ordered(self.ordering))
    }
}

/// Plan support ratios in legacy order.
pub fn plan(request: &PlacementRequest) -> Result<PlacementPlan, PlanError> {
    let PlacementRequest {
        span_length: length,
        edge_offset: offset,
        min_spacing,
        target_spacing: spacing,
    } = *request;

    if spacing == 0.0 {
        return Err(PlanError::EmptyRequest);
    }
    if !spacing.is_finite() || spacing < 0.0 {
        return Err(PlanError::InvalidSpacing(spacing));
    }
    if !length.is_finite() || length <= 0.0 {
        return Err(PlanError::InvalidSpan(length));
    }

    let start_ratio = offset / length;
    let end_ratio = (length - offset) / length;
    let offset_fits = offset.is_finite() && (0.0..=length).contains(&offset);

    if length < spacing && (length - 2.0 * offset) < min_spacing {
        return Ok(PlacementPlan {
            case: PlanCase::SingleCenter,
            ratios: vec![0.5],
        });
    }
    if !offset_fits {
        return Err(PlanError::InvalidOffset { offset, span: length });
    }

    if length < spacing {
        return Ok(PlacementPlan {
            case: PlanCase::BoundaryPair,
            ratios: vec![start_ratio, end_ratio],
        });
    }

    let splits = (length / spacing).floor() as usize;
    let step = 1.0 / (splits + 1) as f64;

    // Multiply rather than accumulate so float drift never adds a point at ~1.0
    let mut ratios: Vec<f64> = (1..=splits).map(|k| k as f64 * step).collect();
    ratios.push(start_ratio);
    ratios.push(end_ratio);

    Ok(PlacementPlan {
        case: PlanCase::Subdivided { splits },
        ratios,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ApproxEq, LinearSpan};

    fn request(span_length: f64, edge_offset: f64, min_spacing: f64, target_spacing: f64) -> PlacementRequest {
        PlacementRequest {
            span_length,
            edge_offset,
            min_spacing,
            target_spacing,
        }
    }

    fn assert_ratios(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "ratios {:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.approx_eq(e), "ratio {} != {}", a, e);
        }
    }

    #[test]
    fn test_zero_spacing_is_empty_request() {
        for (len, off, min) in [(10000.0, 150.0, 500.0), (0.0, 0.0, 0.0), (-5.0, 1e9, -1.0)] {
            assert_eq!(plan(&request(len, off, min, 0.0)), Err(PlanError::EmptyRequest));
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(plan(&request(0.0, 150.0, 500.0, 3000.0)), Err(PlanError::InvalidSpan(0.0)));
        assert_eq!(
            plan(&request(1000.0, 150.0, 500.0, -3000.0)),
            Err(PlanError::InvalidSpacing(-3000.0))
        );
    }

    #[test]
    fn test_offset_longer_than_span() {
        // Spacing below the span puts boundary ratios at 1.25 and -0.25
        assert_eq!(
            plan(&request(120.0, 150.0, 500.0, 100.0)),
            Err(PlanError::InvalidOffset { offset: 150.0, span: 120.0 })
        );
        // Short span with a negative minimum spacing would reach the pair branch
        assert_eq!(
            plan(&request(200.0, 300.0, -1000.0, 3000.0)),
            Err(PlanError::InvalidOffset { offset: 300.0, span: 200.0 })
        );
        assert!(matches!(
            plan(&request(2000.0, -10.0, 500.0, 3000.0)),
            Err(PlanError::InvalidOffset { .. })
        ));
        // Still fine when the short span collapses to the midpoint
        assert_eq!(plan(&request(120.0, 150.0, 500.0, 3000.0)).unwrap().ratios, vec![0.5]);
    }

    #[test]
    fn test_boundary_ratios_stay_on_span() {
        for &(len, off, spacing) in &[(1000.0, 1000.0, 300.0), (1000.0, 0.0, 300.0), (5000.0, 2600.0, 1000.0)] {
            let p = plan(&request(len, off, 500.0, spacing)).unwrap();
            assert!(p.ratios.iter().all(|r| (0.0..=1.0).contains(r)), "{:?}", p.ratios);
        }
    }

    #[test]
    fn test_short_span_two_boundary_points() {
        // 2000 - 2*150 = 1700 >= 500
        let p = plan(&request(2000.0, 150.0, 500.0, 3000.0)).unwrap();
        assert_eq!(p.case, PlanCase::BoundaryPair);
        assert_ratios(&p.ratios, &[150.0 / 2000.0, 1.0 - 150.0 / 2000.0]);
    }

    #[test]
    fn test_short_span_collapses_to_center() {
        // 700 - 2*150 = 400 < 500
        let p = plan(&request(700.0, 150.0, 500.0, 3000.0)).unwrap();
        assert_eq!(p.case, PlanCase::SingleCenter);
        assert_ratios(&p.ratios, &[0.5]);
    }

    #[test]
    fn test_exact_min_spacing_keeps_two_points() {
        // 800 - 2*150 = 500, not strictly less than 500
        let p = plan(&request(800.0, 150.0, 500.0, 3000.0)).unwrap();
        assert_eq!(p.case, PlanCase::BoundaryPair);
    }

    #[test]
    fn test_short_span_properties() {
        for &len in &[600.0, 900.0, 1500.0, 2999.0] {
            for &off in &[0.0, 100.0, 250.0] {
                let p = plan(&request(len, off, 500.0, 3000.0)).unwrap();
                if len - 2.0 * off >= 500.0 {
                    assert_ratios(&p.ratios, &[off / len, 1.0 - off / len]);
                } else {
                    assert_ratios(&p.ratios, &[0.5]);
                }
            }
        }
    }

    #[test]
    fn test_reference_scenario() {
        // 50mm pipe, 3000mm spacing, 10m run, 150mm offset
        let p = plan(&request(10000.0, 150.0, 500.0, 3000.0)).unwrap();
        assert_eq!(p.case, PlanCase::Subdivided { splits: 3 });
        assert_eq!(p.len(), 5);
        assert_ratios(&p.ratios, &[0.25, 0.5, 0.75, 0.015, 0.985]);
    }

    #[test]
    fn test_long_span_point_count() {
        for &(len, spacing) in &[(3000.0, 3000.0), (9000.0, 1000.0), (10000.0, 1000.0), (12345.0, 2100.0)] {
            let p = plan(&request(len, 150.0, 500.0, spacing)).unwrap();
            let splits = (len / spacing).floor() as usize;
            assert_eq!(p.len(), splits + 2, "len {} spacing {}", len, spacing);
            assert!(p.ratios.iter().all(|r| *r >= 0.0 && *r < 1.0));
        }
    }

    #[test]
    fn test_tenth_steps_do_not_drift() {
        // 1/10 accumulated ten times lands just below 1.0; must still be 9 interior points
        let p = plan(&request(9000.0, 150.0, 500.0, 1000.0)).unwrap();
        assert_eq!(p.case, PlanCase::Subdivided { splits: 9 });
        assert_eq!(p.len(), 11);
    }

    #[test]
    fn test_sorted_ordering_same_point_set() {
        let req = request(10000.0, 150.0, 500.0, 3000.0);
        let legacy = PlacementPlanner::new(PointOrdering::Legacy).plan(&req).unwrap();
        let sorted = PlacementPlanner::new(PointOrdering::Sorted).plan(&req).unwrap();

        assert_ratios(&sorted.ratios, &[0.015, 0.25, 0.5, 0.75, 0.985]);
        assert!(legacy.ratios.windows(2).any(|w| w[0] > w[1]));

        let mut resorted = legacy.ratios.clone();
        resorted.sort_by(|a, b| a.total_cmp(b));
        assert_ratios(&resorted, &sorted.ratios);
    }

    #[test]
    fn test_points_evaluated_on_span() {
        let span = LinearSpan::new(Point3::origin(), Point3::new(10000.0, 0.0, 0.0)).unwrap();
        let line = Centerline::Line(span);
        let p = plan(&request(10000.0, 150.0, 500.0, 3000.0)).unwrap();
        let pts = p.points(&line);
        assert_eq!(pts.len(), 5);
        assert!(pts[0].position.approx_eq(&Point3::new(2500.0, 0.0, 0.0)));
        assert!(pts[3].position.approx_eq(&Point3::new(150.0, 0.0, 0.0)));
        assert!(pts[4].position.approx_eq(&Point3::new(9850.0, 0.0, 0.0)));
    }
}
