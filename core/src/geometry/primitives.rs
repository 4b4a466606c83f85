use super::{round_to, Point3, Vector3, EPSILON};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Degenerate span: start and end coincide")]
    DegenerateSpan,

    #[error("Polyline needs at least two distinct points, got {0}")]
    ShortPolyline(usize),
}

/// An infinite line through `origin`. Used as a rotation axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3 {
    pub origin: Point3,
    pub direction: Vector3,
}

impl Line3 {
    pub fn new(origin: Point3, direction: Vector3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Vertical line through `origin`.
    pub fn vertical(origin: Point3) -> Self {
        Self::new(origin, Vector3::z())
    }
}

/// A ray defined by an origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vector3,
}

impl Ray {
    pub fn new(origin: Point3, direction: Vector3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    /// Box spanning the two corners in any order.
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Box enclosing a straight pipe of the given outer radius.
    pub fn around_segment(start: &Point3, end: &Point3, radius: f64) -> Self {
        let r = Vector3::new(radius, radius, radius);
        let b = Self::new(*start, *end);
        Self {
            min: b.min - r,
            max: b.max + r,
        }
    }
}

/// A straight pipe segment. Always has a positive length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[Point3; 2]", into = "[Point3; 2]")]
pub struct LinearSpan {
    start: Point3,
    end: Point3,
}

impl LinearSpan {
    pub fn new(start: Point3, end: Point3) -> Result<Self, GeometryError> {
        if (end - start).norm() < EPSILON {
            return Err(GeometryError::DegenerateSpan);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Point3 {
        self.start
    }

    pub fn end(&self) -> Point3 {
        self.end
    }

    /// Length in the model's own unit.
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Linear interpolation between the endpoints; `ratio` is normalized.
    pub fn evaluate(&self, ratio: f64) -> Point3 {
        self.start + (self.end - self.start) * ratio
    }

    /// True when both endpoints share an elevation at the given precision.
    pub fn is_level(&self, decimals: i32) -> bool {
        round_to(self.start.z, decimals) == round_to(self.end.z, decimals)
    }
}

impl TryFrom<[Point3; 2]> for LinearSpan {
    type Error = GeometryError;

    fn try_from(points: [Point3; 2]) -> Result<Self, Self::Error> {
        Self::new(points[0], points[1])
    }
}

impl From<LinearSpan> for [Point3; 2] {
    fn from(span: LinearSpan) -> Self {
        [span.start, span.end]
    }
}

/// Pipe centerline as delivered by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Centerline {
    Line(LinearSpan),
    /// Tessellated curved run. Evaluated by arc length.
    Polyline(Vec<Point3>),
}

impl Centerline {
    pub fn polyline(points: Vec<Point3>) -> Result<Self, GeometryError> {
        let count = points.len();
        let line = Self::Polyline(points);
        if line.length() < EPSILON {
            return Err(GeometryError::ShortPolyline(count));
        }
        Ok(line)
    }

    pub fn as_line(&self) -> Option<&LinearSpan> {
        match self {
            Self::Line(span) => Some(span),
            Self::Polyline(_) => None,
        }
    }

    pub fn endpoints(&self) -> Option<(Point3, Point3)> {
        match self {
            Self::Line(span) => Some((span.start(), span.end())),
            Self::Polyline(points) => Some((*points.first()?, *points.last()?)),
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            Self::Line(span) => span.length(),
            Self::Polyline(points) => points.windows(2).map(|w| (w[1] - w[0]).norm()).sum(),
        }
    }

    pub fn evaluate(&self, ratio: f64) -> Option<Point3> {
        match self {
            Self::Line(span) => Some(span.evaluate(ratio)),
            Self::Polyline(points) => {
                let total = self.length();
                if total < EPSILON {
                    return None;
                }
                let mut remaining = ratio.clamp(0.0, 1.0) * total;
                for w in points.windows(2) {
                    let seg = (w[1] - w[0]).norm();
                    if remaining <= seg && seg > 0.0 {
                        return Some(w[0] + (w[1] - w[0]) * (remaining / seg));
                    }
                    remaining -= seg;
                }
                points.last().copied()
            }
        }
    }

    /// Level check on the two outer endpoints.
    pub fn is_level(&self, decimals: i32) -> bool {
        match self.endpoints() {
            Some((a, b)) => round_to(a.z, decimals) == round_to(b.z, decimals),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ApproxEq;

    #[test]
    fn test_degenerate_span_rejected() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(LinearSpan::new(p, p), Err(GeometryError::DegenerateSpan));
    }

    #[test]
    fn test_span_evaluate() {
        let span = LinearSpan::new(Point3::origin(), Point3::new(10.0, 0.0, 0.0)).unwrap();
        assert!(span.length().approx_eq(&10.0));
        assert!(span.evaluate(0.25).approx_eq(&Point3::new(2.5, 0.0, 0.0)));
        assert!(span.evaluate(1.0).approx_eq(&span.end()));
    }

    #[test]
    fn test_span_level_rounding() {
        let span = LinearSpan::new(
            Point3::new(0.0, 0.0, 3.000_000_1),
            Point3::new(5.0, 0.0, 3.0),
        )
        .unwrap();
        assert!(span.is_level(5));

        let sloped = LinearSpan::new(Point3::new(0.0, 0.0, 3.0), Point3::new(5.0, 0.0, 3.1)).unwrap();
        assert!(!sloped.is_level(5));
    }

    #[test]
    fn test_polyline_arc_length_evaluate() {
        let line = Centerline::polyline(vec![
            Point3::origin(),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
        ])
        .unwrap();
        assert!(line.length().approx_eq(&8.0));
        assert!(line.evaluate(0.5).unwrap().approx_eq(&Point3::new(4.0, 0.0, 0.0)));
        assert!(line.evaluate(0.75).unwrap().approx_eq(&Point3::new(4.0, 2.0, 0.0)));
        assert!(line.as_line().is_none());
    }

    #[test]
    fn test_short_polyline_rejected() {
        let res = Centerline::polyline(vec![Point3::origin()]);
        assert_eq!(res, Err(GeometryError::ShortPolyline(1)));
    }

    #[test]
    fn test_aabb_corners_any_order() {
        let b = Aabb::new(Point3::new(2.0, 2.0, 2.0), Point3::origin());
        assert!(b.min.approx_eq(&Point3::origin()));
        assert!(b.max.approx_eq(&Point3::new(2.0, 2.0, 2.0)));
    }
}
