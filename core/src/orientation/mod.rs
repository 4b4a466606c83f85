//! Support orientation.
//!
//! A support family is modelled with its run direction along local Y. To align
//! it with a straight pipe it is rotated about a vertical axis through the
//! placement point. The angle comes from the horizontal projection of the pipe
//! (slope is ignored) and is then corrected by quadrant, comparing the raw
//! endpoint coordinates:
//!
//! | start.y vs end.y | start.x vs end.x | angle         |
//! |------------------|------------------|---------------|
//! | greater or less  | greater          | π + yAngle    |
//! | greater or less  | less             | 2π − yAngle   |
//! | equal            | any              | yAngle        |
//! | greater or less  | equal            | not applicable|

use crate::geometry::{Centerline, Line3, Point3, Vector3, EPSILON};
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::PI;
use thiserror::Error;

#[cfg(test)]
mod tests_quadrants;

/// Why no rotation could be computed. The support is then left in its
/// default orientation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotApplicable {
    #[error("centerline is not a straight line")]
    CurvedCenterline,

    #[error("segment has no horizontal extent")]
    NoHorizontalExtent,

    #[error("endpoints differ in Y but share X")]
    UnhandledQuadrant,
}

/// Rotation about `axis` (always vertical) by `angle` radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub angle: f64,
    pub axis: Line3,
}

impl Orientation {
    pub fn about_vertical(at: Point3, angle: f64) -> Self {
        Self {
            angle,
            axis: Line3::vertical(at),
        }
    }

    /// Apply the rotation to a direction vector.
    pub fn rotate(&self, v: &Vector3) -> Vector3 {
        let axis = na::Unit::new_normalize(self.axis.direction);
        let rotation = na::Rotation3::from_axis_angle(&axis, self.angle);
        rotation * *v
    }
}

/// Angle between `default_axis` and the segment flattened onto the start
/// elevation. In `[0, π]`. None when the segment is vertical or empty.
pub fn y_angle(start: &Point3, end: &Point3, default_axis: &Vector3) -> Option<f64> {
    let flattened = Point3::new(end.x, end.y, start.z) - start;
    if flattened.norm() < EPSILON {
        return None;
    }
    Some(default_axis.angle(&flattened))
}

/// Rotation angle aligning `default_axis` with the segment.
pub fn solve(start: &Point3, end: &Point3, default_axis: &Vector3) -> Result<f64, NotApplicable> {
    let y_angle = y_angle(start, end, default_axis).ok_or(NotApplicable::NoHorizontalExtent)?;

    match (start.y.partial_cmp(&end.y), start.x.partial_cmp(&end.x)) {
        (Some(Ordering::Equal), _) => Ok(y_angle),
        (Some(_), Some(Ordering::Greater)) => Ok(PI + y_angle),
        (Some(_), Some(Ordering::Less)) => Ok(2.0 * PI - y_angle),
        _ => Err(NotApplicable::UnhandledQuadrant),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrientationSolver {
    pub default_axis: Vector3,
}

impl Default for OrientationSolver {
    fn default() -> Self {
        Self {
            default_axis: Vector3::y(),
        }
    }
}

impl OrientationSolver {
    pub fn solve(&self, start: &Point3, end: &Point3) -> Result<f64, NotApplicable> {
        solve(start, end, &self.default_axis)
    }

    /// Orientation for a support placed at `at` on the given centerline.
    pub fn orient(&self, centerline: &Centerline, at: Point3) -> Result<Orientation, NotApplicable> {
        let line = centerline.as_line().ok_or(NotApplicable::CurvedCenterline)?;
        let angle = self.solve(&line.start(), &line.end())?;
        Ok(Orientation::about_vertical(at, angle))
    }
}
