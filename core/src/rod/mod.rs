//! Rod length resolution.
//!
//! A support hangs from the nearest structural element directly above it. The
//! geometry collaborator casts a ray up from the placement point and reports
//! every element it crosses, including the pipe the point sits in. Hits on
//! that pipe are discarded and the closest remaining hit is the rod length.

use crate::element::ElementId;
use crate::geometry::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod budget;
pub use budget::{CancelToken, Deadline, QueryBudget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOrigin {
    /// The pipe being processed.
    SelfElement,
    /// Anything else: slabs, beams, linked structural models.
    Structure,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Distance from the ray origin, in model units.
    pub proximity: f64,
    pub element: ElementId,
    pub origin: HitOrigin,
}

impl RayHit {
    pub fn structure(element: ElementId, proximity: f64) -> Self {
        Self {
            proximity,
            element,
            origin: HitOrigin::Structure,
        }
    }

    pub fn self_hit(element: ElementId, proximity: f64) -> Self {
        Self {
            proximity,
            element,
            origin: HitOrigin::SelfElement,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("Geometry query failed: {0}")]
    Failed(String),

    #[error("Geometry query timed out")]
    TimedOut,

    #[error("Geometry query cancelled")]
    Cancelled,
}

/// The external ray-intersection collaborator.
pub trait GeometryQuery: Send + Sync {
    /// Cast a ray from `origin` along `direction` and report every crossing.
    /// `subject` is the element the origin lies in; hits on it must be tagged
    /// [`HitOrigin::SelfElement`].
    fn cast_ray(
        &self,
        origin: &Point3,
        direction: &Vector3,
        subject: ElementId,
        deadline: &Deadline,
    ) -> Result<Vec<RayHit>, QueryError>;
}

/// Resolved rod length, or nothing found above the point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RodLength {
    Resolved(f64),
    Unresolved,
}

impl RodLength {
    pub fn as_option(&self) -> Option<f64> {
        match self {
            Self::Resolved(v) => Some(*v),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Reduce raw hits to the nearest structural distance.
pub fn resolve_hits(hits: &[RayHit]) -> RodLength {
    hits.iter()
        .filter(|h| h.origin == HitOrigin::Structure)
        .map(|h| h.proximity)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .min_by(|a, b| a.total_cmp(b))
        .map_or(RodLength::Unresolved, RodLength::Resolved)
}

#[derive(Debug, Clone, Copy)]
pub struct RodResolver {
    pub direction: Vector3,
}

impl Default for RodResolver {
    fn default() -> Self {
        Self {
            direction: Vector3::z(),
        }
    }
}

impl RodResolver {
    pub fn new(direction: Vector3) -> Self {
        Self { direction }
    }

    /// Query the collaborator and resolve. Any query failure is `Unresolved`.
    pub fn resolve<Q: GeometryQuery + ?Sized>(
        &self,
        query: &Q,
        point: &Point3,
        subject: ElementId,
        budget: &QueryBudget,
    ) -> RodLength {
        let deadline = budget.deadline();
        match query.cast_ray(point, &self.direction, subject, &deadline) {
            Ok(hits) => resolve_hits(&hits),
            Err(e) => {
                debug!("Ray query from {:?} gave no result: {}", point, e);
                RodLength::Unresolved
            }
        }
    }
}
