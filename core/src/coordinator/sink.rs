//! Placement sink: the collaborator that creates supports in the model.
//!
//! Parameters are exposed as typed capabilities rather than looked up by
//! name on the created element.

use super::{PipePlacement, PlacementInstruction};
use crate::geometry::Point3;
use crate::orientation::{NotApplicable, Orientation};
use crate::rod::RodLength;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum SinkError {
    #[error("Support creation failed: {0}")]
    CreateFailed(String),

    #[error("Rotation failed: {0}")]
    RotateFailed(String),

    #[error("Support has no '{0}' parameter")]
    MissingParameter(String),

    #[error("Rod length unresolved, rod height left at family default")]
    RodUnresolved,
}

pub trait PlacementSink {
    /// Reference to a created support.
    type Handle: Copy;

    fn create(&mut self, position: &Point3) -> Result<Self::Handle, SinkError>;

    fn rotate(&mut self, handle: Self::Handle, orientation: &Orientation) -> Result<(), SinkError>;

    fn set_nominal_radius(&mut self, handle: Self::Handle, radius: f64) -> Result<(), SinkError>;

    fn set_rod_height(&mut self, handle: Self::Handle, height: f64) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct ApplyReport<H> {
    pub handle: H,
    pub rotated: bool,
    /// Non-fatal problems: the support exists but is not fully parametrized.
    pub warnings: Vec<SinkError>,
}

/// Create, rotate and parametrize one support.
///
/// Creation and rotation failures fail the instruction. A support without an
/// orientation stays unrotated. Parameters are written for every straight
/// run and skipped on curved ones; a failure to write them is reported as a
/// warning.
pub fn apply_instruction<S: PlacementSink>(
    sink: &mut S,
    instruction: &PlacementInstruction,
) -> Result<ApplyReport<S::Handle>, SinkError> {
    let handle = sink.create(&instruction.position)?;
    let mut report = ApplyReport {
        handle,
        rotated: false,
        warnings: Vec::new(),
    };

    match &instruction.rotation {
        Ok(orientation) => {
            sink.rotate(handle, orientation)?;
            report.rotated = true;
        }
        Err(NotApplicable::CurvedCenterline) => return Ok(report),
        Err(_) => {}
    }

    if let Err(e) = sink.set_nominal_radius(handle, instruction.nominal_radius) {
        report.warnings.push(e);
    }
    match instruction.rod_length {
        RodLength::Resolved(h) => {
            if let Err(e) = sink.set_rod_height(handle, h) {
                report.warnings.push(e);
            }
        }
        RodLength::Unresolved => report.warnings.push(SinkError::RodUnresolved),
    }

    for w in &report.warnings {
        warn!("Support at {:?}: {}", instruction.position, w);
    }
    Ok(report)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkOutcome {
    pub created: usize,
    pub failed: Vec<(usize, SinkError)>,
    pub warnings: Vec<(usize, SinkError)>,
}

/// Apply every instruction of a pipe. A failed instruction does not stop
/// the rest.
pub fn apply_placement<S: PlacementSink>(sink: &mut S, placement: &PipePlacement) -> SinkOutcome {
    let mut outcome = SinkOutcome::default();
    for (idx, instruction) in placement.instructions.iter().enumerate() {
        match apply_instruction(sink, instruction) {
            Ok(report) => {
                outcome.created += 1;
                outcome
                    .warnings
                    .extend(report.warnings.into_iter().map(|w| (idx, w)));
            }
            Err(e) => {
                warn!("Support {} of pipe {} not placed: {}", idx, placement.pipe, e);
                outcome.failed.push((idx, e));
            }
        }
    }
    outcome
}

/// A support as recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSupport {
    pub position: Point3,
    pub rotation: Option<f64>,
    pub nominal_radius: Option<f64>,
    pub rod_height: Option<f64>,
}

/// Sink that keeps created supports in memory. `family_has_rod_height`
/// mimics families that lack the rod parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSink {
    pub supports: Vec<RecordedSupport>,
    pub family_has_rod_height: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            supports: Vec::new(),
            family_has_rod_height: true,
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, handle: usize) -> Result<&mut RecordedSupport, SinkError> {
        self.supports
            .get_mut(handle)
            .ok_or_else(|| SinkError::RotateFailed(format!("unknown support {}", handle)))
    }
}

impl PlacementSink for RecordingSink {
    type Handle = usize;

    fn create(&mut self, position: &Point3) -> Result<usize, SinkError> {
        if !(position.x.is_finite() && position.y.is_finite() && position.z.is_finite()) {
            return Err(SinkError::CreateFailed(format!("non-finite position {:?}", position)));
        }
        self.supports.push(RecordedSupport {
            position: *position,
            rotation: None,
            nominal_radius: None,
            rod_height: None,
        });
        Ok(self.supports.len() - 1)
    }

    fn rotate(&mut self, handle: usize, orientation: &Orientation) -> Result<(), SinkError> {
        self.get_mut(handle)?.rotation = Some(orientation.angle);
        Ok(())
    }

    fn set_nominal_radius(&mut self, handle: usize, radius: f64) -> Result<(), SinkError> {
        self.get_mut(handle)?.nominal_radius = Some(radius);
        Ok(())
    }

    fn set_rod_height(&mut self, handle: usize, height: f64) -> Result<(), SinkError> {
        if !self.family_has_rod_height {
            return Err(SinkError::MissingParameter("Rod Height".to_string()));
        }
        self.get_mut(handle)?.rod_height = Some(height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(rod_length: RodLength, rotation: Result<Orientation, NotApplicable>) -> PlacementInstruction {
        PlacementInstruction {
            ratio: 0.5,
            position: Point3::new(5.0, 0.0, 3.0),
            rod_length,
            rotation,
            nominal_radius: 0.082,
        }
    }

    #[test]
    fn test_full_application() {
        let mut sink = RecordingSink::new();
        let o = Orientation::about_vertical(Point3::new(5.0, 0.0, 3.0), 1.0);
        let report = apply_instruction(&mut sink, &instruction(RodLength::Resolved(4.5), Ok(o))).unwrap();

        assert!(report.rotated);
        assert!(report.warnings.is_empty());
        let s = &sink.supports[report.handle];
        assert_eq!(s.rotation, Some(1.0));
        assert_eq!(s.nominal_radius, Some(0.082));
        assert_eq!(s.rod_height, Some(4.5));
    }

    #[test]
    fn test_not_applicable_places_unrotated() {
        let mut sink = RecordingSink::new();
        let report = apply_instruction(
            &mut sink,
            &instruction(RodLength::Resolved(4.5), Err(NotApplicable::CurvedCenterline)),
        )
        .unwrap();

        assert!(!report.rotated);
        let s = &sink.supports[report.handle];
        assert_eq!(s.rotation, None);
        assert_eq!(s.nominal_radius, None);
        assert_eq!(s.rod_height, None);
    }

    #[test]
    fn test_straight_run_without_angle_keeps_parameters() {
        for reason in [NotApplicable::UnhandledQuadrant, NotApplicable::NoHorizontalExtent] {
            let mut sink = RecordingSink::new();
            let report = apply_instruction(&mut sink, &instruction(RodLength::Resolved(3000.0), Err(reason))).unwrap();

            assert!(!report.rotated);
            assert!(report.warnings.is_empty());
            let s = &sink.supports[report.handle];
            assert_eq!(s.rotation, None);
            assert_eq!(s.nominal_radius, Some(0.082));
            assert_eq!(s.rod_height, Some(3000.0));
        }
    }

    #[test]
    fn test_unrotated_straight_run_reports_unresolved_rod() {
        let mut sink = RecordingSink::new();
        let report = apply_instruction(
            &mut sink,
            &instruction(RodLength::Unresolved, Err(NotApplicable::UnhandledQuadrant)),
        )
        .unwrap();
        assert_eq!(report.warnings, vec![SinkError::RodUnresolved]);
    }

    #[test]
    fn test_missing_parameter_is_a_warning() {
        let mut sink = RecordingSink {
            family_has_rod_height: false,
            ..RecordingSink::default()
        };
        let o = Orientation::about_vertical(Point3::origin(), 0.0);
        let report = apply_instruction(&mut sink, &instruction(RodLength::Resolved(4.5), Ok(o))).unwrap();

        assert_eq!(report.warnings, vec![SinkError::MissingParameter("Rod Height".to_string())]);
        assert_eq!(sink.supports[report.handle].nominal_radius, Some(0.082));
    }

    #[test]
    fn test_unresolved_rod_is_a_warning() {
        let mut sink = RecordingSink::new();
        let o = Orientation::about_vertical(Point3::origin(), 0.0);
        let report = apply_instruction(&mut sink, &instruction(RodLength::Unresolved, Ok(o))).unwrap();
        assert_eq!(report.warnings, vec![SinkError::RodUnresolved]);
        assert_eq!(sink.supports[report.handle].rod_height, None);
    }

    #[test]
    fn test_create_failure_fails_instruction() {
        let mut sink = RecordingSink::new();
        let mut bad = instruction(RodLength::Resolved(1.0), Err(NotApplicable::CurvedCenterline));
        bad.position = Point3::new(f64::NAN, 0.0, 0.0);
        let err = apply_instruction(&mut sink, &bad).unwrap_err();
        assert!(matches!(err, SinkError::CreateFailed(_)));
        assert!(sink.supports.is_empty());
    }
}
