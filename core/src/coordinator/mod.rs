//! Per-pipe placement pipeline.
//!
//! Each pipe goes through spacing lookup, planning, per-point rod
//! resolution and orientation, producing one [`PlacementInstruction`] per
//! support. Pipes are independent: a failure on one never affects another.
//!
//! Lookup and planning work in millimetres. Positions, rod lengths and the
//! nominal radius stay in model units.

use crate::config::SupportConfig;
use crate::element::ElementId;
use crate::geometry::{Centerline, Point3, Vector3};
use crate::orientation::{NotApplicable, Orientation, OrientationSolver};
use crate::planner::{PlacementPlanner, PlacementRequest, PlanCase, PlanError, PointOrdering};
use crate::rod::{GeometryQuery, QueryBudget, RodLength, RodResolver};
use crate::spec_table::{DiameterMatch, SpecTable};
use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod sink;
pub use sink::{
    apply_instruction, apply_placement, ApplyReport, PlacementSink, RecordedSupport, RecordingSink,
    SinkError, SinkOutcome,
};

/// Elevation comparison precision for the level check.
pub const LEVEL_DECIMALS: i32 = 5;

/// A pipe submitted for placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeRun {
    pub id: ElementId,
    pub centerline: Centerline,
    /// Outside diameter in model units.
    pub diameter: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    /// mm
    pub edge_offset: f64,
    /// mm
    pub min_spacing: f64,
    pub units: LengthUnit,
    pub ordering: PointOrdering,
    pub diameter_match: DiameterMatch,
    /// Fail the pipe instead of placing unrotated supports.
    pub require_orientation: bool,
    pub level_decimals: i32,
    pub rod_direction: Vector3,
    pub default_axis: Vector3,
}

impl CoordinatorSettings {
    pub fn new(edge_offset: f64, min_spacing: f64) -> Self {
        Self {
            edge_offset,
            min_spacing,
            units: LengthUnit::default(),
            ordering: PointOrdering::default(),
            diameter_match: DiameterMatch::default(),
            require_orientation: false,
            level_decimals: LEVEL_DECIMALS,
            rod_direction: Vector3::z(),
            default_axis: Vector3::y(),
        }
    }

    pub fn from_config(config: &SupportConfig) -> Self {
        Self::new(config.offset, config.min_spacing)
            .with_units(config.units)
            .with_require_orientation(config.require_orientation)
    }

    pub fn with_units(mut self, units: LengthUnit) -> Self {
        self.units = units;
        self
    }

    pub fn with_ordering(mut self, ordering: PointOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_diameter_match(mut self, diameter_match: DiameterMatch) -> Self {
        self.diameter_match = diameter_match;
        self
    }

    pub fn with_require_orientation(mut self, require: bool) -> Self {
        self.require_orientation = require;
        self
    }
}

/// Pipeline stage of a pipe. A failure records the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    SpacingLookup,
    Planning,
    PerPointResolution,
    OrientationAndEmit,
    Done,
}

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipeError {
    #[error("Pipe is not level, only horizontal runs are supported")]
    SlopedPipe,

    #[error("No spacing rule for diameter {0} mm")]
    LookupMiss(f64),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Orientation required: {0}")]
    OrientationRequired(NotApplicable),
}

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[error("Pipe {pipe} failed during {state:?}: {error}")]
pub struct PipeFailure {
    pub pipe: ElementId,
    pub state: CoordinatorState,
    pub error: PipeError,
}

/// Everything the sink needs to create one support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementInstruction {
    pub ratio: f64,
    pub position: Point3,
    pub rod_length: RodLength,
    /// `Err` leaves the support in its default orientation.
    pub rotation: Result<Orientation, NotApplicable>,
    pub nominal_radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementWarning {
    UnresolvedRod { index: usize, position: Point3 },
    Unrotated { reason: NotApplicable },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipePlacement {
    pub pipe: ElementId,
    pub case: PlanCase,
    /// Spacing looked up for this pipe (mm).
    pub spacing: f64,
    pub instructions: Vec<PlacementInstruction>,
    pub warnings: Vec<PlacementWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub placed: Vec<PipePlacement>,
    pub failed: Vec<PipeFailure>,
}

impl BatchReport {
    pub fn support_count(&self) -> usize {
        self.placed.iter().map(|p| p.instructions.len()).sum()
    }

    pub fn push(&mut self, result: Result<PipePlacement, PipeFailure>) {
        match result {
            Ok(p) => self.placed.push(p),
            Err(f) => self.failed.push(f),
        }
    }
}

pub struct PlacementCoordinator<'a, Q: GeometryQuery + ?Sized> {
    table: &'a SpecTable,
    query: &'a Q,
    settings: CoordinatorSettings,
}

impl<'a, Q: GeometryQuery + ?Sized> PlacementCoordinator<'a, Q> {
    pub fn new(table: &'a SpecTable, query: &'a Q, settings: CoordinatorSettings) -> Self {
        Self {
            table,
            query,
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Run the whole pipeline for one pipe.
    pub fn place(&self, pipe: &PipeRun, budget: &QueryBudget) -> Result<PipePlacement, PipeFailure> {
        let s = &self.settings;
        let mut state = CoordinatorState::Idle;
        let fail = |state: CoordinatorState, error: PipeError| {
            warn!("Pipe {} skipped: {}", pipe.id, error);
            PipeFailure {
                pipe: pipe.id,
                state,
                error,
            }
        };

        transition(pipe.id, &mut state, CoordinatorState::SpacingLookup);
        if !pipe.centerline.is_level(s.level_decimals) {
            return Err(fail(state, PipeError::SlopedPipe));
        }
        let diameter_mm = s.units.to_mm(pipe.diameter);
        let spacing = self
            .table
            .lookup_with(diameter_mm, s.diameter_match)
            .ok_or_else(|| fail(state, PipeError::LookupMiss(diameter_mm)))?;

        transition(pipe.id, &mut state, CoordinatorState::Planning);
        let request = PlacementRequest {
            span_length: s.units.to_mm(pipe.centerline.length()),
            edge_offset: s.edge_offset,
            min_spacing: s.min_spacing,
            target_spacing: spacing,
        };
        let plan = PlacementPlanner::new(s.ordering)
            .plan(&request)
            .map_err(|e| fail(state, e.into()))?;
        let points = plan.points(&pipe.centerline);

        transition(pipe.id, &mut state, CoordinatorState::PerPointResolution);
        let resolver = RodResolver::new(s.rod_direction);
        let rods: Vec<RodLength> = points
            .iter()
            .map(|p| resolver.resolve(self.query, &p.position, pipe.id, budget))
            .collect();

        transition(pipe.id, &mut state, CoordinatorState::OrientationAndEmit);
        let solver = OrientationSolver {
            default_axis: s.default_axis,
        };
        let mut warnings = Vec::new();
        let mut instructions = Vec::with_capacity(points.len());
        for (index, (point, rod_length)) in points.iter().zip(rods).enumerate() {
            if !rod_length.is_resolved() {
                warnings.push(PlacementWarning::UnresolvedRod {
                    index,
                    position: point.position,
                });
            }
            let rotation = solver.orient(&pipe.centerline, point.position);
            if let Err(reason) = rotation {
                if s.require_orientation {
                    return Err(fail(state, PipeError::OrientationRequired(reason)));
                }
            }
            instructions.push(PlacementInstruction {
                ratio: point.ratio,
                position: point.position,
                rod_length,
                rotation,
                nominal_radius: pipe.diameter / 2.0,
            });
        }
        // Orientation depends on the centerline only, so one warning covers all points
        if let Some(Err(reason)) = instructions.first().map(|i| i.rotation) {
            warnings.push(PlacementWarning::Unrotated { reason });
        }

        transition(pipe.id, &mut state, CoordinatorState::Done);
        info!(
            "Pipe {}: {} supports at {} mm spacing, {} warnings",
            pipe.id,
            instructions.len(),
            spacing,
            warnings.len()
        );

        Ok(PipePlacement {
            pipe: pipe.id,
            case: plan.case,
            spacing,
            instructions,
            warnings,
        })
    }

    /// Place every pipe in order. Each result is independent.
    pub fn run(&self, pipes: &[PipeRun], budget: &QueryBudget) -> BatchReport {
        let mut report = BatchReport::default();
        for pipe in pipes {
            report.push(self.place(pipe, budget));
        }
        info!(
            "Placement batch: {} pipes placed, {} failed, {} supports",
            report.placed.len(),
            report.failed.len(),
            report.support_count()
        );
        report
    }
}

fn transition(pipe: ElementId, state: &mut CoordinatorState, next: CoordinatorState) {
    debug!("Pipe {}: {:?} -> {:?}", pipe, state, next);
    *state = next;
}
