//! Diagnostics reported while extracting a cell.

use std::fmt::Display;

use arcstr::ArcStr;
use diagnostics::{Diagnostic, Severity};
use geometry::prelude::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::trace::Stage;

/// An issue identified while extracting a cell.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExtractIssue {
    cell: ArcStr,
    cause: Cause,
    severity: Severity,
    locations: Vec<Point>,
}

/// Why a candidate contact template was rejected for a cut.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// A required layer does not cover the required area.
    MissingLayer { layer: ArcStr, at: Point },
    /// A layer that must be absent is present.
    ForbiddenLayer { layer: ArcStr, at: Point },
    /// The cut has the wrong size for the template.
    CutSize { dims: Dims },
}

/// A template that was considered and why it was rejected.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TemplateFailure {
    pub template: ArcStr,
    pub rejection: Rejection,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// No contact template explains a cut.
    UnmatchedCut {
        layer: ArcStr,
        failures: Vec<TemplateFailure>,
    },
    /// No transistor template explains a poly/active crossing.
    UnmatchedGate {
        poly: ArcStr,
        active: ArcStr,
        failures: Vec<TemplateFailure>,
    },
    /// No wire type has exactly the layer signature of a shape.
    NoWireType { layer: ArcStr },
    /// A wire candidate could not be narrowed enough to fit its geometry.
    WireDoesNotFit { layer: ArcStr, width: i64 },
    /// A leftover shape was smaller than the minimum area and was dropped.
    DustDropped { layer: ArcStr, area: i64 },
    /// Leftover geometry was discarded because the pure-layer stage is disabled.
    GeometryDiscarded { layer: ArcStr },
    /// A cut identical to one already collected was dropped.
    DuplicateCut { layer: ArcStr },
    /// Geometry of an instance lies outside the supported coordinate range.
    CoordinateOutOfRange { instance: ArcStr },
    /// An export could not be attached to extracted geometry and was given its own pin.
    ExportOnNewPin { export: ArcStr },
    /// A stage left unexplained geometry that was never drawn; the excess was clipped.
    GeometryGrew { stage: Stage, layer: ArcStr },
}

impl ExtractIssue {
    pub(crate) fn new(
        cell: impl Into<ArcStr>,
        cause: Cause,
        severity: Severity,
        locations: Vec<Point>,
    ) -> Self {
        Self {
            cell: cell.into(),
            cause,
            severity,
            locations,
        }
    }

    /// The cell in which the issue was found.
    #[inline]
    pub fn cell(&self) -> &ArcStr {
        &self.cell
    }

    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Diagnostic for ExtractIssue {
    fn severity(&self) -> Severity {
        self.severity
    }

    fn locations(&self) -> Vec<Point> {
        self.locations.clone()
    }

    fn help(&self) -> Option<Box<dyn Display>> {
        match &self.cause {
            Cause::UnmatchedCut { .. } | Cause::UnmatchedGate { .. } => Some(Box::new(
                "the geometry was kept as pure-layer shapes; check the surrounding layers",
            )),
            Cause::NoWireType { .. } => Some(Box::new(
                "check that active geometry is covered by exactly one select and well",
            )),
            _ => None,
        }
    }
}

impl Display for ExtractIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in cell `{}`: {}", self.cell, self.cause)
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingLayer { layer, at } => write!(f, "is missing `{}` at {}", layer, at),
            Self::ForbiddenLayer { layer, at } => {
                write!(f, "must not overlap `{}` at {}", layer, at)
            }
            Self::CutSize { dims } => write!(f, "does not accept a {} cut", dims),
        }
    }
}

impl Display for TemplateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` {}", self.template, self.rejection)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnmatchedCut { layer, failures } => {
                write!(f, "cut on `{}` matches no contact", layer)?;
                if !failures.is_empty() {
                    write!(f, ": {}", failures.iter().join("; "))?;
                }
                Ok(())
            }
            Self::UnmatchedGate {
                poly,
                active,
                failures,
            } => {
                write!(
                    f,
                    "crossing of `{}` and `{}` matches no transistor",
                    poly, active
                )?;
                if !failures.is_empty() {
                    write!(f, ": {}", failures.iter().join("; "))?;
                }
                Ok(())
            }
            Self::NoWireType { layer } => write!(
                f,
                "no wire type matches the surrounding layers of a shape on `{}`",
                layer
            ),
            Self::WireDoesNotFit { layer, width } => write!(
                f,
                "a wire of width {} on `{}` does not fit its geometry at any narrower width",
                width, layer
            ),
            Self::DustDropped { layer, area } => write!(
                f,
                "dropped a shape of area {} on `{}` below the minimum area",
                area, layer
            ),
            Self::GeometryDiscarded { layer } => write!(
                f,
                "discarded unextracted geometry on `{}` because pure-layer output is disabled",
                layer
            ),
            Self::DuplicateCut { layer } => write!(f, "dropped a duplicate cut on `{}`", layer),
            Self::CoordinateOutOfRange { instance } => write!(
                f,
                "instance `{}` lies outside the supported coordinate range and was skipped",
                instance
            ),
            Self::ExportOnNewPin { export } => write!(
                f,
                "export `{}` was placed on a new pin because no extracted port is at its location",
                export
            ),
            Self::GeometryGrew { stage, layer } => write!(
                f,
                "the {} stage added geometry on `{}` that is not in the input",
                stage, layer
            ),
        }
    }
}
