use arcstr::ArcStr;

use crate::id::{LayerId, TemplateId};

/// The result type returned by technology functions.
pub type Result<T> = std::result::Result<T, TechError>;

/// An error in a technology description.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TechError {
    /// A template or wire type references a layer that does not exist.
    #[error("{owner} references unknown {layer}")]
    UnknownLayer { owner: ArcStr, layer: LayerId },
    /// A wire type's pin template does not exist or is not a pin.
    #[error("wire type {arc} has invalid pin {pin}")]
    InvalidPin { arc: ArcStr, pin: TemplateId },
    /// A port references a wire type that does not exist.
    #[error("port {port} of {template} references an unknown wire type")]
    UnknownArc { template: ArcStr, port: ArcStr },
    /// A non-pin template draws no layers.
    #[error("template {0} draws no layers")]
    EmptyTemplate(ArcStr),
    /// A wire type draws no layers.
    #[error("wire type {0} draws no layers")]
    EmptyArc(ArcStr),
    /// A cut rule has non-positive size or negative spacing.
    #[error("template {0} has an invalid cut rule")]
    InvalidCutRule(ArcStr),
    /// Two objects of the same kind have the same name.
    #[error("duplicate name {0}")]
    DuplicateName(ArcStr),
}
