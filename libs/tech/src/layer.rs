//! Layers and their functional classification.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// The doping type of a diffusion, select, or well layer.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Doping {
    /// N-type.
    N,
    /// P-type.
    P,
}

impl Doping {
    /// The opposite doping type.
    pub const fn opposite(&self) -> Self {
        match self {
            Doping::N => Doping::P,
            Doping::P => Doping::N,
        }
    }
}

impl std::fmt::Display for Doping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Doping::N => write!(f, "N"),
            Doping::P => write!(f, "P"),
        }
    }
}

/// The function of a layer.
///
/// Every classification site matches on this enum exhaustively.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerFunction {
    /// Active (diffusion) of a single doping type.
    Diff(Doping),
    /// Active whose doping is determined only by surrounding select/well layers.
    DiffUnified,
    /// Polysilicon at the given level.
    Poly(u8),
    /// Metal at the given level.
    Metal(u8),
    /// A cut (contact or via) connecting up to the given metal level.
    Contact(u8),
    /// A well of the given doping type.
    Well(Doping),
    /// A well whose doping type is unspecified.
    GenericWell,
    /// A select implant of the given doping type.
    Select(Doping),
    /// Substrate marking.
    Substrate,
    /// Any other implant.
    Implant,
    /// Non-electrical annotation.
    Art,
}

impl LayerFunction {
    /// Returns `true` for active layers.
    pub const fn is_diff(&self) -> bool {
        matches!(self, LayerFunction::Diff(_) | LayerFunction::DiffUnified)
    }

    /// The doping of an active layer, if it has one.
    pub const fn diff_doping(&self) -> Option<Doping> {
        match self {
            LayerFunction::Diff(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns `true` for polysilicon layers.
    pub const fn is_poly(&self) -> bool {
        matches!(self, LayerFunction::Poly(_))
    }

    /// Returns `true` for metal layers.
    pub const fn is_metal(&self) -> bool {
        matches!(self, LayerFunction::Metal(_))
    }

    /// Returns `true` for cut layers.
    pub const fn is_contact(&self) -> bool {
        matches!(self, LayerFunction::Contact(_))
    }

    /// Returns `true` for well layers, generic or typed.
    pub const fn is_well(&self) -> bool {
        matches!(self, LayerFunction::Well(_) | LayerFunction::GenericWell)
    }

    /// Returns `true` for select layers.
    pub const fn is_select(&self) -> bool {
        matches!(self, LayerFunction::Select(_))
    }

    /// Returns `true` for substrate markings.
    pub const fn is_substrate(&self) -> bool {
        matches!(self, LayerFunction::Substrate)
    }

    /// Returns `true` for layers that carry wires.
    pub const fn is_routable(&self) -> bool {
        match self {
            LayerFunction::Diff(_)
            | LayerFunction::DiffUnified
            | LayerFunction::Poly(_)
            | LayerFunction::Metal(_) => true,
            LayerFunction::Contact(_)
            | LayerFunction::Well(_)
            | LayerFunction::GenericWell
            | LayerFunction::Select(_)
            | LayerFunction::Substrate
            | LayerFunction::Implant
            | LayerFunction::Art => false,
        }
    }

    /// Returns `true` for layers whose presence is used to infer the substrate process.
    pub const fn is_tub(&self) -> bool {
        matches!(
            self,
            LayerFunction::Well(_)
                | LayerFunction::GenericWell
                | LayerFunction::Substrate
                | LayerFunction::Implant
        )
    }
}

impl std::fmt::Display for LayerFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerFunction::Diff(d) => write!(f, "{d}-active"),
            LayerFunction::DiffUnified => write!(f, "active"),
            LayerFunction::Poly(n) => write!(f, "poly-{n}"),
            LayerFunction::Metal(n) => write!(f, "metal-{n}"),
            LayerFunction::Contact(n) => write!(f, "contact-{n}"),
            LayerFunction::Well(d) => write!(f, "{d}-well"),
            LayerFunction::GenericWell => write!(f, "well"),
            LayerFunction::Select(d) => write!(f, "{d}-select"),
            LayerFunction::Substrate => write!(f, "substrate"),
            LayerFunction::Implant => write!(f, "implant"),
            LayerFunction::Art => write!(f, "art"),
        }
    }
}

/// A layer of a technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    name: ArcStr,
    function: LayerFunction,
}

impl Layer {
    /// Creates a new layer.
    pub fn new(name: impl Into<ArcStr>, function: LayerFunction) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }

    /// The name of the layer.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The function of the layer.
    #[inline]
    pub fn function(&self) -> LayerFunction {
        self.function
    }
}
