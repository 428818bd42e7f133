//! Extraction options.

use std::path::{Path, PathBuf};

use geometry::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How active (diffusion) layers are distinguished.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveHandling {
    /// N and P active are distinct, and select/well surrounds must match.
    #[default]
    Strict,
    /// N and P active are treated as one layer; select/well surrounds decide the type.
    IgnoreNp,
    /// N and P active are distinct, but select/well surrounds are not checked.
    IgnoreSurrounds,
}

/// What happens to the metal surrounding a realized contact.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViaHalo {
    /// The contact's full footprint is removed from the unclassified geometry.
    #[default]
    Consume,
    /// Only the cut is consumed; surrounding layers are extracted separately.
    Keep,
}

/// Per-stage enable flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StageFlags {
    pub vias: bool,
    pub transistors: bool,
    pub wires: bool,
    pub bridges: bool,
    pub pure_layer: bool,
    pub auto_cleanup: bool,
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            vias: true,
            transistors: true,
            wires: true,
            bridges: true,
            pure_layer: true,
            auto_cleanup: true,
        }
    }
}

/// Options controlling an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Grid to which extracted geometry is aligned. `None` aligns to the unit grid.
    pub alignment: Option<i64>,
    pub active_handling: ActiveHandling,
    pub stages: StageFlags,
    /// Extract instantiated sub-cells before their parents.
    pub recursive: bool,
    /// Regular expressions selecting sub-cells to flatten, matched against whole cell names.
    pub expand_patterns: Vec<String>,
    /// Accept multi-cut contacts whose cuts do not exactly match the template's cut array.
    pub approximate_cuts: bool,
    /// Leftover shapes with a smaller area are dropped.
    pub min_area: i64,
    pub via_halo: ViaHalo,
    /// Appended to a source cell's name to name its extracted cell.
    pub cell_suffix: String,
    /// Prefix of export names created on sub-cells during port search.
    pub placeholder_prefix: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            alignment: None,
            active_handling: ActiveHandling::default(),
            stages: StageFlags::default(),
            recursive: false,
            expand_patterns: Vec::new(),
            approximate_cuts: false,
            min_area: 0,
            via_halo: ViaHalo::default(),
            cell_suffix: "_extracted".to_string(),
            placeholder_prefix: "_ext".to_string(),
        }
    }
}

/// An error in extraction options.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read options from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("invalid expansion pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("alignment grid must be positive, got {0}")]
    NonPositiveGrid(i64),
    #[error("minimum area must not be negative, got {0}")]
    NegativeMinArea(i64),
    #[error("extracted cell suffix must not be empty")]
    EmptySuffix,
}

impl ExtractOptions {
    /// Parses options from a TOML string. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads options from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks the options and compiles the expansion patterns.
    pub fn validate(self) -> Result<ValidatedOptions, ConfigError> {
        if let Some(grid) = self.alignment {
            if grid <= 0 {
                return Err(ConfigError::NonPositiveGrid(grid));
            }
        }
        if self.min_area < 0 {
            return Err(ConfigError::NegativeMinArea(self.min_area));
        }
        if self.cell_suffix.is_empty() {
            return Err(ConfigError::EmptySuffix);
        }
        let patterns = self
            .expand_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ValidatedOptions {
            options: self,
            patterns,
        })
    }
}

/// Options that have passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedOptions {
    options: ExtractOptions,
    patterns: Vec<Regex>,
}

impl std::ops::Deref for ValidatedOptions {
    type Target = ExtractOptions;

    fn deref(&self) -> &Self::Target {
        &self.options
    }
}

impl Default for ValidatedOptions {
    fn default() -> Self {
        Self {
            options: ExtractOptions::default(),
            patterns: Vec::new(),
        }
    }
}

impl ValidatedOptions {
    /// The alignment grid, defaulting to 1.
    #[inline]
    pub fn grid(&self) -> i64 {
        self.options.alignment.unwrap_or(1)
    }

    /// Returns `true` if instances of the cell named `name` are flattened.
    pub fn should_expand(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Snaps a point to the alignment grid.
    pub fn snap(&self, p: Point) -> Point {
        p.snap_to_grid(self.grid())
    }

    /// Snaps a floating-point location to the alignment grid.
    pub fn snap_f(&self, p: FPoint) -> Point {
        p.snap_to_grid(self.grid())
    }

    /// The name of the extracted version of `source`.
    pub fn destination_name(&self, source: &str) -> arcstr::ArcStr {
        arcstr::format!("{}{}", source, self.options.cell_suffix)
    }
}
