//! Run-level extraction errors.

use arcstr::ArcStr;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, ExtractError>;

/// An error that stops the extraction of a cell.
///
/// Geometry that cannot be explained is never an error; it is reported as an
/// [`ExtractIssue`](crate::issue::ExtractIssue) instead.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("extraction was cancelled")]
    Cancelled,
    #[error("destination cell `{0}` already exists")]
    DestinationExists(ArcStr),
    #[error("no cell named `{0}`")]
    UnknownCell(ArcStr),
    #[error("invalid extraction options")]
    InvalidOptions(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] layir::BuildError),
}
