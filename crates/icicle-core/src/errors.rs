use crate::grid::Axis;
use thiserror::Error;

/// Error type for invalid configurations and numerical blow-ups.
///
/// Configuration errors are raised before any stepping takes place.
/// `NonFinite` signals that the integration has diverged and must not be retried.
#[derive(Error, Debug)]
pub enum IcicleError {
    #[error("MPDATA requires a positive number of iterations, got iord={0}")]
    InvalidIord(u32),
    #[error("halo length ({halo}) may not exceed domain extent in {axis} ({extent})")]
    HaloExceedsExtent {
        axis: Axis,
        halo: usize,
        extent: usize,
    },
    #[error("unsupported number of time levels: {0} (expected 2 or 3)")]
    UnsupportedTimeLevels(usize),
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("variable {0} is defined more than once")]
    DuplicateVariable(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("non-finite values detected in {what}")]
    NonFinite { what: String },
}

/// Convenience type for `Result<T, IcicleError>`.
pub type IcicleResult<T> = Result<T, IcicleError>;
