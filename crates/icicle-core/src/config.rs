//! Run configuration.
//!
//! The configuration surface consumed by the solver: grid, time step, scheme and the
//! velocity source. Values are passed explicitly to [`crate::solver::Solver::new`]; there
//! is no global option state.
//!
//! ```toml
//! dt = 1.0
//! nt = 100
//! outfreq = 10
//!
//! [grid]
//! nx = 50
//! ny = 50
//!
//! [scheme]
//! type = "mpdata"
//! iord = 2
//!
//! [velocity]
//! source = "constant"
//! field = { type = "uniform", velocity = [0.2, 0.0, 0.0] }
//! ```

use crate::advection::Scheme;
use crate::courant::AnalyticVelocity;
use crate::errors::{IcicleError, IcicleResult};
use crate::grid::Grid;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where the advecting velocity comes from.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VelocityConfig {
    /// Sampled once from an analytic field; Courant numbers never change.
    Constant { field: Box<dyn AnalyticVelocity> },
    /// Recomputed every step from the equation system's velocity map.
    Diagnosed,
}

impl VelocityConfig {
    pub fn is_constant(&self) -> bool {
        matches!(self, VelocityConfig::Constant { .. })
    }
}

fn default_outfreq() -> usize {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub grid: Grid,
    /// Time step (s).
    pub dt: FloatValue,
    /// Number of time steps.
    pub nt: usize,
    /// Record output every `outfreq` steps.
    #[serde(default = "default_outfreq")]
    pub outfreq: usize,
    #[serde(default)]
    pub scheme: Scheme,
    pub velocity: VelocityConfig,
}

impl RunConfig {
    pub fn new(
        grid: Grid,
        dt: FloatValue,
        nt: usize,
        scheme: Scheme,
        velocity: VelocityConfig,
    ) -> Self {
        Self {
            grid,
            dt,
            nt,
            outfreq: default_outfreq(),
            scheme,
            velocity,
        }
    }

    pub fn from_toml_str(s: &str) -> IcicleResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> IcicleResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks everything that can be checked without an equation system.
    pub fn validate(&self) -> IcicleResult<()> {
        self.grid.validate()?;
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(IcicleError::Config(format!(
                "time step must be positive, got {}",
                self.dt
            )));
        }
        if self.outfreq == 0 {
            return Err(IcicleError::Config(
                "output frequency must be at least 1".to_string(),
            ));
        }
        self.scheme.build()?;
        Ok(())
    }
}
