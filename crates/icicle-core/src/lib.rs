//! Advection engine for kinematic cloud simulations.
//!
//! Scalar fields (density-weighted potential temperature, water vapour mixing ratio, ...)
//! are advanced in time on a staggered Arakawa-C grid under a prescribed or diagnosed
//! velocity field.
//!
//! # Module Organisation
//!
//! - `grid`: staggered index geometry and half-cell offsets
//! - `array`: dense 3D storage addressed by logical (halo-inclusive) indices
//! - `field`: per-variable time-level banks and their cycling
//! - `halo`: cyclic and neighbour-sourced halo exchange
//! - `courant`: constant and diagnosed Courant-number fields
//! - `advection`: upstream, leapfrog and MPDATA operators
//! - `forcing`: explicit/implicit right-hand-side terms
//! - `equations`: the equation-system collaborator interface
//! - `io`: initial-condition and output collaborators
//! - `config`: run configuration loaded from TOML
//! - `errors`: the crate error type
//! - `solver`: run state and the per-step operations
//! - `driver`: per-step sequencing
//!
//! Microphysics, output formats and initial conditions are external collaborators,
//! reached through the traits in `equations` and `io`.

pub mod advection;
pub mod array;
pub mod config;
pub mod courant;
pub mod driver;
pub mod equations;
pub mod errors;
pub mod field;
pub mod forcing;
pub mod grid;
pub mod halo;
pub mod io;
pub mod solver;

/// Floating point type used for every field, Courant number and time step.
pub type FloatValue = f64;
