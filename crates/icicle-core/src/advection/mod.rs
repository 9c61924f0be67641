//! Advection operators.
//!
//! Every operator writes level `n + 1` of one field from level `n` (and `n - 1` for
//! leapfrog) and the face-centred Courant numbers. Each variant declares the stencil
//! width it needs (which sizes the halos), the number of time levels it uses and the
//! number of passes it makes per time step.
//!
//! Passes are whole-array operations: a pass reads only committed levels and writes
//! only `n + 1`, so each pass could be split over threads without changing results.

mod leapfrog;
mod mpdata;
mod upstream;

pub use leapfrog::Leapfrog;
pub use mpdata::Mpdata;
pub use upstream::Upstream;

use crate::array::HaloArray;
use crate::courant::CourantFields;
use crate::errors::IcicleResult;
use crate::field::LevelsMut;
use crate::grid::{Axis, Grid, Idx, M_HALF, P_HALF};
use crate::FloatValue;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Geometry shared by all passes of one solver.
#[derive(Debug, Clone, Copy)]
pub struct AdvectionContext<'a> {
    pub grid: &'a Grid,
    /// Owned cells of the advected field.
    pub ijk: &'a Idx,
    /// Whether the advected field is never negative.
    pub positive_definite: bool,
}

/// A finite-difference/finite-volume advection scheme.
pub trait Advection: Debug + Send {
    fn name(&self) -> &'static str;

    /// Width of the stencil in cells; halos are `(stencil_extent - 1) / 2` wide.
    fn stencil_extent(&self) -> usize;

    /// Number of time levels held per field (2 or 3).
    fn time_levels(&self) -> usize;

    /// Number of passes per time step.
    fn num_steps(&self) -> usize;

    /// Performs pass `pass` (1-based), writing `psi.next`.
    ///
    /// # Panics
    ///
    /// Panics if `pass` is outside `1..=num_steps()` or the required time levels are
    /// missing; both are programming errors.
    fn apply(
        &mut self,
        psi: LevelsMut<'_>,
        courants: &CourantFields,
        ctx: &AdvectionContext<'_>,
        pass: usize,
    );

    /// Halo width needed around scalar fields and Courant arrays.
    fn halo(&self) -> usize {
        (self.stencil_extent() - 1) / 2
    }
}

fn default_cache() -> bool {
    true
}

/// Scheme selection as it appears in run configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scheme {
    /// First-order donor cell.
    Upstream,
    /// Centred in time and space, three time levels.
    Leapfrog,
    /// Multidimensional positive definite advection transport algorithm.
    Mpdata {
        /// Number of passes: one upstream pass plus `iord - 1` antidiffusive corrections.
        iord: u32,
        /// Keep antidiffusive velocity buffers for the lifetime of the solver.
        #[serde(default = "default_cache")]
        cache: bool,
    },
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme::Mpdata {
            iord: 2,
            cache: true,
        }
    }
}

impl Scheme {
    /// Validates the selection and constructs the operator.
    pub fn build(&self) -> IcicleResult<Box<dyn Advection>> {
        Ok(match *self {
            Scheme::Upstream => Box::new(Upstream),
            Scheme::Leapfrog => Box::new(Leapfrog),
            Scheme::Mpdata { iord, cache } => Box::new(Mpdata::new(iord, cache)?),
        })
    }
}

/// Donor-cell flux through a face with Courant number `c` between `psi_l` and `psi_r`.
pub(crate) fn donor_cell(psi_l: FloatValue, psi_r: FloatValue, c: FloatValue) -> FloatValue {
    0.5 * (c + c.abs()) * psi_l + 0.5 * (c - c.abs()) * psi_r
}

/// `(hi - lo) / (hi + lo)`, or exactly zero where the sum is not positive.
///
/// The guard keeps all-zero (or negative-sum) neighbourhoods from producing NaN.
pub(crate) fn normalized_difference(hi: FloatValue, lo: FloatValue) -> FloatValue {
    let sum = hi + lo;
    if sum > 0.0 {
        (hi - lo) / sum
    } else {
        0.0
    }
}

/// Faces bounding the cells of `ijk` along `axis`.
pub(crate) fn owned_faces(ijk: &Idx, axis: Axis) -> Idx {
    ijk.with(axis, Grid::rng_faces(ijk.span(axis)))
}

/// Donor-cell fluxes through `faces` along `axis`.
fn face_fluxes(psi: &HaloArray, velocity: &HaloArray, faces: &Idx, axis: Axis) -> HaloArray {
    let mut flux = HaloArray::zeros(*faces);
    Zip::from(flux.view_mut(faces))
        .and(psi.view(&faces.shift(axis, -P_HALF)))
        .and(psi.view(&faces.shift(axis, M_HALF)))
        .and(velocity.view(faces))
        .for_each(|f, &l, &r, &c| *f = donor_cell(l, r, c));
    flux
}

/// One donor-cell pass: `next = current - sum over axes of the flux difference`.
pub(crate) fn donor_cell_pass(
    current: &HaloArray,
    next: &mut HaloArray,
    velocity: [&HaloArray; 3],
    ctx: &AdvectionContext<'_>,
) {
    let ijk = *ctx.ijk;
    next.assign(&ijk, &current.view(&ijk));
    for axis in ctx.grid.active_axes() {
        let flux = face_fluxes(current, velocity[axis.index()], &owned_faces(&ijk, axis), axis);
        Zip::from(next.view_mut(&ijk))
            .and(flux.view(&ijk.shift(axis, P_HALF)))
            .and(flux.view(&ijk.shift(axis, -M_HALF)))
            .for_each(|psi, &upper, &lower| *psi -= upper - lower);
    }
}
