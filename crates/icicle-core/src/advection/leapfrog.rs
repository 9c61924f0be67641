use super::{Advection, AdvectionContext};
use crate::courant::CourantFields;
use crate::field::LevelsMut;
use crate::grid::{M_HALF, P_HALF};
use ndarray::Zip;

/// Centred-in-time, centred-in-space advection.
///
/// `psi(n+1) = psi(n-1) - 0.5 (C(i+1/2) + C(i-1/2)) (psi(n)(i+1) - psi(n)(i-1))`, summed
/// over the non-degenerate axes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Leapfrog;

impl Advection for Leapfrog {
    fn name(&self) -> &'static str {
        "leapfrog"
    }

    fn stencil_extent(&self) -> usize {
        3
    }

    fn time_levels(&self) -> usize {
        3
    }

    fn num_steps(&self) -> usize {
        1
    }

    fn apply(
        &mut self,
        psi: LevelsMut<'_>,
        courants: &CourantFields,
        ctx: &AdvectionContext<'_>,
        pass: usize,
    ) {
        assert_eq!(pass, 1, "leapfrog advection has a single pass, got pass {}", pass);
        let previous = psi
            .previous
            .expect("leapfrog advection requires the previous time level");

        let ijk = *ctx.ijk;
        psi.next.assign(&ijk, &previous.view(&ijk));
        for axis in ctx.grid.active_axes() {
            let c = courants.axis(axis);
            Zip::from(psi.next.view_mut(&ijk))
                .and(c.view(&ijk.shift(axis, P_HALF)))
                .and(c.view(&ijk.shift(axis, -M_HALF)))
                .and(psi.current.view(&ijk.shift(axis, 1)))
                .and(psi.current.view(&ijk.shift(axis, -1)))
                .for_each(|next, &c_hi, &c_lo, &right, &left| {
                    *next -= 0.5 * (c_hi + c_lo) * (right - left);
                });
        }
    }
}
