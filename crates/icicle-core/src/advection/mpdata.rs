use super::{donor_cell_pass, normalized_difference, owned_faces, Advection, AdvectionContext};
use crate::array::HaloArray;
use crate::courant::CourantFields;
use crate::errors::{IcicleError, IcicleResult};
use crate::field::LevelsMut;
use crate::grid::{Axis, M_HALF, P_HALF};
use crate::halo::fill_periodic_faces;
use crate::FloatValue;
use ndarray::Zip;

/// Multidimensional positive definite advection transport algorithm.
///
/// Pass 1 is a donor-cell step with the Courant numbers. Each further pass repeats the
/// donor-cell step with an antidiffusive pseudo-velocity estimated from the field left
/// by the previous pass, removing most of the first-order numerical diffusion.
#[derive(Debug)]
pub struct Mpdata {
    iord: usize,
    caching: bool,
    cache: Option<AntidiffusiveCache>,
}

/// Antidiffusive velocities, one array per axis for each corrective pass.
///
/// `passes[s - 2]` holds the velocities of pass `s`.
#[derive(Debug)]
struct AntidiffusiveCache {
    passes: Vec<[HaloArray; 3]>,
}

impl AntidiffusiveCache {
    fn allocate(courants: &CourantFields, corrective_passes: usize) -> Self {
        Self {
            passes: (0..corrective_passes)
                .map(|_| Axis::ALL.map(|a| HaloArray::zeros(*courants.axis(a).bounds())))
                .collect(),
        }
    }

    fn fits(&self, courants: &CourantFields, corrective_passes: usize) -> bool {
        self.passes.len() == corrective_passes
            && self.passes.iter().all(|pass| {
                Axis::ALL
                    .into_iter()
                    .all(|a| pass[a.index()].bounds() == courants.axis(a).bounds())
            })
    }
}

impl Mpdata {
    /// `iord` counts every pass, the initial upstream one included.
    pub fn new(iord: u32, caching: bool) -> IcicleResult<Self> {
        if iord == 0 {
            return Err(IcicleError::InvalidIord(iord));
        }
        Ok(Self {
            iord: iord as usize,
            caching,
            cache: None,
        })
    }

    pub fn iord(&self) -> usize {
        self.iord
    }

    /// Takes the cached buffers, reallocating them if the Courant geometry changed.
    fn take_cache(&mut self, courants: &CourantFields) -> AntidiffusiveCache {
        let corrective = self.iord - 1;
        match self.cache.take() {
            Some(cache) if cache.fits(courants, corrective) => cache,
            _ => AntidiffusiveCache::allocate(courants, corrective),
        }
    }
}

impl Advection for Mpdata {
    fn name(&self) -> &'static str {
        "mpdata"
    }

    fn stencil_extent(&self) -> usize {
        3
    }

    fn time_levels(&self) -> usize {
        2
    }

    fn num_steps(&self) -> usize {
        self.iord
    }

    fn apply(
        &mut self,
        psi: LevelsMut<'_>,
        courants: &CourantFields,
        ctx: &AdvectionContext<'_>,
        pass: usize,
    ) {
        assert!(
            (1..=self.iord).contains(&pass),
            "MPDATA pass {} outside 1..={}",
            pass,
            self.iord
        );
        if pass == 1 {
            let velocity = Axis::ALL.map(|a| courants.axis(a));
            donor_cell_pass(psi.current, psi.next, velocity, ctx);
            return;
        }

        let mut cache = self.take_cache(courants);
        {
            let (done, rest) = cache.passes.split_at_mut(pass - 2);
            let advecting: [&HaloArray; 3] = match done.last() {
                Some([x, y, z]) => [&*x, &*y, &*z],
                None => Axis::ALL.map(|a| courants.axis(a)),
            };
            let target = &mut rest[0];
            for axis in ctx.grid.active_axes() {
                let velocity = &mut target[axis.index()];
                antidiffusive_velocity(psi.current, advecting, axis, ctx, velocity);

                // Refresh the halo so the next pass's transverse averages read valid data
                fill_periodic_faces(velocity, ctx.grid, ctx.ijk, axis);
            }
            let velocity = [&target[0], &target[1], &target[2]];
            donor_cell_pass(psi.current, psi.next, velocity, ctx);
        }

        // Without caching the buffers only live until the last pass of this advection
        if self.caching || pass < self.iord {
            self.cache = Some(cache);
        }
    }
}

/// Antidiffusive pseudo-velocity on the owned faces along `axis`.
///
/// `V = (|U| - U^2) A - sum_t U vbar_t B_t` where `U` is the advecting velocity of the
/// previous pass, `A` the normalised difference across the face, `vbar_t` the four-point
/// average of the transverse velocity around the face and `B_t` half the normalised
/// difference of the transverse neighbour pairs. For signed fields `A` and `B_t` are
/// taken from `|psi|`.
fn antidiffusive_velocity(
    psi: &HaloArray,
    advecting: [&HaloArray; 3],
    axis: Axis,
    ctx: &AdvectionContext<'_>,
    target: &mut HaloArray,
) {
    let faces = owned_faces(ctx.ijk, axis);
    let left = faces.shift(axis, -P_HALF);
    let right = faces.shift(axis, M_HALF);
    let u = advecting[axis.index()];
    let magnitude: fn(FloatValue) -> FloatValue = if ctx.positive_definite {
        |x| x
    } else {
        FloatValue::abs
    };

    Zip::from(target.view_mut(&faces))
        .and(u.view(&faces))
        .and(psi.view(&left))
        .and(psi.view(&right))
        .for_each(|v, &u, &l, &r| {
            *v = (u.abs() - u * u) * normalized_difference(magnitude(r), magnitude(l));
        });

    for t in axis.transverse() {
        if ctx.grid.is_degenerate(t) {
            continue;
        }
        let w = advecting[t.index()];
        let w_bar = Zip::from(w.view(&left.shift(t, P_HALF)))
            .and(w.view(&right.shift(t, P_HALF)))
            .and(w.view(&left.shift(t, -M_HALF)))
            .and(w.view(&right.shift(t, -M_HALF)))
            .map_collect(|&a, &b, &c, &d| 0.25 * (a + b + c + d));
        let upper = Zip::from(psi.view(&left.shift(t, 1)))
            .and(psi.view(&right.shift(t, 1)))
            .map_collect(|&l, &r| magnitude(l) + magnitude(r));
        let lower = Zip::from(psi.view(&left.shift(t, -1)))
            .and(psi.view(&right.shift(t, -1)))
            .map_collect(|&l, &r| magnitude(l) + magnitude(r));

        Zip::from(target.view_mut(&faces))
            .and(u.view(&faces))
            .and(&w_bar)
            .and(&upper)
            .and(&lower)
            .for_each(|v, &u, &w, &hi, &lo| {
                *v -= u * w * 0.5 * normalized_difference(hi, lo);
            });
    }
}
