//! Courant-number fields.
//!
//! The advecting velocity along each axis is stored on the faces normal to that axis,
//! non-dimensionalised by `dt / d`. It is either sampled once from an analytic velocity
//! or diagnosed every step from ratios of advected momentum-like and density-like
//! variables.

use crate::array::HaloArray;
use crate::errors::{IcicleError, IcicleResult};
use crate::field::{FieldStore, Level};
use crate::grid::{Axis, Grid, Idx, M_HALF, P_HALF};
use crate::halo::fill_periodic_faces;
use crate::FloatValue;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::warn;

/// Face-centred Courant numbers, one array per axis.
///
/// Arrays on degenerate axes are allocated (one face wider than the single cell) but
/// stay zero.
#[derive(Debug, Clone)]
pub struct CourantFields {
    fields: [HaloArray; 3],
}

impl CourantFields {
    /// Allocates zeroed Courant arrays for the cells of `ijk`, with `halo` faces/cells of
    /// margin on every non-degenerate axis.
    pub fn zeros(grid: &Grid, ijk: &Idx, halo: usize) -> Self {
        Self {
            fields: Axis::ALL.map(|a| HaloArray::zeros(grid.rng_vctr(a, ijk, halo))),
        }
    }

    pub fn axis(&self, axis: Axis) -> &HaloArray {
        &self.fields[axis.index()]
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut HaloArray {
        &mut self.fields[axis.index()]
    }

    /// Refreshes the halo of every active axis by cyclic wrap around the cells of `ijk`.
    pub fn fill_periodic(&mut self, grid: &Grid, ijk: &Idx) {
        for axis in grid.active_axes() {
            fill_periodic_faces(self.axis_mut(axis), grid, ijk, axis);
        }
    }

    pub fn max_abs(&self) -> FloatValue {
        self.fields
            .iter()
            .map(HaloArray::max_abs)
            .fold(0.0, FloatValue::max)
    }

    pub fn check_finite(&self) -> IcicleResult<()> {
        for axis in Axis::ALL {
            let arr = self.axis(axis);
            if !arr.is_finite(arr.bounds()) {
                return Err(IcicleError::NonFinite {
                    what: format!("Courant number along {}", axis),
                });
            }
        }
        Ok(())
    }

    /// Logs a warning when the stability limit |C| <= 1 is exceeded.
    ///
    /// The limit is not enforced.
    pub fn warn_if_unstable(&self) {
        let max = self.max_abs();
        if max > 1.0 {
            warn!(
                max_courant = max,
                "Courant number exceeds 1; advection may be unstable"
            );
        }
    }
}

/// A prescribed velocity field (m/s) evaluated at physical positions (m).
#[typetag::serde(tag = "type")]
pub trait AnalyticVelocity: Debug + Send + Sync {
    /// Velocity component along `axis` at `position`.
    fn velocity(&self, axis: Axis, position: [FloatValue; 3]) -> FloatValue;
}

/// The same velocity everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformVelocity {
    pub velocity: [FloatValue; 3],
}

#[typetag::serde(name = "uniform")]
impl AnalyticVelocity for UniformVelocity {
    fn velocity(&self, axis: Axis, _position: [FloatValue; 3]) -> FloatValue {
        self.velocity[axis.index()]
    }
}

/// Solid-body rotation in the x-y plane.
///
/// `u = -omega (y - yc)`, `v = omega (x - xc)`. Because `u` depends on `y` only and `v`
/// on `x` only, the sampled face velocities are discretely divergence-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolidBodyRotation {
    /// Angular velocity (1/s).
    pub omega: FloatValue,
    /// Rotation centre (m).
    pub centre: [FloatValue; 2],
}

#[typetag::serde(name = "solid_body_rotation")]
impl AnalyticVelocity for SolidBodyRotation {
    fn velocity(&self, axis: Axis, [x, y, _]: [FloatValue; 3]) -> FloatValue {
        match axis {
            Axis::X => -self.omega * (y - self.centre[1]),
            Axis::Y => self.omega * (x - self.centre[0]),
            Axis::Z => 0.0,
        }
    }
}

/// Samples `velocity` on the faces of the cells of `ijk` and stores `v dt / d`.
///
/// Halos are then wrapped from the owned faces, so the two faces on either end of a
/// periodic axis see the same neighbourhood even where `velocity` itself is not periodic.
pub fn populate_courant_fields(
    velocity: &dyn AnalyticVelocity,
    grid: &Grid,
    ijk: &Idx,
    dt: FloatValue,
    courants: &mut CourantFields,
) -> IcicleResult<()> {
    for axis in grid.active_axes() {
        let scale = dt / grid.spacing(axis);
        let bounds = *courants.axis(axis).bounds();
        *courants.axis_mut(axis) = HaloArray::from_fn(bounds, |idx| {
            let position = Axis::ALL.map(|b| {
                if b == axis {
                    grid.face_position(b, idx[b.index()])
                } else {
                    grid.cell_centre(b, idx[b.index()])
                }
            });
            velocity.velocity(axis, position) * scale
        });
    }
    courants.fill_periodic(grid, ijk);
    courants.check_finite()
}

/// Variables whose ratio gives the velocity along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumRatio {
    /// Momentum-like variable (enters with power 1).
    pub numerator: String,
    /// Density-like variable (enters with power -1); absent means the numerator is the
    /// velocity itself.
    #[serde(default)]
    pub denominator: Option<String>,
}

impl MomentumRatio {
    pub fn new(numerator: &str, denominator: Option<&str>) -> Self {
        Self {
            numerator: numerator.to_string(),
            denominator: denominator.map(str::to_string),
        }
    }
}

/// Which variables the velocity along each axis is diagnosed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityMap {
    #[serde(default)]
    pub x: Option<MomentumRatio>,
    #[serde(default)]
    pub y: Option<MomentumRatio>,
    #[serde(default)]
    pub z: Option<MomentumRatio>,
}

impl VelocityMap {
    pub fn get(&self, axis: Axis) -> Option<&MomentumRatio> {
        match axis {
            Axis::X => self.x.as_ref(),
            Axis::Y => self.y.as_ref(),
            Axis::Z => self.z.as_ref(),
        }
    }

    pub fn with(mut self, axis: Axis, ratio: MomentumRatio) -> Self {
        match axis {
            Axis::X => self.x = Some(ratio),
            Axis::Y => self.y = Some(ratio),
            Axis::Z => self.z = Some(ratio),
        }
        self
    }

    /// Names of every variable that takes part in the diagnosis.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        Axis::ALL
            .into_iter()
            .filter_map(|a| self.get(a))
            .flat_map(|r| std::iter::once(r.numerator.as_str()).chain(r.denominator.as_deref()))
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedRatio {
    numerator: usize,
    denominator: Option<usize>,
}

/// Recomputes Courant fields from advected variables every step.
#[derive(Debug)]
pub struct CourantUpdater {
    ratios: [Option<ResolvedRatio>; 3],
    /// Cell-centred velocities at the previous step and at level `n`, per axis.
    velocities: [Option<[HaloArray; 2]>; 3],
}

impl CourantUpdater {
    pub fn new(map: &VelocityMap, fields: &FieldStore, grid: &Grid) -> IcicleResult<Self> {
        let resolve = |name: &str| -> IcicleResult<usize> {
            let e = fields
                .index_of(name)
                .ok_or_else(|| IcicleError::UnknownVariable(name.to_string()))?;
            let field = fields.field(e);
            if !field.is_dynamic() || field.history().is_none() {
                return Err(IcicleError::Config(format!(
                    "variable {} is used to diagnose velocities but is not flagged dynamic",
                    name
                )));
            }
            Ok(e)
        };

        let mut ratios = [None; 3];
        let mut velocities = [None, None, None];
        for axis in Axis::ALL {
            let Some(ratio) = map.get(axis) else {
                continue;
            };
            if grid.is_degenerate(axis) {
                continue;
            }
            let numerator = resolve(&ratio.numerator)?;
            let denominator = ratio.denominator.as_deref().map(resolve).transpose()?;
            let bounds = *fields.field(numerator).bounds();
            ratios[axis.index()] = Some(ResolvedRatio {
                numerator,
                denominator,
            });
            velocities[axis.index()] = Some([HaloArray::zeros(bounds), HaloArray::zeros(bounds)]);
        }
        Ok(Self { ratios, velocities })
    }

    /// Diagnoses Courant numbers at `n + 1/2` from levels `n` and the previous step.
    ///
    /// Cell velocities are extrapolated as `1.5 v(n) - 0.5 v(n-1)` and averaged onto the
    /// faces. Axes without a mapping keep their current Courant numbers.
    pub fn update(
        &mut self,
        fields: &FieldStore,
        grid: &Grid,
        dt: FloatValue,
        courants: &mut CourantFields,
    ) -> IcicleResult<()> {
        for axis in Axis::ALL {
            let (Some(ratio), Some([previous, now])) =
                (self.ratios[axis.index()], self.velocities[axis.index()].as_mut())
            else {
                continue;
            };

            let numerator = fields.field(ratio.numerator);
            let denominator = ratio.denominator.map(|e| fields.field(e));
            velocity_ratio(
                now,
                numerator.at(Level::Current),
                denominator.map(|f| f.at(Level::Current)),
                numerator.name(),
            )?;
            velocity_ratio(
                previous,
                numerator.history().unwrap_or(numerator.at(Level::Current)),
                denominator.map(|f| f.history().unwrap_or(f.at(Level::Current))),
                numerator.name(),
            )?;

            let scale = dt / grid.spacing(axis);
            let faces = *courants.axis(axis).bounds();
            let left = faces.shift(axis, -P_HALF);
            let right = faces.shift(axis, M_HALF);
            Zip::from(courants.axis_mut(axis).view_mut(&faces))
                .and(now.view(&left))
                .and(now.view(&right))
                .and(previous.view(&left))
                .and(previous.view(&right))
                .for_each(|c, &nl, &nr, &pl, &pr| {
                    *c = scale * 0.5 * ((1.5 * nl - 0.5 * pl) + (1.5 * nr - 0.5 * pr));
                });
        }
        courants.check_finite()
    }
}

/// `target = numerator / denominator`, with zero wherever the denominator is zero.
///
/// Zero density is physically valid (e.g. at domain edges during spin-up), so the zero
/// policy is not an error; non-finite inputs or results are.
fn velocity_ratio(
    target: &mut HaloArray,
    numerator: &HaloArray,
    denominator: Option<&HaloArray>,
    name: &str,
) -> IcicleResult<()> {
    let bounds = *target.bounds();
    let non_finite = |what: &str| IcicleError::NonFinite {
        what: format!("{} while diagnosing velocity from {}", what, name),
    };
    if !numerator.is_finite(&bounds) {
        return Err(non_finite("numerator"));
    }
    match denominator {
        None => target.assign(&bounds, &numerator.view(&bounds)),
        Some(denominator) => {
            if !denominator.is_finite(&bounds) {
                return Err(non_finite("denominator"));
            }
            Zip::from(target.view_mut(&bounds))
                .and(numerator.view(&bounds))
                .and(denominator.view(&bounds))
                .for_each(|q, &n, &d| *q = if d != 0.0 { n / d } else { 0.0 });
        }
    }
    if !target.is_finite(&bounds) {
        return Err(non_finite("velocity"));
    }
    Ok(())
}
