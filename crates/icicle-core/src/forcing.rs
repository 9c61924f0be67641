//! Right-hand-side (source/sink) terms.
//!
//! Each term contributes an explicit part, accumulated into a residual `R`, and an
//! implicit coefficient `C`. A forced field is updated as
//!
//! ```text
//! psi += dt * R
//! psi /= 1 - dt * sum(C)      (only when sum(C) != 0)
//! ```
//!
//! which linearises restoring-force-like terms so that they stay stable for any `dt`.

use crate::equations::{AuxFields, VariableSpec};
use crate::errors::{IcicleError, IcicleResult};
use crate::field::{FieldStore, Level};
use crate::FloatValue;
use ndarray::{Array3, ArrayView3, ArrayViewMut3, Zip};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::trace;

/// Read access to the model state while residuals are evaluated.
pub struct RhsState<'a> {
    pub fields: &'a FieldStore,
    pub aux: &'a AuxFields,
    /// Level the residuals are evaluated at.
    pub level: Level,
}

impl<'a> RhsState<'a> {
    /// Owned range of variable `name` at the evaluated level.
    pub fn psi(&self, name: &str) -> IcicleResult<ArrayView3<'a, FloatValue>> {
        Ok(self.fields.require(name)?.owned(self.level))
    }

    /// An auxiliary field over the owned range.
    pub fn aux(&self, name: &str) -> IcicleResult<ArrayView3<'a, FloatValue>> {
        let arr = self.aux.require(name)?;
        Ok(arr.view(arr.bounds()))
    }
}

/// A right-hand-side term of one variable.
#[typetag::serde(tag = "type")]
pub trait RhsTerm: Debug + Send + Sync {
    /// Adds this term's explicit tendency (per second) to `residual`.
    fn explicit_part(
        &self,
        residual: ArrayViewMut3<'_, FloatValue>,
        state: &RhsState<'_>,
        dt: FloatValue,
    ) -> IcicleResult<()>;

    /// Coefficient `C` of the implicit part `C * psi`.
    fn implicit_part(&self, _dt: FloatValue) -> FloatValue {
        0.0
    }
}

/// Constant source `dpsi/dt = rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantSource {
    pub rate: FloatValue,
}

#[typetag::serde(name = "constant_source")]
impl RhsTerm for ConstantSource {
    fn explicit_part(
        &self,
        mut residual: ArrayViewMut3<'_, FloatValue>,
        _state: &RhsState<'_>,
        _dt: FloatValue,
    ) -> IcicleResult<()> {
        residual += self.rate;
        Ok(())
    }
}

/// Linear decay `dpsi/dt = -rate * psi`, treated implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearDecay {
    pub rate: FloatValue,
}

#[typetag::serde(name = "linear_decay")]
impl RhsTerm for LinearDecay {
    fn explicit_part(
        &self,
        _residual: ArrayViewMut3<'_, FloatValue>,
        _state: &RhsState<'_>,
        _dt: FloatValue,
    ) -> IcicleResult<()> {
        Ok(())
    }

    fn implicit_part(&self, _dt: FloatValue) -> FloatValue {
        -self.rate
    }
}

/// Residual buffers and the forcing update for every inhomogeneous field.
#[derive(Debug, Clone)]
pub struct ForcingApplier {
    /// `None` for homogeneous fields, which are never forced.
    residuals: Vec<Option<Array3<FloatValue>>>,
}

impl ForcingApplier {
    pub fn new(variables: &[VariableSpec], fields: &FieldStore) -> Self {
        let residuals = variables
            .iter()
            .zip(fields.iter())
            .map(|(spec, field)| {
                (!spec.is_homogeneous()).then(|| Array3::zeros(field.ijk().shape()))
            })
            .collect();
        Self { residuals }
    }

    pub fn residual(&self, e: usize) -> Option<&Array3<FloatValue>> {
        self.residuals.get(e).and_then(Option::as_ref)
    }

    /// Re-evaluates every residual at `level`.
    ///
    /// All residuals are computed before any field is forced, so coupled terms see a
    /// single consistent state.
    pub fn update(
        &mut self,
        variables: &[VariableSpec],
        fields: &FieldStore,
        aux: &AuxFields,
        level: Level,
        dt: FloatValue,
    ) -> IcicleResult<()> {
        let state = RhsState { fields, aux, level };
        for (e, (spec, residual)) in variables.iter().zip(self.residuals.iter_mut()).enumerate() {
            let Some(residual) = residual.as_mut() else {
                continue;
            };
            residual.fill(0.0);
            for term in spec.rhs_terms.iter() {
                term.explicit_part(residual.view_mut(), &state, dt)?;
            }
            if !residual.iter().all(|v| v.is_finite()) {
                return Err(IcicleError::NonFinite {
                    what: format!("residual of {}", fields.field(e).name()),
                });
            }
        }
        Ok(())
    }

    /// Applies the residuals and implicit coefficients to `level` of every forced field.
    pub fn apply(
        &self,
        variables: &[VariableSpec],
        fields: &mut FieldStore,
        level: Level,
        dt: FloatValue,
    ) -> IcicleResult<()> {
        for (e, (spec, residual)) in variables.iter().zip(self.residuals.iter()).enumerate() {
            let Some(residual) = residual.as_ref() else {
                continue;
            };
            let field = fields.field_mut(e);
            let ijk = *field.ijk();
            let mut psi = field.at_mut(level).view_mut(&ijk);
            Zip::from(&mut psi)
                .and(residual)
                .for_each(|psi, &r| *psi += dt * r);

            let implicit: FloatValue = spec.rhs_terms.iter().map(|t| t.implicit_part(dt)).sum();
            if implicit != 0.0 {
                let denominator = 1.0 - dt * implicit;
                if !(denominator.is_finite() && denominator != 0.0) {
                    return Err(IcicleError::NonFinite {
                        what: format!("implicit forcing coefficient of {}", spec.name),
                    });
                }
                psi /= denominator;
            }
            trace!(field = spec.name.as_str(), implicit, "applied forcing");
        }
        Ok(())
    }
}
