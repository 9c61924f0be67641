//! A coupled harmonic oscillator expressed as an icicle equation system.
//!
//! ```text
//! dpsi/dt = +omega * phi
//! dphi/dt = -omega * psi
//! ```
//!
//! Each equation carries a single restoring-force term with an explicit part
//! `omega_signed * partner` and an implicit part `-dt * omega^2`. With forcing applied
//! semi-implicitly the amplitude decays by `1 / sqrt(1 + (omega dt)^2)` per step instead
//! of growing as it would under a purely explicit update, while the phase advances by
//! `atan(omega dt)`. This makes the system a compact check of the forcing applier.

use icicle_core::equations::{EquationSystem, VariableSpec};
use icicle_core::errors::IcicleResult;
use icicle_core::forcing::{RhsState, RhsTerm};
use icicle_core::FloatValue;
use ndarray::ArrayViewMut3;
use serde::{Deserialize, Serialize};

/// Restoring force coupling one variable to its partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoringForce {
    /// Signed angular frequency (1/s).
    pub omega_signed: FloatValue,
    /// The variable the force is proportional to.
    pub partner: String,
}

impl RestoringForce {
    pub fn new(omega: FloatValue, sign: FloatValue, partner: &str) -> Self {
        Self {
            omega_signed: sign * omega,
            partner: partner.to_string(),
        }
    }
}

#[typetag::serde(name = "restoring_force")]
impl RhsTerm for RestoringForce {
    fn explicit_part(
        &self,
        mut residual: ArrayViewMut3<'_, FloatValue>,
        state: &RhsState<'_>,
        _dt: FloatValue,
    ) -> IcicleResult<()> {
        let partner = state.psi(&self.partner)?;
        residual.scaled_add(self.omega_signed, &partner);
        Ok(())
    }

    fn implicit_part(&self, dt: FloatValue) -> FloatValue {
        -dt * self.omega_signed.powi(2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonicOscillatorParameters {
    /// Angular frequency (1/s).
    pub omega: FloatValue,
}

impl Default for HarmonicOscillatorParameters {
    fn default() -> Self {
        Self { omega: 1.0 }
    }
}

/// The two-variable oscillator `psi`, `phi`.
#[derive(Debug)]
pub struct HarmonicOscillator {
    pub parameters: HarmonicOscillatorParameters,
    variables: Vec<VariableSpec>,
}

impl HarmonicOscillator {
    pub fn from_parameters(parameters: HarmonicOscillatorParameters) -> Self {
        let omega = parameters.omega;
        let variables = vec![
            VariableSpec::new("psi")
                .signed()
                .with_description("1st variable")
                .with_unit("dimensionless")
                .with_rhs_term(Box::new(RestoringForce::new(omega, 1.0, "phi"))),
            VariableSpec::new("phi")
                .signed()
                .with_description("2nd variable")
                .with_unit("dimensionless")
                .with_rhs_term(Box::new(RestoringForce::new(omega, -1.0, "psi"))),
        ];
        Self {
            parameters,
            variables,
        }
    }
}

impl Default for HarmonicOscillator {
    fn default() -> Self {
        Self::from_parameters(HarmonicOscillatorParameters::default())
    }
}

impl EquationSystem for HarmonicOscillator {
    fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_terms_are_antisymmetric() {
        let system =
            HarmonicOscillator::from_parameters(HarmonicOscillatorParameters { omega: 2.0 });
        let [psi, phi] = [&system.variables()[0], &system.variables()[1]];
        assert_eq!(psi.name, "psi");
        assert_eq!(phi.name, "phi");
        assert!(!psi.positive_definite && !phi.positive_definite);
        assert_relative_eq!(psi.rhs_terms[0].implicit_part(0.5), -2.0);
        assert_relative_eq!(phi.rhs_terms[0].implicit_part(0.5), -2.0);
    }

    #[test]
    fn test_restoring_force_serde() {
        let term: Box<dyn RhsTerm> = Box::new(RestoringForce::new(1.5, -1.0, "psi"));
        let json = serde_json::to_string(&term).unwrap();
        assert_eq!(
            json,
            r#"{"type":"restoring_force","omega_signed":-1.5,"partner":"psi"}"#
        );
        let back: Box<dyn RhsTerm> = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(back.implicit_part(1.0), -2.25);
    }
}
