//! The equation-system collaborator.
//!
//! An equation system declares the advected variables (with their right-hand-side
//! terms), auxiliary diagnostic fields and, for diagnosed velocities, which variables
//! the velocity is derived from. After forcing each step the driver hands it mutable
//! access to every field through [`Adjustment`] (e.g. for condensation or
//! sedimentation).

use crate::array::HaloArray;
use crate::courant::{CourantFields, VelocityMap};
use crate::errors::{IcicleError, IcicleResult};
use crate::field::{FieldStore, Level};
use crate::forcing::RhsTerm;
use crate::grid::{Grid, Idx};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

fn default_positive_definite() -> bool {
    true
}

/// Declaration of one advected variable.
#[derive(Debug, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    /// Takes part in velocity diagnosis (needs a wider halo and a history snapshot).
    #[serde(default)]
    pub dynamic: bool,
    /// Never negative. Signed variables (momenta, anomalies) get the MPDATA correction
    /// computed from magnitudes instead.
    #[serde(default = "default_positive_definite")]
    pub positive_definite: bool,
    #[serde(default)]
    pub rhs_terms: Vec<Box<dyn RhsTerm>>,
}

impl VariableSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            unit: String::new(),
            dynamic: false,
            positive_definite: true,
            rhs_terms: vec![],
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Marks the variable as taking either sign.
    pub fn signed(mut self) -> Self {
        self.positive_definite = false;
        self
    }

    pub fn with_rhs_term(mut self, term: Box<dyn RhsTerm>) -> Self {
        self.rhs_terms.push(term);
        self
    }

    /// A variable without right-hand-side terms skips forcing entirely.
    pub fn is_homogeneous(&self) -> bool {
        self.rhs_terms.is_empty()
    }
}

/// Declaration of an auxiliary (non-advected) field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxSpec {
    pub name: String,
    /// Seeded once by the initial condition and never touched by the core.
    #[serde(default)]
    pub constant: bool,
    /// Recorded alongside the advected fields.
    #[serde(default)]
    pub output: bool,
}

impl AuxSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constant: false,
            output: false,
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn output(mut self) -> Self {
        self.output = true;
        self
    }
}

/// Auxiliary fields over the owned range (no halo, single time level).
#[derive(Debug, Clone, Default)]
pub struct AuxFields {
    specs: Vec<AuxSpec>,
    data: Vec<HaloArray>,
}

impl AuxFields {
    pub fn new(specs: &[AuxSpec], ijk: &Idx) -> IcicleResult<Self> {
        let mut aux = Self::default();
        for spec in specs {
            if aux.index_of(&spec.name).is_some() {
                return Err(IcicleError::DuplicateVariable(spec.name.clone()));
            }
            aux.specs.push(spec.clone());
            aux.data.push(HaloArray::zeros(*ijk));
        }
        Ok(aux)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&HaloArray> {
        self.index_of(name).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut HaloArray> {
        self.index_of(name).map(move |i| &mut self.data[i])
    }

    pub fn require(&self, name: &str) -> IcicleResult<&HaloArray> {
        self.get(name)
            .ok_or_else(|| IcicleError::UnknownVariable(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AuxSpec, &HaloArray)> {
        self.specs.iter().zip(self.data.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&AuxSpec, &mut HaloArray)> {
        self.specs.iter().zip(self.data.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Everything an equation system may touch between forcing and cycling.
///
/// Contents may be modified in place; shapes and halo widths may not.
pub struct Adjustment<'a> {
    /// The freshly advected and forced level.
    pub level: Level,
    pub fields: &'a mut FieldStore,
    pub aux: &'a mut AuxFields,
    pub courants: &'a mut CourantFields,
    pub grid: &'a Grid,
    pub dt: FloatValue,
}

/// The physics wrapped around the advection core.
pub trait EquationSystem: Debug + Send {
    /// Advected variables, in the order they are advected.
    fn variables(&self) -> &[VariableSpec];

    fn aux_fields(&self) -> Vec<AuxSpec> {
        vec![]
    }

    /// Variables velocities are diagnosed from, when velocity is not prescribed.
    fn velocity_map(&self) -> VelocityMap {
        VelocityMap::default()
    }

    /// Called once per step after forcing.
    fn adjustments(&mut self, _adjustment: &mut Adjustment<'_>) -> IcicleResult<()> {
        Ok(())
    }
}

/// Passive tracers: advected, optionally forced, never adjusted.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TracerSystem {
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub aux: Vec<AuxSpec>,
    #[serde(default)]
    pub velocity: VelocityMap,
}

impl TracerSystem {
    pub fn new(variables: Vec<VariableSpec>) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn with_aux(mut self, aux: AuxSpec) -> Self {
        self.aux.push(aux);
        self
    }

    pub fn with_velocity_map(mut self, velocity: VelocityMap) -> Self {
        self.velocity = velocity;
        self
    }
}

impl EquationSystem for TracerSystem {
    fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    fn aux_fields(&self) -> Vec<AuxSpec> {
        self.aux.clone()
    }

    fn velocity_map(&self) -> VelocityMap {
        self.velocity.clone()
    }
}
