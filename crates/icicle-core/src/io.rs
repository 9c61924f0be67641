//! Initial-condition and output collaborators.

use crate::errors::IcicleResult;
use crate::grid::Idx;
use crate::FloatValue;
use ndarray::{ArrayView3, ArrayViewMut3};
use serde::Serialize;

/// Seeds fields at start-up.
pub trait InitialCondition {
    /// Fills `target` (the owned range `idx` of field `name`) with its initial state.
    fn populate_scalar_field(
        &self,
        name: &str,
        idx: &Idx,
        target: ArrayViewMut3<'_, FloatValue>,
    ) -> IcicleResult<()>;
}

/// Any `Fn(name, [i, j, k]) -> value` is an initial condition.
impl<F> InitialCondition for F
where
    F: Fn(&str, [isize; 3]) -> FloatValue,
{
    fn populate_scalar_field(
        &self,
        name: &str,
        idx: &Idx,
        mut target: ArrayViewMut3<'_, FloatValue>,
    ) -> IcicleResult<()> {
        let origin = [idx.i.first, idx.j.first, idx.k.first];
        target.indexed_iter_mut().for_each(|((a, b, c), value)| {
            *value = self(
                name,
                [
                    origin[0] + a as isize,
                    origin[1] + b as isize,
                    origin[2] + c as isize,
                ],
            );
        });
        Ok(())
    }
}

/// An opaque sink for snapshots of the model state.
pub trait Output {
    fn record(
        &mut self,
        name: &str,
        data: ArrayView3<'_, FloatValue>,
        idx: &Idx,
        timestep: usize,
    ) -> IcicleResult<()>;
}

/// One recorded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub timestep: usize,
    pub idx: Idx,
    /// Values in row-major (i, j, k) order.
    pub values: Vec<FloatValue>,
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryOutput {
    pub records: Vec<Record>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of field `name`, in the order they were written.
    pub fn series<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.name == name)
    }

    /// The most recent record of field `name`.
    pub fn last(&self, name: &str) -> Option<&Record> {
        self.records.iter().rev().find(|r| r.name == name)
    }
}

impl Output for MemoryOutput {
    fn record(
        &mut self,
        name: &str,
        data: ArrayView3<'_, FloatValue>,
        idx: &Idx,
        timestep: usize,
    ) -> IcicleResult<()> {
        self.records.push(Record {
            name: name.to_string(),
            timestep,
            idx: *idx,
            values: data.iter().copied().collect(),
        });
        Ok(())
    }
}
