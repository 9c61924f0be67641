//! Advected fields and their time-level banks.
//!
//! Each field owns `time_levels` storage slots. A rolling `current` slot marks level `n`;
//! levels `n + 1` and `n - 1` are found modulo `time_levels`. Cycling relabels the slots
//! instead of copying their contents:
//!
//! - 2 levels (upstream, MPDATA): swap `(n, n + 1)`
//! - 3 levels (leapfrog): rotate `(n - 1, n, n + 1) -> (n, n + 1, n - 1)`
//!
//! Both reduce to advancing `current` by one slot. Anything holding a reference into a
//! level must re-fetch it after a cycle, which the borrow checker enforces.

use crate::array::HaloArray;
use crate::errors::{IcicleError, IcicleResult};
use crate::grid::{Grid, Idx};
use crate::FloatValue;
use ndarray::ArrayView3;

/// A time level relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// `n - 1`, only present for three-level schemes.
    Previous,
    /// `n`
    Current,
    /// `n + 1`, the level being computed.
    Next,
}

impl Level {
    pub fn offset(self) -> isize {
        match self {
            Level::Previous => -1,
            Level::Current => 0,
            Level::Next => 1,
        }
    }
}

/// Simultaneous access to the levels read and written by one advection pass.
pub struct LevelsMut<'a> {
    pub previous: Option<&'a HaloArray>,
    pub current: &'a HaloArray,
    pub next: &'a mut HaloArray,
}

/// A named advected quantity.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    levels: Vec<HaloArray>,
    current: usize,
    halo: usize,
    ijk: Idx,
    dynamic: bool,
    /// Snapshot of level `n` from the previous step, kept for velocity diagnosis.
    history: Option<HaloArray>,
}

impl Field {
    /// Allocates `time_levels` zeroed arrays covering `ijk` plus `halo`.
    ///
    /// `keep_history` allocates the previous-step snapshot used when velocities are
    /// diagnosed from this field.
    pub fn new(
        name: &str,
        grid: &Grid,
        ijk: Idx,
        time_levels: usize,
        halo: usize,
        dynamic: bool,
        keep_history: bool,
    ) -> IcicleResult<Self> {
        if !(2..=3).contains(&time_levels) {
            return Err(IcicleError::UnsupportedTimeLevels(time_levels));
        }
        for axis in grid.active_axes() {
            let extent = ijk.span(axis).len();
            if halo > extent {
                return Err(IcicleError::HaloExceedsExtent {
                    axis,
                    halo,
                    extent,
                });
            }
        }

        let bounds = grid.rng_sclr_idx(&ijk, halo);
        Ok(Self {
            name: name.to_string(),
            levels: (0..time_levels).map(|_| HaloArray::zeros(bounds)).collect(),
            current: 0,
            halo,
            ijk,
            dynamic,
            history: keep_history.then(|| HaloArray::zeros(bounds)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn halo(&self) -> usize {
        self.halo
    }

    /// The owned (halo-free) index range.
    pub fn ijk(&self) -> &Idx {
        &self.ijk
    }

    /// The storage range including the halo.
    pub fn bounds(&self) -> &Idx {
        self.levels[0].bounds()
    }

    pub fn time_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Storage slot currently labelled `level`.
    pub fn slot(&self, level: Level) -> usize {
        assert!(
            level != Level::Previous || self.time_levels() == 3,
            "field {} has no previous time level with {} time levels",
            self.name,
            self.time_levels()
        );
        let t = self.time_levels() as isize;
        (self.current as isize + level.offset()).rem_euclid(t) as usize
    }

    pub fn at(&self, level: Level) -> &HaloArray {
        &self.levels[self.slot(level)]
    }

    pub fn at_mut(&mut self, level: Level) -> &mut HaloArray {
        let slot = self.slot(level);
        &mut self.levels[slot]
    }

    /// Owned-range view of `level`.
    pub fn owned(&self, level: Level) -> ArrayView3<'_, FloatValue> {
        self.at(level).view(&self.ijk)
    }

    /// Borrows the levels read by an advection pass together with the level it writes.
    pub fn levels_mut(&mut self) -> LevelsMut<'_> {
        let current_slot = self.slot(Level::Current);
        let next_slot = self.slot(Level::Next);
        let previous_slot = (self.time_levels() == 3).then(|| self.slot(Level::Previous));

        let mut previous = None;
        let mut current = None;
        let mut next = None;
        for (slot, arr) in self.levels.iter_mut().enumerate() {
            if slot == next_slot {
                next = Some(arr);
            } else if slot == current_slot {
                current = Some(&*arr);
            } else if Some(slot) == previous_slot {
                previous = Some(&*arr);
            }
        }
        match (current, next) {
            (Some(current), Some(next)) => LevelsMut {
                previous,
                current,
                next,
            },
            _ => unreachable!("current and next time levels occupy distinct slots"),
        }
    }

    /// Relabels the storage slots after a completed step or pass.
    pub fn cycle(&mut self) {
        self.current = (self.current + 1) % self.time_levels();
    }

    /// Copies the full contents (halo included) of one level into another.
    pub fn copy(&mut self, from: Level, to: Level) {
        let (from, to) = (self.slot(from), self.slot(to));
        if from == to {
            return;
        }
        let source = self.levels[from].clone();
        self.levels[to].copy_from(&source);
    }

    /// Copies level `n` into every other level.
    pub fn broadcast_current(&mut self) {
        let source = self.at(Level::Current).clone();
        for arr in self.levels.iter_mut() {
            arr.copy_from(&source);
        }
    }

    /// The previous-step snapshot, if this field keeps one.
    pub fn history(&self) -> Option<&HaloArray> {
        self.history.as_ref()
    }

    /// Stores level `n` as the previous-step snapshot.
    pub fn stash_history(&mut self) {
        let current = self.slot(Level::Current);
        if let Some(history) = self.history.as_mut() {
            history.copy_from(&self.levels[current]);
        }
    }

    pub fn sum(&self, level: Level) -> FloatValue {
        self.at(level).sum(&self.ijk)
    }
}

/// The ordered set of advected fields of one (sub)domain.
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    fields: Vec<Field>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field) -> IcicleResult<usize> {
        if self.index_of(field.name()).is_some() {
            return Err(IcicleError::DuplicateVariable(field.name().to_string()));
        }
        self.fields.push(field);
        Ok(self.fields.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    pub fn field(&self, e: usize) -> &Field {
        &self.fields[e]
    }

    pub fn field_mut(&mut self, e: usize) -> &mut Field {
        &mut self.fields[e]
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Looks up a field by name, failing with `UnknownVariable`.
    pub fn require(&self, name: &str) -> IcicleResult<&Field> {
        self.get(name)
            .ok_or_else(|| IcicleError::UnknownVariable(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    /// Largest halo over all fields.
    pub fn max_halo(&self) -> usize {
        self.fields.iter().map(Field::halo).max().unwrap_or(0)
    }
}
