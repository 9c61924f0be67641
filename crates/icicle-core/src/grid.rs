//! Staggered (Arakawa-C) grid geometry.
//!
//! Scalars live at cell centres; each velocity component lives on the cell faces normal
//! to its direction, half a cell away from the scalar points.
//!
//! Face `i - 1/2` is stored at index `i`, so that every stencil addresses the faces
//! bounding cell `i` as `i + P_HALF` and `i - M_HALF`. A velocity array is therefore
//! one element wider than the scalar array along its own axis.

use crate::errors::{IcicleError, IcicleResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, RangeInclusive, Sub};

/// Offset from a cell index to the index of its upper face (`i + 1/2`).
pub const P_HALF: isize = 1;
/// Offset from a cell index to the index of its lower face (`i - 1/2`).
pub const M_HALF: isize = 0;

/// A spatial axis of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes normal to this one, in cyclic order.
    pub fn transverse(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::Z, Axis::X],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }

    /// Reorders an `(i, j, k)` triple so the component along this axis comes first,
    /// followed by the transverse components in cyclic order (`ijk`, `jki`, `kij`).
    pub fn permute<T>(self, [i, j, k]: [T; 3]) -> [T; 3] {
        match self {
            Axis::X => [i, j, k],
            Axis::Y => [j, k, i],
            Axis::Z => [k, i, j],
        }
    }

    /// Inverse of [`Axis::permute`].
    pub fn unpermute<T>(self, [a, b, c]: [T; 3]) -> [T; 3] {
        match self {
            Axis::X => [a, b, c],
            Axis::Y => [c, a, b],
            Axis::Z => [b, c, a],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        write!(f, "{}", name)
    }
}

/// An inclusive range of logical indices along one axis.
///
/// Indices are signed so that halo cells left of the owned region (`-1`, `-2`, ...)
/// can be addressed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub first: isize,
    pub last: isize,
}

impl Span {
    pub fn new(first: isize, last: isize) -> Self {
        debug_assert!(last >= first, "empty span {}..={}", first, last);
        Self { first, last }
    }

    pub fn single(index: isize) -> Self {
        Self::new(index, index)
    }

    pub fn len(&self) -> usize {
        (self.last - self.first + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    /// Extends the span by `by` cells on both sides.
    pub fn widen(self, by: usize) -> Self {
        let by = by as isize;
        Self::new(self.first - by, self.last + by)
    }

    pub fn contains(&self, other: &Span) -> bool {
        other.first >= self.first && other.last <= self.last
    }

    /// Maps the span onto `[0, modulus)` under cyclic wrap.
    ///
    /// Only meaningful for spans that do not straddle a multiple of `modulus`,
    /// which holds for any halo no wider than the domain.
    pub fn wrap(self, modulus: usize) -> Self {
        let m = modulus as isize;
        Self::new(self.first.rem_euclid(m), self.last.rem_euclid(m))
    }

    pub fn iter(&self) -> RangeInclusive<isize> {
        self.first..=self.last
    }
}

impl Add<isize> for Span {
    type Output = Span;

    fn add(self, rhs: isize) -> Span {
        Span::new(self.first + rhs, self.last + rhs)
    }
}

impl Sub<isize> for Span {
    type Output = Span;

    fn sub(self, rhs: isize) -> Span {
        Span::new(self.first - rhs, self.last - rhs)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

/// A 3D block of logical indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Idx {
    pub i: Span,
    pub j: Span,
    pub k: Span,
}

impl Idx {
    pub fn new(i: Span, j: Span, k: Span) -> Self {
        Self { i, j, k }
    }

    /// Builds an index block from spans ordered along `axis` first (see [`Axis::permute`]).
    pub fn from_permuted(axis: Axis, spans: [Span; 3]) -> Self {
        let [i, j, k] = axis.unpermute(spans);
        Self { i, j, k }
    }

    pub fn spans(&self) -> [Span; 3] {
        [self.i, self.j, self.k]
    }

    pub fn span(&self, axis: Axis) -> Span {
        self.spans()[axis.index()]
    }

    pub fn with(&self, axis: Axis, span: Span) -> Self {
        let mut spans = self.spans();
        spans[axis.index()] = span;
        let [i, j, k] = spans;
        Self { i, j, k }
    }

    /// Shifts the block by `by` cells along `axis`.
    pub fn shift(&self, axis: Axis, by: isize) -> Self {
        self.with(axis, self.span(axis) + by)
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.i.len(), self.j.len(), self.k.len()]
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, other: &Idx) -> bool {
        self.i.contains(&other.i) && self.j.contains(&other.j) && self.k.contains(&other.k)
    }
}

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// Extents and spacing of a structured grid.
///
/// Immutable once constructed. Axes with extent 1 are degenerate: they never receive
/// halo padding, which lets 1D and 2D runs share the 3D code paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub nx: usize,
    #[serde(default = "default_extent")]
    pub ny: usize,
    #[serde(default = "default_extent")]
    pub nz: usize,
    /// Cell sizes along x, y and z (m).
    #[serde(default = "default_spacing")]
    pub spacing: [FloatValue; 3],
}

fn default_extent() -> usize {
    1
}

fn default_spacing() -> [FloatValue; 3] {
    [1.0; 3]
}

impl Grid {
    pub fn new(nx: usize, ny: usize, nz: usize) -> IcicleResult<Self> {
        Self::with_spacing(nx, ny, nz, default_spacing())
    }

    pub fn with_spacing(
        nx: usize,
        ny: usize,
        nz: usize,
        spacing: [FloatValue; 3],
    ) -> IcicleResult<Self> {
        let grid = Self {
            nx,
            ny,
            nz,
            spacing,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Checks extents and spacing, e.g. after deserialisation.
    pub fn validate(&self) -> IcicleResult<()> {
        for axis in Axis::ALL {
            if self.extent(axis) == 0 {
                return Err(IcicleError::InvalidGrid(format!(
                    "extent in {} must be at least 1",
                    axis
                )));
            }
            let d = self.spacing(axis);
            if !(d.is_finite() && d > 0.0) {
                return Err(IcicleError::InvalidGrid(format!(
                    "spacing in {} must be positive, got {}",
                    axis, d
                )));
            }
        }
        Ok(())
    }

    pub fn extent(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.nx,
            Axis::Y => self.ny,
            Axis::Z => self.nz,
        }
    }

    pub fn extents(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub fn spacing(&self, axis: Axis) -> FloatValue {
        self.spacing[axis.index()]
    }

    pub fn is_degenerate(&self, axis: Axis) -> bool {
        self.extent(axis) == 1
    }

    /// Axes along which stencils are evaluated.
    pub fn active_axes(&self) -> impl Iterator<Item = Axis> + '_ {
        Axis::ALL.into_iter().filter(|&a| !self.is_degenerate(a))
    }

    /// The owned scalar range of a single-domain run.
    pub fn domain(&self) -> Idx {
        Idx::new(
            Span::new(0, self.nx as isize - 1),
            Span::new(0, self.ny as isize - 1),
            Span::new(0, self.nz as isize - 1),
        )
    }

    /// Halo widths per axis: `halo` on non-degenerate axes, zero otherwise.
    pub fn halo_widths(&self, halo: usize) -> [usize; 3] {
        Axis::ALL.map(|a| if self.is_degenerate(a) { 0 } else { halo })
    }

    /// Storage range of scalar points along `axis`, including the halo.
    pub fn rng_sclr(&self, axis: Axis, span: Span, halo: usize) -> Span {
        span.widen(self.halo_widths(halo)[axis.index()])
    }

    /// Storage range of scalar points, including the halo on non-degenerate axes.
    pub fn rng_sclr_idx(&self, ijk: &Idx, halo: usize) -> Idx {
        Idx::new(
            self.rng_sclr(Axis::X, ijk.i, halo),
            self.rng_sclr(Axis::Y, ijk.j, halo),
            self.rng_sclr(Axis::Z, ijk.k, halo),
        )
    }

    /// Face range bounding the cells of `span` along a staggered axis.
    pub fn rng_faces(span: Span) -> Span {
        Span::new(span.first - M_HALF, span.last + P_HALF)
    }

    /// Storage range of the velocity points staggered along `axis` for the cells of
    /// `ijk`, including the halo.
    pub fn rng_vctr(&self, axis: Axis, ijk: &Idx, halo: usize) -> Idx {
        let widths = self.halo_widths(halo);
        let scalar = self.rng_sclr_idx(ijk, halo);
        scalar.with(
            axis,
            Self::rng_faces(ijk.span(axis)).widen(widths[axis.index()]),
        )
    }

    /// Position of cell centre `i` along `axis` (m).
    pub fn cell_centre(&self, axis: Axis, i: isize) -> FloatValue {
        (i as FloatValue + 0.5) * self.spacing(axis)
    }

    /// Position of the face stored at index `f` along `axis` (m).
    pub fn face_position(&self, axis: Axis, f: isize) -> FloatValue {
        (f - M_HALF) as FloatValue * self.spacing(axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permute_roundtrip() {
        for axis in Axis::ALL {
            let p = axis.permute([1, 2, 3]);
            assert_eq!(p[0], [1, 2, 3][axis.index()]);
            assert_eq!(axis.unpermute(p), [1, 2, 3]);
        }
        assert_eq!(Axis::Y.permute(['i', 'j', 'k']), ['j', 'k', 'i']);
        assert_eq!(Axis::Z.permute(['i', 'j', 'k']), ['k', 'i', 'j']);
    }

    #[test]
    fn test_degenerate_axes_get_no_halo() {
        let grid = Grid::new(10, 1, 5).unwrap();
        let padded = grid.rng_sclr_idx(&grid.domain(), 2);
        assert_eq!(padded.i, Span::new(-2, 11));
        assert_eq!(padded.j, Span::new(0, 0));
        assert_eq!(padded.k, Span::new(-2, 6));
    }

    #[test]
    fn test_velocity_range_is_one_wider() {
        let grid = Grid::new(4, 3, 1).unwrap();
        let ijk = grid.domain();
        for axis in grid.active_axes() {
            let faces = grid.rng_vctr(axis, &ijk, 0);
            assert_eq!(faces.span(axis).len(), ijk.span(axis).len() + 1);
            for t in axis.transverse() {
                assert_eq!(faces.span(t), ijk.span(t));
            }
        }
        let cx = grid.rng_vctr(Axis::X, &ijk, 1);
        assert_eq!(cx.i, Span::new(-1, 5));
        assert_eq!(cx.j, Span::new(-1, 3));
        assert_eq!(cx.k, Span::new(0, 0));
    }

    #[test]
    fn test_half_cell_offsets_address_bounding_faces() {
        let grid = Grid::with_spacing(8, 1, 1, [2.0, 1.0, 1.0]).unwrap();
        let i = 3;
        let centre = grid.cell_centre(Axis::X, i);
        let upper = grid.face_position(Axis::X, i + P_HALF);
        let lower = grid.face_position(Axis::X, i - M_HALF);
        assert_eq!(upper - centre, 1.0);
        assert_eq!(centre - lower, 1.0);
    }

    #[test]
    fn test_span_wrap() {
        assert_eq!(Span::new(-2, -1).wrap(10), Span::new(8, 9));
        assert_eq!(Span::new(10, 11).wrap(10), Span::new(0, 1));
        assert_eq!(Span::new(3, 4).wrap(10), Span::new(3, 4));
    }

    #[test]
    fn test_invalid_grid() {
        assert!(matches!(
            Grid::new(0, 1, 1),
            Err(IcicleError::InvalidGrid(_))
        ));
        assert!(Grid::with_spacing(4, 4, 1, [1.0, -1.0, 1.0]).is_err());
    }
}
