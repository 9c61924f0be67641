//! Dense 3D storage addressed by logical indices.

use crate::grid::{Idx, Span};
use crate::FloatValue;
use ndarray::{s, Array3, ArrayView3, ArrayViewMut3};

/// A 3D array whose storage covers a block of logical indices, halo included.
///
/// Logical indices may be negative (left halos). Requesting a block outside the
/// storage bounds is a programming error and panics, rather than letting a negative
/// offset silently count from the end of the storage.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloArray {
    data: Array3<FloatValue>,
    bounds: Idx,
}

impl HaloArray {
    pub fn zeros(bounds: Idx) -> Self {
        Self {
            data: Array3::zeros(bounds.shape()),
            bounds,
        }
    }

    pub fn from_elem(bounds: Idx, value: FloatValue) -> Self {
        Self {
            data: Array3::from_elem(bounds.shape(), value),
            bounds,
        }
    }

    /// Builds an array by evaluating `f` at every logical index of `bounds`.
    pub fn from_fn<F>(bounds: Idx, f: F) -> Self
    where
        F: Fn([isize; 3]) -> FloatValue,
    {
        let origin = [bounds.i.first, bounds.j.first, bounds.k.first];
        let data = Array3::from_shape_fn(bounds.shape(), |(a, b, c)| {
            f([
                origin[0] + a as isize,
                origin[1] + b as isize,
                origin[2] + c as isize,
            ])
        });
        Self { data, bounds }
    }

    /// Logical index block covered by the storage.
    pub fn bounds(&self) -> &Idx {
        &self.bounds
    }

    fn offsets(&self, idx: &Idx) -> [(isize, isize); 3] {
        assert!(
            self.bounds.contains(idx),
            "index block {} outside array bounds {}",
            idx,
            self.bounds
        );
        let offset =
            |span: Span, origin: Span| (span.first - origin.first, span.last - origin.first);
        [
            offset(idx.i, self.bounds.i),
            offset(idx.j, self.bounds.j),
            offset(idx.k, self.bounds.k),
        ]
    }

    pub fn view(&self, idx: &Idx) -> ArrayView3<'_, FloatValue> {
        let [(i0, i1), (j0, j1), (k0, k1)] = self.offsets(idx);
        self.data.slice(s![i0..=i1, j0..=j1, k0..=k1])
    }

    pub fn view_mut(&mut self, idx: &Idx) -> ArrayViewMut3<'_, FloatValue> {
        let [(i0, i1), (j0, j1), (k0, k1)] = self.offsets(idx);
        self.data.slice_mut(s![i0..=i1, j0..=j1, k0..=k1])
    }

    /// The whole storage, halo included.
    pub fn data(&self) -> ArrayView3<'_, FloatValue> {
        self.data.view()
    }

    pub fn get(&self, [i, j, k]: [isize; 3]) -> FloatValue {
        self.view(&Idx::new(Span::single(i), Span::single(j), Span::single(k)))[[0, 0, 0]]
    }

    pub fn set(&mut self, [i, j, k]: [isize; 3], value: FloatValue) {
        self.view_mut(&Idx::new(Span::single(i), Span::single(j), Span::single(k)))[[0, 0, 0]] =
            value;
    }

    pub fn fill(&mut self, value: FloatValue) {
        self.data.fill(value);
    }

    /// Copies `src` into the block `idx`.
    pub fn assign(&mut self, idx: &Idx, src: &ArrayView3<'_, FloatValue>) {
        self.view_mut(idx).assign(src);
    }

    /// Copies the full storage of another array with identical bounds.
    pub fn copy_from(&mut self, other: &HaloArray) {
        assert_eq!(self.bounds, other.bounds, "cannot copy between differently shaped arrays");
        self.data.assign(&other.data);
    }

    pub fn sum(&self, idx: &Idx) -> FloatValue {
        self.view(idx).sum()
    }

    pub fn is_finite(&self, idx: &Idx) -> bool {
        self.view(idx).iter().all(|v| v.is_finite())
    }

    pub fn max_abs(&self) -> FloatValue {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    /// Overwrites every element with NaN so that reads of uncomputed data are visible.
    pub fn fill_with_nans(&mut self) {
        self.data.fill(FloatValue::NAN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(i: (isize, isize), j: (isize, isize), k: (isize, isize)) -> Idx {
        Idx::new(Span::new(i.0, i.1), Span::new(j.0, j.1), Span::new(k.0, k.1))
    }

    #[test]
    fn test_negative_logical_indices() {
        let arr = HaloArray::from_fn(block((-1, 3), (-1, 1), (0, 0)), |[i, j, _]| {
            (10 * i + j) as FloatValue
        });
        assert_eq!(arr.get([-1, -1, 0]), -11.0);
        assert_eq!(arr.get([3, 1, 0]), 31.0);

        let inner = arr.view(&block((0, 1), (0, 0), (0, 0)));
        assert_eq!(inner.shape(), &[2, 1, 1]);
        assert_eq!(inner[[1, 0, 0]], 10.0);
    }

    #[test]
    #[should_panic(expected = "outside array bounds")]
    fn test_out_of_bounds_panics() {
        let arr = HaloArray::zeros(block((0, 3), (0, 0), (0, 0)));
        arr.view(&block((-1, 3), (0, 0), (0, 0)));
    }

    #[test]
    fn test_sum_and_finiteness() {
        let mut arr = HaloArray::from_elem(block((-1, 2), (0, 0), (0, 0)), 1.0);
        let owned = block((0, 1), (0, 0), (0, 0));
        assert_eq!(arr.sum(&owned), 2.0);
        arr.set([-1, 0, 0], FloatValue::NAN);
        assert!(arr.is_finite(&owned));
        assert!(!arr.is_finite(arr.bounds()));
    }
}
