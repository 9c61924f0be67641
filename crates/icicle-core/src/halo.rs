//! Halo exchange.
//!
//! The margin around an owned block is filled from whoever owns the mirrored cells:
//! a neighbouring subdomain, or under single-domain periodic wrap the block itself,
//! with the mirrored range `(index + extent) % extent`.
//!
//! Halos along x span the owned `j, k` ranges, halos along y span the x range widened by
//! its halo and halos along z span both widened ranges, so edges and corners are filled
//! by the time the last direction is done.

use crate::array::HaloArray;
use crate::field::{FieldStore, Level};
use crate::grid::{Axis, Grid, Idx, Span};
use crate::FloatValue;
use ndarray::Array3;

/// The six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Fore,
    Hind,
    Base,
    Apex,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Left,
        Direction::Right,
        Direction::Fore,
        Direction::Hind,
        Direction::Base,
        Direction::Apex,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Direction::Left | Direction::Right => Axis::X,
            Direction::Fore | Direction::Hind => Axis::Y,
            Direction::Base | Direction::Apex => Axis::Z,
        }
    }

    /// Whether the halo lies below the owned range.
    pub fn is_lower(self) -> bool {
        matches!(self, Direction::Left | Direction::Fore | Direction::Base)
    }
}

/// Geometry of one halo fill: the owned block, halo widths and the periodic extents.
#[derive(Debug, Clone, Copy)]
pub struct HaloLayout {
    pub owned: Idx,
    pub widths: [usize; 3],
    pub extents: [usize; 3],
}

impl HaloLayout {
    /// Halo block for `direction` and the mirrored block that supplies it.
    ///
    /// Returns `None` when there is no halo in that direction.
    pub fn blocks(&self, direction: Direction) -> Option<(Idx, Idx)> {
        let axis = direction.axis();
        let width = self.widths[axis.index()];
        if width == 0 {
            return None;
        }
        let owned = self.owned.span(axis);
        let halo = if direction.is_lower() {
            Span::new(owned.first - width as isize, owned.first - 1)
        } else {
            Span::new(owned.last + 1, owned.last + width as isize)
        };
        let mirrored = halo.wrap(self.extents[axis.index()]);

        // Transverse extent: axes processed earlier include their halos
        let [_, t1, t2] = axis.permute(Axis::ALL);
        let transverse = |t: Axis| {
            let span = self.owned.span(t);
            if t.index() < axis.index() {
                span.widen(self.widths[t.index()])
            } else {
                span
            }
        };
        let (s1, s2) = (transverse(t1), transverse(t2));
        Some((
            Idx::from_permuted(axis, [halo, s1, s2]),
            Idx::from_permuted(axis, [mirrored, s1, s2]),
        ))
    }
}

/// Fills the halo of `array` direction by direction.
///
/// `source` receives the array itself (for self-wrap), the direction and the mirrored
/// block, and returns the data to copy into the halo.
pub fn fill_halos_with<F>(array: &mut HaloArray, layout: &HaloLayout, mut source: F)
where
    F: FnMut(&HaloArray, Direction, &Idx) -> Array3<FloatValue>,
{
    for direction in Direction::ALL {
        if let Some((halo, mirrored)) = layout.blocks(direction) {
            let data = source(array, direction, &mirrored);
            array.assign(&halo, &data.view());
        }
    }
}

/// Fills the halo of `array` by cyclic wrap onto itself.
pub fn fill_periodic(array: &mut HaloArray, layout: &HaloLayout) {
    fill_halos_with(array, layout, |own, _, mirrored| own.view(mirrored).to_owned());
}

/// Fills the halo of an array staggered along `axis` by cyclic wrap.
///
/// The owned faces are the ones bounding the cells of `ijk`, so the faces on either
/// end of a periodic axis both stay as they are. Degenerate axes carry no halo.
pub fn fill_periodic_faces(array: &mut HaloArray, grid: &Grid, ijk: &Idx, axis: Axis) {
    let owned = ijk.with(axis, Grid::rng_faces(ijk.span(axis)));
    let widths = Axis::ALL.map(|a| {
        if grid.is_degenerate(a) {
            0
        } else {
            (array.bounds().span(a).len() - owned.span(a).len()) / 2
        }
    });
    let layout = HaloLayout {
        owned,
        widths,
        extents: grid.extents(),
    };
    fill_periodic(array, &layout);
}

/// Who supplies the halo data in one direction.
#[derive(Debug, Clone, Copy)]
pub enum Neighbour<'a> {
    /// Periodic wrap onto the block's own data.
    Own,
    /// Another subdomain, indexed with the same global logical indices.
    Subdomain(&'a FieldStore),
}

/// For each of the six directions, the neighbour that supplies halo data.
#[derive(Debug, Clone, Copy)]
pub struct HaloMap<'a> {
    neighbours: [Neighbour<'a>; 6],
}

impl<'a> HaloMap<'a> {
    /// Every direction wraps onto the block itself.
    pub fn periodic() -> Self {
        Self {
            neighbours: [Neighbour::Own; 6],
        }
    }

    pub fn with_neighbour(mut self, direction: Direction, neighbour: Neighbour<'a>) -> Self {
        self.neighbours[direction as usize] = neighbour;
        self
    }

    pub fn neighbour(&self, direction: Direction) -> Neighbour<'a> {
        self.neighbours[direction as usize]
    }

    /// Fills the halo of field `e` at `level` from the mapped neighbours.
    ///
    /// Neighbours are looked up by field name, so subdomains only need to agree on
    /// the variable set.
    pub fn fill(&self, fields: &mut FieldStore, e: usize, level: Level, extents: [usize; 3]) {
        let field = fields.field_mut(e);
        let layout = HaloLayout {
            owned: *field.ijk(),
            widths: Axis::ALL.map(|a| {
                let padded = field.bounds().span(a).len();
                (padded - field.ijk().span(a).len()) / 2
            }),
            extents,
        };
        let name = field.name().to_string();
        fill_halos_with(field.at_mut(level), &layout, |own, direction, mirrored| {
            match self.neighbour(direction) {
                Neighbour::Own => own.view(mirrored).to_owned(),
                Neighbour::Subdomain(other) => {
                    let supplier = other
                        .get(&name)
                        .unwrap_or_else(|| panic!("neighbour subdomain lacks field {}", name));
                    supplier.at(level).view(mirrored).to_owned()
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn unique(grid: &Grid) -> impl Fn([isize; 3]) -> FloatValue + '_ {
        move |[i, j, k]: [isize; 3]| {
            let wrap = |x: isize, n: usize| x.rem_euclid(n as isize) as FloatValue;
            wrap(i, grid.nx) + 100.0 * wrap(j, grid.ny) + 10_000.0 * wrap(k, grid.nz)
        }
    }

    fn seeded_field(grid: &Grid, halo: usize) -> Field {
        let mut field = Field::new("psi", grid, grid.domain(), 2, halo, false, false).unwrap();
        let owned = *field.ijk();
        let f = unique(grid);
        let arr = field.at_mut(Level::Current);
        arr.fill(FloatValue::NAN);
        for i in owned.i.iter() {
            for j in owned.j.iter() {
                for k in owned.k.iter() {
                    arr.set([i, j, k], f([i, j, k]));
                }
            }
        }
        field
    }

    #[test]
    fn test_cyclic_identity_in_every_direction() {
        let grid = Grid::new(5, 4, 3).unwrap();
        let mut store = FieldStore::new();
        store.push(seeded_field(&grid, 1)).unwrap();
        HaloMap::periodic().fill(&mut store, 0, Level::Current, grid.extents());

        let arr = store.field(0).at(Level::Current);
        let (nx, ny, nz) = (grid.nx as isize, grid.ny as isize, grid.nz as isize);
        for j in 0..ny {
            for k in 0..nz {
                assert_eq!(arr.get([-1, j, k]), arr.get([nx - 1, j, k]));
                assert_eq!(arr.get([nx, j, k]), arr.get([0, j, k]));
            }
        }
        for i in 0..nx {
            for k in 0..nz {
                assert_eq!(arr.get([i, -1, k]), arr.get([i, ny - 1, k]));
                assert_eq!(arr.get([i, ny, k]), arr.get([i, 0, k]));
            }
        }
        for i in 0..nx {
            for j in 0..ny {
                assert_eq!(arr.get([i, j, -1]), arr.get([i, j, nz - 1]));
                assert_eq!(arr.get([i, j, nz]), arr.get([i, j, 0]));
            }
        }
        // Corners are filled too
        assert_eq!(arr.get([-1, -1, -1]), arr.get([nx - 1, ny - 1, nz - 1]));
        assert!(arr.is_finite(arr.bounds()));
    }

    #[test]
    fn test_wide_halo_matches_global_pattern() {
        let grid = Grid::new(6, 5, 1).unwrap();
        let mut store = FieldStore::new();
        store.push(seeded_field(&grid, 2)).unwrap();
        HaloMap::periodic().fill(&mut store, 0, Level::Current, grid.extents());

        let arr = store.field(0).at(Level::Current);
        let expected = unique(&grid);
        let bounds = *arr.bounds();
        assert_eq!(bounds.k, Span::new(0, 0));
        for i in bounds.i.iter() {
            for j in bounds.j.iter() {
                assert_eq!(arr.get([i, j, 0]), expected([i, j, 0]), "at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_halo_from_neighbouring_subdomain() {
        let grid = Grid::new(8, 1, 1).unwrap();
        let f = unique(&grid);
        let half = |first: isize, last: isize| {
            let ijk = Idx::new(Span::new(first, last), Span::new(0, 0), Span::new(0, 0));
            let mut field = Field::new("psi", &grid, ijk, 2, 1, false, false).unwrap();
            for i in first..=last {
                field.at_mut(Level::Current).set([i, 0, 0], f([i, 0, 0]));
            }
            let mut store = FieldStore::new();
            store.push(field).unwrap();
            store
        };
        let mut west = half(0, 3);
        let east = half(4, 7);

        HaloMap::periodic()
            .with_neighbour(Direction::Left, Neighbour::Subdomain(&east))
            .with_neighbour(Direction::Right, Neighbour::Subdomain(&east))
            .fill(&mut west, 0, Level::Current, grid.extents());

        let arr = west.field(0).at(Level::Current);
        assert_eq!(arr.get([-1, 0, 0]), f([7, 0, 0]));
        assert_eq!(arr.get([4, 0, 0]), f([4, 0, 0]));
    }

    #[test]
    fn test_face_halo_wraps_onto_owned_faces() {
        let grid = Grid::new(5, 4, 1).unwrap();
        let ijk = grid.domain();
        let mut faces = HaloArray::from_fn(grid.rng_vctr(Axis::X, &ijk, 1), |[i, j, _]| {
            (i + 10 * j) as FloatValue
        });
        fill_periodic_faces(&mut faces, &grid, &ijk, Axis::X);

        // Faces 0 and nx are both owned and keep their own values
        assert_eq!(faces.get([0, 2, 0]), 20.0);
        assert_eq!(faces.get([5, 2, 0]), 25.0);
        // Face -1 is face nx - 1 and face nx + 1 is face 1
        assert_eq!(faces.get([-1, 2, 0]), 24.0);
        assert_eq!(faces.get([6, 2, 0]), 21.0);
        // Transverse halo rows wrap as cells do
        assert_eq!(faces.get([3, -1, 0]), 33.0);
        assert_eq!(faces.get([3, 4, 0]), 3.0);
        assert_eq!(faces.get([-1, -1, 0]), 34.0);
    }
}
