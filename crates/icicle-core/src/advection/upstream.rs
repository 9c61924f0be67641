use super::{donor_cell_pass, Advection, AdvectionContext};
use crate::courant::CourantFields;
use crate::field::LevelsMut;
use crate::grid::Axis;

/// First-order donor-cell (upstream) advection.
///
/// Conservative, and positive definite for |C| summed over axes not exceeding 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upstream;

impl Advection for Upstream {
    fn name(&self) -> &'static str {
        "upstream"
    }

    fn stencil_extent(&self) -> usize {
        3
    }

    fn time_levels(&self) -> usize {
        2
    }

    fn num_steps(&self) -> usize {
        1
    }

    fn apply(
        &mut self,
        psi: LevelsMut<'_>,
        courants: &CourantFields,
        ctx: &AdvectionContext<'_>,
        pass: usize,
    ) {
        assert_eq!(pass, 1, "upstream advection has a single pass, got pass {}", pass);
        let velocity = Axis::ALL.map(|a| courants.axis(a));
        donor_cell_pass(psi.current, psi.next, velocity, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advection::test_support::Bench;
    use crate::grid::Grid;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_shift_at_unit_courant() {
        let grid = Grid::new(8, 1, 1).unwrap();
        let mut scheme = Upstream;
        let mut bench = Bench::new(grid, &scheme, [1.0, 0.0, 0.0], |[i, _, _]| {
            if i == 2 {
                1.0
            } else {
                0.0
            }
        });
        bench.run(&mut scheme, 3);
        assert_eq!(bench.current().get([5, 0, 0]), 1.0);
        assert_eq!(bench.total(), 1.0);
    }

    #[test]
    fn test_negative_courant_moves_left() {
        let grid = Grid::new(8, 1, 1).unwrap();
        let mut scheme = Upstream;
        let mut bench = Bench::new(grid, &scheme, [-1.0, 0.0, 0.0], |[i, _, _]| {
            if i == 0 {
                1.0
            } else {
                0.0
            }
        });
        bench.run(&mut scheme, 1);
        // Wraps through the left boundary
        assert_eq!(bench.current().get([7, 0, 0]), 1.0);
    }

    #[test]
    fn test_positivity_and_conservation() {
        let grid = Grid::new(12, 10, 1).unwrap();
        let mut scheme = Upstream;
        let mut bench = Bench::new(grid, &scheme, [0.3, -0.45, 0.0], |[i, j, _]| {
            ((i * 7 + j * 3) % 5) as f64
        });
        let before = bench.total();
        bench.run(&mut scheme, 25);

        let arr = bench.current();
        let owned = grid.domain();
        assert!(arr.view(&owned).iter().all(|&v| v >= 0.0));
        assert_relative_eq!(bench.total(), before, max_relative = 1e-12);
    }

    #[test]
    #[should_panic(expected = "single pass")]
    fn test_second_pass_panics() {
        let grid = Grid::new(4, 1, 1).unwrap();
        let mut scheme = Upstream;
        let mut bench = Bench::new(grid, &scheme, [0.5, 0.0, 0.0], |_| 1.0);
        let ijk = grid.domain();
        let ctx = AdvectionContext {
            grid: &grid,
            ijk: &ijk,
            positive_definite: true,
        };
        scheme.apply(bench.fields.field_mut(0).levels_mut(), &bench.courants, &ctx, 2);
    }
}
