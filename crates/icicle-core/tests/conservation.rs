//! Conservation tests for the advection schemes.
//!
//! On a periodic domain with a divergence-free Courant field and no forcing, the flux
//! form of every scheme only moves mass between cells, so the domain total must not
//! change.

use approx::assert_relative_eq;
use icicle_core::advection::Scheme;
use icicle_core::config::{RunConfig, VelocityConfig};
use icicle_core::courant::{AnalyticVelocity, SolidBodyRotation, UniformVelocity};
use icicle_core::driver::Driver;
use icicle_core::equations::{TracerSystem, VariableSpec};
use icicle_core::field::Level;
use icicle_core::grid::{Axis, Grid};
use icicle_core::FloatValue;

fn blob(_: &str, [i, j, _]: [isize; 3]) -> FloatValue {
    let (x, y) = (i as FloatValue - 6.0, j as FloatValue - 8.0);
    1.0 + 5.0 * (-(x * x + y * y) / 6.0).exp()
}

fn total_mass(driver: &Driver) -> FloatValue {
    driver.solver().fields().field(0).sum(Level::Current)
}

fn run(
    scheme: Scheme,
    velocity: Box<dyn AnalyticVelocity>,
    nt: usize,
) -> (FloatValue, FloatValue, Driver) {
    let grid = Grid::new(20, 20, 1).unwrap();
    let config = RunConfig::new(
        grid,
        1.0,
        nt,
        scheme,
        VelocityConfig::Constant { field: velocity },
    );
    let system = TracerSystem::new(vec![VariableSpec::new("psi")]);
    let mut driver = Driver::from_config(&config, Box::new(system), &blob).unwrap();
    let before = total_mass(&driver);
    driver.advance().unwrap();
    let after = total_mass(&driver);
    (before, after, driver)
}

fn rotation() -> Box<dyn AnalyticVelocity> {
    Box::new(SolidBodyRotation {
        omega: 0.04,
        centre: [10.0, 10.0],
    })
}

fn uniform() -> Box<dyn AnalyticVelocity> {
    Box::new(UniformVelocity {
        velocity: [0.3, -0.2, 0.0],
    })
}

mod uniform_velocity {
    use super::*;

    #[test]
    fn test_upstream_conserves_mass() {
        let (before, after, _) = run(Scheme::Upstream, uniform(), 50);
        assert_relative_eq!(after, before, max_relative = 1e-12);
    }

    #[test]
    fn test_leapfrog_conserves_mass() {
        let (before, after, _) = run(Scheme::Leapfrog, uniform(), 50);
        assert_relative_eq!(after, before, max_relative = 1e-12);
    }

    #[test]
    fn test_mpdata_conserves_mass() {
        let scheme = Scheme::Mpdata {
            iord: 3,
            cache: true,
        };
        let (before, after, _) = run(scheme, uniform(), 50);
        assert_relative_eq!(after, before, max_relative = 1e-12);
    }
}

mod solid_body_rotation {
    use super::*;

    #[test]
    fn test_upstream_conserves_mass() {
        let (before, after, driver) = run(Scheme::Upstream, rotation(), 40);
        assert_relative_eq!(after, before, max_relative = 1e-12);
        // Positive definite while |Cx| + |Cy| <= 1
        assert!(driver.solver().courants().max_abs() <= 0.5);
        let psi = driver.solver().state("psi").unwrap();
        assert!(psi.view(driver.solver().ijk()).iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_leapfrog_conserves_mass() {
        let (before, after, _) = run(Scheme::Leapfrog, rotation(), 40);
        assert_relative_eq!(after, before, max_relative = 1e-12);
    }

    #[test]
    fn test_mpdata_conserves_mass() {
        // The rotation is not periodic, so the face on either end of an axis only sees
        // the same neighbourhood once the Courant halos are wrapped
        for iord in [2, 3] {
            let scheme = Scheme::Mpdata { iord, cache: true };
            let (before, after, _) = run(scheme, rotation(), 40);
            assert_relative_eq!(after, before, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_courant_halos_wrap() {
        let (_, _, driver) = run(Scheme::Upstream, rotation(), 0);
        let cy = driver.solver().courants().axis(Axis::Y);
        for j in 0..=20 {
            assert_eq!(cy.get([-1, j, 0]), cy.get([19, j, 0]));
            assert_eq!(cy.get([20, j, 0]), cy.get([0, j, 0]));
        }
    }
}
