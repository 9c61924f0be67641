//! Semi-implicit integration of the oscillator through the full driver.

use approx::assert_relative_eq;
use icicle_core::advection::Scheme;
use icicle_core::config::{RunConfig, VelocityConfig};
use icicle_core::courant::UniformVelocity;
use icicle_core::driver::Driver;
use icicle_core::grid::Grid;
use icicle_core::FloatValue;
use icicle_harmonic::{HarmonicOscillator, HarmonicOscillatorParameters};

const OMEGA: FloatValue = 0.5;
const DT: FloatValue = 0.2;

fn driver(grid: Grid, scheme: Scheme, nt: usize, velocity: [FloatValue; 3]) -> Driver {
    let config = RunConfig::new(
        grid,
        DT,
        nt,
        scheme,
        VelocityConfig::Constant {
            field: Box::new(UniformVelocity { velocity }),
        },
    );
    let system = HarmonicOscillator::from_parameters(HarmonicOscillatorParameters { omega: OMEGA });
    let initial = |name: &str, _: [isize; 3]| if name == "psi" { 1.0 } else { 0.0 };
    Driver::from_config(&config, Box::new(system), &initial).unwrap()
}

fn state(driver: &Driver, idx: [isize; 3]) -> (FloatValue, FloatValue) {
    let solver = driver.solver();
    (
        solver.state("psi").unwrap().get(idx),
        solver.state("phi").unwrap().get(idx),
    )
}

#[test]
fn test_amplitude_never_grows() {
    let mut driver = driver(Grid::new(1, 1, 1).unwrap(), Scheme::Upstream, 50, [0.0; 3]);
    let mut amplitude = 1.0;
    while !driver.finished() {
        driver.step().unwrap();
        let (psi, phi) = state(&driver, [0, 0, 0]);
        let next = (psi * psi + phi * phi).sqrt();
        assert!(next < amplitude);
        amplitude = next;
    }
}

#[test]
fn test_phase_and_damping_per_step() {
    let nt = 10;
    let mut driver = driver(Grid::new(1, 1, 1).unwrap(), Scheme::Upstream, nt, [0.0; 3]);
    driver.advance().unwrap();

    let a = OMEGA * DT;
    let (psi, phi) = state(&driver, [0, 0, 0]);
    assert_relative_eq!((-phi).atan2(psi), nt as FloatValue * a.atan(), epsilon = 1e-12);
    assert_relative_eq!(
        (psi * psi + phi * phi).sqrt(),
        (1.0 + a * a).powf(-(nt as FloatValue) / 2.0),
        epsilon = 1e-12
    );
}

#[test]
fn test_uniform_state_unaffected_by_advection() {
    // A spatially uniform oscillator is a fixed point of advection, so every cell must
    // follow the zero-dimensional solution exactly
    let mut point = driver(Grid::new(1, 1, 1).unwrap(), Scheme::Upstream, 5, [0.0; 3]);
    point.advance().unwrap();
    let expected = state(&point, [0, 0, 0]);

    let scheme = Scheme::Mpdata {
        iord: 2,
        cache: true,
    };
    let mut field = driver(Grid::new(6, 4, 1).unwrap(), scheme, 5, [0.3, 0.1, 0.0]);
    field.advance().unwrap();
    for idx in [[0, 0, 0], [5, 3, 0], [2, 1, 0]] {
        let (psi, phi) = state(&field, idx);
        assert_relative_eq!(psi, expected.0, epsilon = 1e-12);
        assert_relative_eq!(phi, expected.1, epsilon = 1e-12);
    }
}
