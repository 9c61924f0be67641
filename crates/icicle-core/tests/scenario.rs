//! End-to-end runs through the driver.

use approx::assert_relative_eq;
use icicle_core::advection::Scheme;
use icicle_core::config::{RunConfig, VelocityConfig};
use icicle_core::courant::{MomentumRatio, UniformVelocity, VelocityMap};
use icicle_core::driver::Driver;
use icicle_core::equations::{TracerSystem, VariableSpec};
use icicle_core::grid::{Axis, Grid};
use icicle_core::io::MemoryOutput;
use icicle_core::FloatValue;

/// Total and x-centroid of a recorded 2D field.
fn moments(values: &[FloatValue], ny: usize) -> (FloatValue, FloatValue) {
    let total: FloatValue = values.iter().sum();
    let first: FloatValue = values
        .iter()
        .enumerate()
        .map(|(n, v)| (n / ny) as FloatValue * v)
        .sum();
    (total, first / total)
}

#[test]
fn test_leapfrog_impulse_translation() {
    let config = RunConfig::from_toml_str(
        r#"
        dt = 1.0
        nt = 10

        [grid]
        nx = 50
        ny = 50

        [scheme]
        type = "leapfrog"

        [velocity]
        source = "constant"
        field = { type = "uniform", velocity = [0.2, 0.0, 0.0] }
        "#,
    )
    .unwrap();
    let system = TracerSystem::new(vec![VariableSpec::new("psi")]);
    let impulse = |_: &str, [i, j, _]: [isize; 3]| if (i, j) == (25, 25) { 1.0 } else { 0.0 };
    let mut driver = Driver::from_config(&config, Box::new(system), &impulse).unwrap();

    let mut output = MemoryOutput::new();
    driver.run(&mut output, config.outfreq).unwrap();
    assert!(driver.finished());

    let first = output.series("psi").next().unwrap();
    let last = output.last("psi").unwrap();
    assert_eq!(last.timestep, 10);

    let (mass_before, centroid_before) = moments(&first.values, 50);
    let (mass_after, centroid_after) = moments(&last.values, 50);
    assert_relative_eq!(mass_after, mass_before, max_relative = 1e-6);
    assert_relative_eq!(centroid_before, 25.0);
    assert_relative_eq!(centroid_after - centroid_before, 2.0, epsilon = 1e-9);
}

#[test]
fn test_diagnosed_uniform_velocity_matches_prescribed() {
    let grid = Grid::new(16, 12, 1).unwrap();
    let blob = |name: &str, [i, j, _]: [isize; 3]| match name {
        "rhod" => 1.0,
        "rhod_u" => 0.25,
        _ => {
            let (x, y) = (i as FloatValue - 8.0, j as FloatValue - 6.0);
            (-(x * x + y * y) / 4.0).exp()
        }
    };

    let prescribed = RunConfig::new(
        grid,
        1.0,
        8,
        Scheme::Upstream,
        VelocityConfig::Constant {
            field: Box::new(UniformVelocity {
                velocity: [0.25, 0.0, 0.0],
            }),
        },
    );
    let mut reference = Driver::from_config(
        &prescribed,
        Box::new(TracerSystem::new(vec![VariableSpec::new("psi")])),
        &blob,
    )
    .unwrap();
    reference.advance().unwrap();

    let diagnosed = RunConfig::new(grid, 1.0, 8, Scheme::Upstream, VelocityConfig::Diagnosed);
    let system = TracerSystem::new(vec![
        VariableSpec::new("rhod").dynamic(),
        VariableSpec::new("rhod_u").dynamic(),
        VariableSpec::new("psi"),
    ])
    .with_velocity_map(
        VelocityMap::default().with(Axis::X, MomentumRatio::new("rhod_u", Some("rhod"))),
    );
    let mut driver = Driver::from_config(&diagnosed, Box::new(system), &blob).unwrap();
    driver.advance().unwrap();

    let ijk = *driver.solver().ijk();
    let expected = reference.solver().state("psi").unwrap().view(&ijk).to_owned();
    let actual = driver.solver().state("psi").unwrap().view(&ijk).to_owned();
    assert_eq!(actual, expected);
    assert_eq!(driver.solver().courants().axis(Axis::X).get([0, 0, 0]), 0.25);
}
