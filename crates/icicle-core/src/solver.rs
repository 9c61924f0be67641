//! Solver state and the per-step operations the driver sequences.

use crate::advection::{Advection, AdvectionContext};
use crate::array::HaloArray;
use crate::config::{RunConfig, VelocityConfig};
use crate::courant::{populate_courant_fields, CourantFields, CourantUpdater};
use crate::equations::{Adjustment, AuxFields, EquationSystem};
use crate::errors::{IcicleError, IcicleResult};
use crate::field::{Field, FieldStore, Level};
use crate::forcing::ForcingApplier;
use crate::grid::{Grid, Idx};
use crate::halo::HaloMap;
use crate::io::{InitialCondition, Output};
use crate::FloatValue;
use tracing::{info, trace};

/// All state of one single-domain advection run.
#[derive(Debug)]
pub struct Solver {
    grid: Grid,
    ijk: Idx,
    dt: FloatValue,
    scheme: Box<dyn Advection>,
    equations: Box<dyn EquationSystem>,
    fields: FieldStore,
    aux: AuxFields,
    courants: CourantFields,
    /// Present when velocities are diagnosed rather than prescribed.
    updater: Option<CourantUpdater>,
    forcing: ForcingApplier,
    timestep: usize,
}

impl Solver {
    /// Allocates every field, seeds level `n` from `initial` and prepares the Courant
    /// numbers.
    ///
    /// All configuration errors surface here, before any stepping.
    pub fn new(
        config: &RunConfig,
        equations: Box<dyn EquationSystem>,
        initial: &dyn InitialCondition,
    ) -> IcicleResult<Self> {
        config.validate()?;
        let grid = config.grid;
        let ijk = grid.domain();
        let scheme = config.scheme.build()?;
        let diagnosed = !config.velocity.is_constant();
        let halo_vctr = scheme.halo();

        let mut fields = FieldStore::new();
        for spec in equations.variables() {
            // Dynamic fields feed the velocity interpolation, which reaches one cell further
            let keep_history = spec.dynamic && diagnosed;
            let halo = halo_vctr + usize::from(keep_history);
            let field = Field::new(
                &spec.name,
                &grid,
                ijk,
                scheme.time_levels(),
                halo,
                spec.dynamic,
                keep_history,
            )?;
            fields.push(field)?;
        }
        if fields.is_empty() {
            return Err(IcicleError::Config(
                "equation system declares no variables".to_string(),
            ));
        }
        let aux = AuxFields::new(&equations.aux_fields(), &ijk)?;

        let mut courants = CourantFields::zeros(&grid, &ijk, halo_vctr);
        let updater = match &config.velocity {
            VelocityConfig::Constant { field } => {
                populate_courant_fields(field.as_ref(), &grid, &ijk, config.dt, &mut courants)?;
                courants.warn_if_unstable();
                None
            }
            VelocityConfig::Diagnosed => {
                let map = equations.velocity_map();
                if map.variables().next().is_none() {
                    return Err(IcicleError::Config(
                        "diagnosed velocity requires a velocity map".to_string(),
                    ));
                }
                Some(CourantUpdater::new(&map, &fields, &grid)?)
            }
        };
        let forcing = ForcingApplier::new(equations.variables(), &fields);

        let mut solver = Self {
            grid,
            ijk,
            dt: config.dt,
            scheme,
            equations,
            fields,
            aux,
            courants,
            updater,
            forcing,
            timestep: 0,
        };
        solver.populate(initial)?;

        info!(
            nx = grid.nx,
            ny = grid.ny,
            nz = grid.nz,
            dt = config.dt,
            scheme = solver.scheme.name(),
            passes = solver.scheme.num_steps(),
            time_levels = solver.scheme.time_levels(),
            max_halo = solver.fields.max_halo(),
            fields = solver.fields.len(),
            diagnosed,
            "solver initialised"
        );
        Ok(solver)
    }

    /// Seeds level `n` of every field and every constant auxiliary field, then copies
    /// it to all other levels so that leapfrog starts from `n - 1 == n`.
    fn populate(&mut self, initial: &dyn InitialCondition) -> IcicleResult<()> {
        let ijk = self.ijk;
        for e in 0..self.fields.len() {
            let field = self.fields.field_mut(e);
            let name = field.name().to_string();
            let current = field.at_mut(Level::Current).view_mut(&ijk);
            initial.populate_scalar_field(&name, &ijk, current)?;
            if !field.at(Level::Current).is_finite(&ijk) {
                return Err(IcicleError::NonFinite {
                    what: format!("initial condition of {}", name),
                });
            }
            self.fill_halos(e, Level::Current);
            let field = self.fields.field_mut(e);
            field.broadcast_current();
            field.stash_history();
        }
        for (spec, data) in self.aux.iter_mut() {
            if spec.constant {
                initial.populate_scalar_field(&spec.name, &ijk, data.view_mut(&ijk))?;
            }
        }
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The owned cell range.
    pub fn ijk(&self) -> &Idx {
        &self.ijk
    }

    pub fn dt(&self) -> FloatValue {
        self.dt
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn scheme(&self) -> &dyn Advection {
        self.scheme.as_ref()
    }

    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldStore {
        &mut self.fields
    }

    pub fn aux(&self) -> &AuxFields {
        &self.aux
    }

    pub fn courants(&self) -> &CourantFields {
        &self.courants
    }

    pub fn has_constant_velocity(&self) -> bool {
        self.updater.is_none()
    }

    /// Level `n` of field `name`, halo included.
    pub fn state(&self, name: &str) -> IcicleResult<&HaloArray> {
        Ok(self.fields.require(name)?.at(Level::Current))
    }

    /// Fills the halo of field `e` at `level` by periodic wrap.
    pub fn fill_halos(&mut self, e: usize, level: Level) {
        self.fill_halos_from(&HaloMap::periodic(), e, level);
    }

    /// Fills the halo of field `e` at `level` from the given neighbours.
    pub fn fill_halos_from(&mut self, map: &HaloMap<'_>, e: usize, level: Level) {
        map.fill(&mut self.fields, e, level, self.grid.extents());
    }

    /// Diagnoses Courant numbers from level `n` and the previous step, then stores level
    /// `n` as the new previous step. A no-op under constant velocity.
    pub fn update_courants(&mut self) -> IcicleResult<()> {
        let Some(updater) = self.updater.as_mut() else {
            return Ok(());
        };
        updater.update(&self.fields, &self.grid, self.dt, &mut self.courants)?;
        self.courants.warn_if_unstable();
        for field in self.fields.iter_mut() {
            field.stash_history();
        }
        Ok(())
    }

    /// Runs every pass of the scheme on field `e`, leaving the result in `Next`.
    ///
    /// Between passes the field is cycled, so pass `s` reads the result of pass `s - 1`
    /// as level `n`, and its halo refreshed.
    pub fn advect(&mut self, e: usize) {
        assert_eq!(
            self.fields.field(e).time_levels(),
            self.scheme.time_levels(),
            "field {} has the wrong number of time levels for {}",
            self.fields.field(e).name(),
            self.scheme.name()
        );
        let ijk = self.ijk;
        let positive_definite = self.equations.variables()[e].positive_definite;
        for pass in 1..=self.scheme.num_steps() {
            if pass > 1 {
                self.fields.field_mut(e).cycle();
                self.fill_halos(e, Level::Current);
            }
            let field = self.fields.field_mut(e);
            if cfg!(debug_assertions) {
                field.at_mut(Level::Next).fill_with_nans();
            }
            trace!(field = field.name(), pass, "advection pass");
            let ctx = AdvectionContext {
                grid: &self.grid,
                ijk: &ijk,
                positive_definite,
            };
            self.scheme.apply(field.levels_mut(), &self.courants, &ctx, pass);
        }
    }

    /// Applies right-hand-side terms to the freshly advected level of every forced field.
    pub fn apply_forcing(&mut self) -> IcicleResult<()> {
        let variables = self.equations.variables();
        self.forcing
            .update(variables, &self.fields, &self.aux, Level::Next, self.dt)?;
        self.forcing
            .apply(variables, &mut self.fields, Level::Next, self.dt)
    }

    /// Hands the freshly advected level to the equation system.
    pub fn apply_adjustments(&mut self) -> IcicleResult<()> {
        let mut adjustment = Adjustment {
            level: Level::Next,
            fields: &mut self.fields,
            aux: &mut self.aux,
            courants: &mut self.courants,
            grid: &self.grid,
            dt: self.dt,
        };
        self.equations.adjustments(&mut adjustment)
    }

    /// Fails with `NonFinite` if any owned value of `level` is NaN or infinite.
    pub fn check_finite(&self, level: Level) -> IcicleResult<()> {
        for field in self.fields.iter() {
            if !field.at(level).is_finite(field.ijk()) {
                return Err(IcicleError::NonFinite {
                    what: format!("{} at timestep {}", field.name(), self.timestep + 1),
                });
            }
        }
        Ok(())
    }

    /// Promotes `Next` to `n` for every field and advances the step counter.
    pub fn cycle(&mut self) {
        for field in self.fields.iter_mut() {
            field.cycle();
        }
        self.timestep += 1;
    }

    pub fn refresh_halos(&mut self) {
        for e in 0..self.fields.len() {
            self.fill_halos(e, Level::Current);
        }
    }

    /// Records level `n` of every field and every output-flagged auxiliary field.
    pub fn record(&self, output: &mut dyn Output) -> IcicleResult<()> {
        for field in self.fields.iter() {
            output.record(field.name(), field.owned(Level::Current), &self.ijk, self.timestep)?;
        }
        for (spec, data) in self.aux.iter().filter(|(spec, _)| spec.output) {
            output.record(&spec.name, data.view(&self.ijk), &self.ijk, self.timestep)?;
        }
        Ok(())
    }
}
