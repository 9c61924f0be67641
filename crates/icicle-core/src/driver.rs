//! Time stepping.
//!
//! Every step walks the same fixed sequence of states:
//!
//! ```text
//! ComputingCourants -> Advecting -> ApplyingForcing -> ApplyingAdjustments
//!     -> Cycling -> RefreshingHalos
//! ```
//!
//! `ComputingCourants` is skipped when the velocity is constant. After `nt` steps the
//! driver is `Done`; recording the final state is left to the caller (or [`Driver::run`]).

use crate::config::RunConfig;
use crate::equations::EquationSystem;
use crate::errors::{IcicleError, IcicleResult};
use crate::field::Level;
use crate::io::{InitialCondition, Output};
use crate::solver::Solver;
use tracing::{debug, error, info};

/// Position of the driver within a time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepState {
    Init,
    ComputingCourants,
    Advecting,
    ApplyingForcing,
    ApplyingAdjustments,
    Cycling,
    RefreshingHalos,
    Done,
}

impl StepState {
    /// The state entered after `self` within a step.
    ///
    /// `RefreshingHalos` wraps around to the start of the next step; deciding when to
    /// stop is up to the driver.
    pub fn next(self, constant_velocity: bool) -> StepState {
        let start = if constant_velocity {
            StepState::Advecting
        } else {
            StepState::ComputingCourants
        };
        match self {
            StepState::Init | StepState::RefreshingHalos => start,
            StepState::ComputingCourants => StepState::Advecting,
            StepState::Advecting => StepState::ApplyingForcing,
            StepState::ApplyingForcing => StepState::ApplyingAdjustments,
            StepState::ApplyingAdjustments => StepState::Cycling,
            StepState::Cycling => StepState::RefreshingHalos,
            StepState::Done => StepState::Done,
        }
    }
}

/// Advances a [`Solver`] through `nt` time steps.
#[derive(Debug)]
pub struct Driver {
    solver: Solver,
    nt: usize,
    state: StepState,
}

impl Driver {
    pub fn new(solver: Solver, nt: usize) -> Self {
        let state = if nt == 0 {
            StepState::Done
        } else {
            StepState::Init
        };
        Self { solver, nt, state }
    }

    /// Builds the solver from a configuration and steps it `config.nt` times.
    pub fn from_config(
        config: &RunConfig,
        equations: Box<dyn EquationSystem>,
        initial: &dyn InitialCondition,
    ) -> IcicleResult<Self> {
        Ok(Self::new(Solver::new(config, equations, initial)?, config.nt))
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn into_solver(self) -> Solver {
        self.solver
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn nt(&self) -> usize {
        self.nt
    }

    /// Returns true once all `nt` steps have been taken.
    pub fn finished(&self) -> bool {
        self.state == StepState::Done
    }

    /// Performs one time step.
    pub fn step(&mut self) -> IcicleResult<()> {
        self.step_with(|_, _| {})
    }

    /// Performs one time step, calling `observer` after each state completes.
    ///
    /// # Panics
    ///
    /// Panics if the driver is already `Done`.
    pub fn step_with<F>(&mut self, mut observer: F) -> IcicleResult<()>
    where
        F: FnMut(StepState, &Solver),
    {
        assert!(!self.finished(), "all {} time steps have been taken", self.nt);
        let constant = self.solver.has_constant_velocity();
        let mut state = self.state.next(constant);
        loop {
            self.state = state;
            if let Err(err) = self.execute(state) {
                error!(
                    timestep = self.solver.timestep(),
                    state = ?state,
                    error = %err,
                    "time step failed"
                );
                return Err(err);
            }
            observer(state, &self.solver);
            if state == StepState::RefreshingHalos {
                break;
            }
            state = state.next(constant);
        }

        debug!(timestep = self.solver.timestep(), "completed time step");
        if self.solver.timestep() >= self.nt {
            self.state = StepState::Done;
        }
        Ok(())
    }

    fn execute(&mut self, state: StepState) -> IcicleResult<()> {
        let solver = &mut self.solver;
        match state {
            StepState::ComputingCourants => solver.update_courants(),
            StepState::Advecting => {
                for e in 0..solver.fields().len() {
                    solver.advect(e);
                }
                Ok(())
            }
            StepState::ApplyingForcing => solver.apply_forcing(),
            StepState::ApplyingAdjustments => {
                solver.apply_adjustments()?;
                solver.check_finite(Level::Next)
            }
            StepState::Cycling => {
                solver.cycle();
                Ok(())
            }
            StepState::RefreshingHalos => {
                solver.refresh_halos();
                Ok(())
            }
            StepState::Init | StepState::Done => {
                unreachable!("{:?} is never entered within a step", state)
            }
        }
    }

    /// Steps until `Done` without recording.
    pub fn advance(&mut self) -> IcicleResult<()> {
        while !self.finished() {
            self.step()?;
        }
        Ok(())
    }

    /// Steps until `Done`, recording the initial state, every `outfreq`-th step and the
    /// final state.
    pub fn run(&mut self, output: &mut dyn Output, outfreq: usize) -> IcicleResult<()> {
        if outfreq == 0 {
            return Err(IcicleError::Config(
                "output frequency must be at least 1".to_string(),
            ));
        }
        info!(nt = self.nt, outfreq, "starting run");
        if self.solver.timestep() == 0 {
            self.solver.record(output)?;
        }
        while !self.finished() {
            self.step()?;
            let t = self.solver.timestep();
            if t % outfreq == 0 || t == self.nt {
                self.solver.record(output)?;
            }
        }
        info!(timesteps = self.solver.timestep(), "run complete");
        Ok(())
    }
}
