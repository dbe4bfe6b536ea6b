use yaml_rust::Yaml;

use crate::{
    errors::ConfigError,
    solver::{SolverStats, SphSolver},
    space::Space,
    utils::parse_optional_f64,
};

/// Fixed timestep run loop driving an [`SphSolver`] over a [`Space`].
pub struct Engine {
    solver: Box<dyn SphSolver>,
    dt: f64,
    t_end: f64,
    dt_status: f64,
    t_current: f64,
    t_next_status: f64,
    num_steps: usize,
}

impl Engine {
    pub fn new(
        solver: Box<dyn SphSolver>,
        dt: f64,
        t_end: f64,
        dt_status: f64,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [("engine:dt", dt), ("engine:dt_status", dt_status)] {
            if !(value > 0.) {
                return Err(ConfigError::InvalidParameter(
                    name.to_string(),
                    format!("expected a strictly positive number, got {value}"),
                ));
            }
        }
        if !(t_end >= 0.) {
            return Err(ConfigError::InvalidParameter(
                "engine:t_end".to_string(),
                format!("expected a non-negative number, got {t_end}"),
            ));
        }
        Ok(Self {
            solver,
            dt,
            t_end,
            dt_status,
            t_current: 0.,
            t_next_status: dt_status,
            num_steps: 0,
        })
    }

    /// Setup an engine from the `engine` section of a configuration file.
    pub fn init(cfg: &Yaml, solver: Box<dyn SphSolver>) -> Result<Self, ConfigError> {
        let dt = parse_optional_f64(&cfg["dt"], "engine:dt")?
            .ok_or(ConfigError::MissingParameter("engine:dt".to_string()))?;
        let t_end = parse_optional_f64(&cfg["t_end"], "engine:t_end")?
            .ok_or(ConfigError::MissingParameter("engine:t_end".to_string()))?;
        let dt_status = parse_optional_f64(&cfg["dt_status"], "engine:dt_status")?.unwrap_or(dt);
        Self::new(solver, dt, t_end, dt_status)
    }

    pub fn solver(&self) -> &dyn SphSolver {
        self.solver.as_ref()
    }

    pub fn time(&self) -> f64 {
        self.t_current
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn num_threads(&self) -> usize {
        self.solver.num_threads()
    }

    fn done(&self) -> bool {
        self.t_end - self.t_current <= 1e-9 * self.dt
    }

    /// Advance the space over a single timestep.
    pub fn step(&mut self, space: &mut Space) -> SolverStats {
        let mut external_accelerations = space.external_accelerations();
        let stats =
            self.solver
                .step_with_stats(space.parts_mut(), &mut external_accelerations, self.dt);
        space.self_check();

        self.num_steps += 1;
        self.t_current = self.num_steps as f64 * self.dt;
        stats
    }

    /// Run the simulation until `t_end`.
    pub fn run(&mut self, space: &mut Space) {
        log::info!(
            "Running {} on {} particles ({} fluid) with {} threads until t = {}",
            self.solver.label(),
            space.parts().len(),
            space.num_fluid(),
            self.num_threads(),
            self.t_end
        );

        while !self.done() {
            let stats = self.step(space);
            if self.t_current >= self.t_next_status - 1e-9 * self.dt || self.done() {
                self.log_status(space, &stats);
                while self.t_next_status <= self.t_current + 1e-9 * self.dt {
                    self.t_next_status += self.dt_status;
                }
            }
        }
    }

    fn log_status(&self, space: &Space, stats: &SolverStats) {
        let mass = self.solver.params().particle_mass();
        match stats.final_density_error() {
            Some(error) => log::info!(
                "Step {}, t = {:.4}: kinetic energy = {:.6e}, max speed = {:.4e}, {} iterations, density error = {:.3e}",
                self.num_steps,
                self.t_current,
                space.kinetic_energy(mass),
                space.max_speed(),
                stats.iterations,
                error
            ),
            None => log::info!(
                "Step {}, t = {:.4}: kinetic energy = {:.6e}, max speed = {:.4e}",
                self.num_steps,
                self.t_current,
                space.kinetic_energy(mass),
                space.max_speed()
            ),
        }
    }
}
