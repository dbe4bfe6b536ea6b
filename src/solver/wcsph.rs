use glam::DVec2;
use rayon::prelude::*;

use crate::{
    errors::ConfigError, fields::FieldOps, neighbours::NeighbourIndex,
    parameters::SimulationParameters, part::Particle,
};

use super::{half_drift, positions, velocities, SolverPool, SolverStats, SphSolver};

/// Weakly compressible SPH: explicit leapfrog integration with pressures from a stiff
/// equation of state.
///
/// Stability requires a timestep well below `h / c`, this is not checked.
pub struct Wcsph {
    fields: FieldOps,
    pool: SolverPool,
}

impl Wcsph {
    pub fn new(params: SimulationParameters) -> Result<Self, ConfigError> {
        Ok(Self {
            fields: FieldOps::new(params),
            pool: SolverPool::new(&params)?,
        })
    }

    /// Prescribed density of boundary particles.
    fn boundary_density(&self, rest_density: f64) -> f64 {
        self.fields.params().smoothing_length() * rest_density
    }

    fn solve(
        &self,
        particles: &mut [Particle],
        external_accelerations: &mut [DVec2],
        dt: f64,
    ) -> SolverStats {
        debug_assert_eq!(particles.len(), external_accelerations.len());
        let fields = &self.fields;

        // The forces are evaluated at the start of the step
        let positions = positions(particles);
        let velocities = velocities(particles);
        let neighbours = NeighbourIndex::build(particles, fields.params().smoothing_length());

        half_drift(particles, dt);

        let rest_density = fields.rest_density();
        let boundary_density = self.boundary_density(rest_density);
        let densities = particles
            .par_iter()
            .enumerate()
            .map(|(i, part)| {
                if part.boundary {
                    boundary_density
                } else {
                    fields.density(&positions, &neighbours[i], i)
                }
            })
            .collect::<Vec<_>>();
        let pressures = densities
            .par_iter()
            .map(|&density| fields.pressure(density, rest_density))
            .collect::<Vec<_>>();

        particles
            .par_iter_mut()
            .zip(external_accelerations.par_iter())
            .enumerate()
            .for_each(|(i, (part, &a_external))| {
                if part.boundary {
                    return;
                }
                let a_pressure = fields.pressure_acceleration(
                    &positions,
                    &neighbours[i],
                    &densities,
                    &pressures,
                    i,
                );
                let a_viscosity = fields.viscosity_acceleration(
                    &positions,
                    &velocities,
                    &neighbours[i],
                    &densities,
                    i,
                );
                part.kick(a_pressure + a_viscosity + a_external, dt);
                part.drift(0.5 * dt);
            });

        SolverStats::default()
    }
}

impl SphSolver for Wcsph {
    fn step_with_stats(
        &mut self,
        particles: &mut [Particle],
        external_accelerations: &mut [DVec2],
        dt: f64,
    ) -> SolverStats {
        let pool = self.pool.clone();
        pool.install(|| self.solve(particles, external_accelerations, dt))
    }

    fn label(&self) -> &'static str {
        "WCSPH"
    }

    fn fields(&self) -> &FieldOps {
        &self.fields
    }

    fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }
}
