use glam::DVec2;
use rayon::prelude::*;
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError,
    fields::FieldOps,
    neighbours::{NeighbourIndex, NeighbourLists},
    parameters::SimulationParameters,
    part::Particle,
};

use super::{
    fluid_average, parse_error_factor, parse_iterations, positions, velocities, SolverPool,
    SolverStats, SphSolver,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DfsphParameters {
    pub min_iterations: usize,
    pub max_iterations: usize,
    /// Maximal allowed average density error as a fraction of the rest density.
    pub max_density_error_factor: f64,
    /// Maximal allowed average density change rate as a fraction of `rest_density / dt`.
    pub max_divergence_error_factor: f64,
    pub divergence_solver: bool,
}

impl Default for DfsphParameters {
    fn default() -> Self {
        Self {
            min_iterations: 2,
            max_iterations: 100,
            max_density_error_factor: 0.01,
            max_divergence_error_factor: 0.1,
            divergence_solver: true,
        }
    }
}

impl DfsphParameters {
    pub fn init(cfg: &Yaml) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let (min_iterations, max_iterations) =
            parse_iterations(cfg, defaults.min_iterations, defaults.max_iterations)?;
        let divergence_solver = match &cfg["divergence_solver"] {
            Yaml::BadValue => defaults.divergence_solver,
            value => value.as_bool().ok_or(ConfigError::InvalidParameter(
                "solver:divergence_solver".to_string(),
                format!("expected a boolean, got {value:?}"),
            ))?,
        };
        Ok(Self {
            min_iterations,
            max_iterations,
            max_density_error_factor: parse_error_factor(
                cfg,
                "max_density_error_factor",
                defaults.max_density_error_factor,
            )?,
            max_divergence_error_factor: parse_error_factor(
                cfg,
                "max_divergence_error_factor",
                defaults.max_divergence_error_factor,
            )?,
            divergence_solver,
        })
    }
}

/// Divergence-free SPH (Bender & Koschier 2015).
///
/// Every step first removes the velocity divergence, then integrates the non pressure
/// forces and finally corrects the predicted velocities until the density error is small.
pub struct Dfsph {
    fields: FieldOps,
    pool: SolverPool,
    solver_params: DfsphParameters,
}

/// Read-only data shared by the two pressure solves of a step.
struct StepContext<'a> {
    fields: &'a FieldOps,
    parts: &'a [Particle],
    positions: Vec<DVec2>,
    neighbours: NeighbourLists,
    densities: Vec<f64>,
    alphas: Vec<f64>,
}

impl<'a> StepContext<'a> {
    fn new(fields: &'a FieldOps, parts: &'a [Particle], rest_density: f64) -> Self {
        let mass = fields.params().particle_mass();
        let positions = positions(parts);
        let neighbours = NeighbourIndex::build(parts, fields.params().smoothing_length());
        let densities = (0..parts.len())
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    rest_density
                } else {
                    fields.density(&positions, &neighbours[i], i)
                }
            })
            .collect::<Vec<_>>();

        // Stiffness factors relating a density error to the pressure impulse correcting it
        let alphas = (0..parts.len())
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    return 0.;
                }
                let (sum, sum_squared) =
                    neighbours[i]
                        .iter()
                        .fold((DVec2::ZERO, 0.), |(sum, sum_squared), &j| {
                            let grad = mass * fields.kernel_gradient(positions[i] - positions[j]);
                            if parts[j].boundary {
                                (sum + grad, sum_squared)
                            } else {
                                (sum + grad, sum_squared + grad.length_squared())
                            }
                        });
                let denominator = sum.length_squared() + sum_squared;
                if denominator < 1e-9 {
                    0.
                } else {
                    densities[i] / denominator
                }
            })
            .collect::<Vec<_>>();

        Self {
            fields,
            parts,
            positions,
            neighbours,
            densities,
            alphas,
        }
    }

    fn gradient(&self, i: usize, j: usize) -> DVec2 {
        self.fields
            .kernel_gradient(self.positions[i] - self.positions[j])
    }

    /// Rate of change of the density of every fluid particle for the given velocities.
    fn density_change_rates(&self, velocities: &[DVec2]) -> Vec<f64> {
        let mass = self.fields.params().particle_mass();
        (0..self.parts.len())
            .into_par_iter()
            .map(|i| {
                if self.parts[i].boundary {
                    return 0.;
                }
                self.neighbours[i].iter().fold(0., |rate, &j| {
                    rate + mass * (velocities[i] - velocities[j]).dot(self.gradient(i, j))
                })
            })
            .collect()
    }

    /// Apply the pressure impulses given by the stiffness values `kappas` to the velocities.
    fn correct_velocities(&self, velocities: &mut [DVec2], kappas: &[f64], dt: f64) {
        let mass = self.fields.params().particle_mass();
        velocities
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, v)| {
                if self.parts[i].boundary {
                    return;
                }
                let kappa_over_rho_i = kappas[i] / self.densities[i];
                let impulse = self.neighbours[i].iter().fold(DVec2::ZERO, |sum, &j| {
                    let kappa_over_rho_j = if self.parts[j].boundary {
                        0.
                    } else {
                        kappas[j] / self.densities[j]
                    };
                    sum + mass * (kappa_over_rho_i + kappa_over_rho_j) * self.gradient(i, j)
                });
                *v -= dt * impulse;
            });
    }
}

impl Dfsph {
    pub fn new(
        params: SimulationParameters,
        solver_params: DfsphParameters,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            fields: FieldOps::new(params),
            pool: SolverPool::new(&params)?,
            solver_params,
        })
    }

    pub fn solver_params(&self) -> &DfsphParameters {
        &self.solver_params
    }

    fn solve(
        &self,
        particles: &mut [Particle],
        external_accelerations: &mut [DVec2],
        dt: f64,
    ) -> SolverStats {
        debug_assert_eq!(particles.len(), external_accelerations.len());
        let fields = &self.fields;
        let solver_params = &self.solver_params;
        let external_accelerations: &[DVec2] = external_accelerations;
        let parts: &[Particle] = particles;

        let rest_density = fields.rest_density();
        let ctx = StepContext::new(fields, parts, rest_density);

        let mut stats = SolverStats::default();
        let mut velocities = velocities(parts);

        // Divergence solve
        if solver_params.divergence_solver {
            let threshold = solver_params.max_divergence_error_factor * rest_density / dt;
            loop {
                let sources = ctx
                    .density_change_rates(&velocities)
                    .into_par_iter()
                    .map(|rate| rate.max(0.))
                    .collect::<Vec<_>>();
                let kappas = sources
                    .par_iter()
                    .zip(ctx.alphas.par_iter())
                    .map(|(source, alpha)| source * alpha / dt)
                    .collect::<Vec<_>>();
                ctx.correct_velocities(&mut velocities, &kappas, dt);
                stats.divergence_iterations += 1;

                let average_source = fluid_average(parts, &sources);
                if average_source <= threshold
                    || stats.divergence_iterations >= solver_params.max_iterations
                {
                    log::debug!(
                        "DFSPH: {} divergence iterations, average divergence error: {:.3e} (threshold: {:.3e})",
                        stats.divergence_iterations,
                        average_source,
                        threshold
                    );
                    break;
                }
            }
        }

        // Non pressure forces, evaluated with the divergence free velocities
        let a_non_pressure = (0..parts.len())
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    return DVec2::ZERO;
                }
                fields.viscosity_acceleration(
                    &ctx.positions,
                    &velocities,
                    &ctx.neighbours[i],
                    &ctx.densities,
                    i,
                ) + external_accelerations[i]
            })
            .collect::<Vec<_>>();
        velocities
            .par_iter_mut()
            .zip(a_non_pressure.par_iter())
            .zip(parts.par_iter())
            .for_each(|((v, &a), part)| {
                if part.is_fluid() {
                    *v += dt * a;
                }
            });

        // Density solve
        let threshold = solver_params.max_density_error_factor * rest_density;
        loop {
            let errors = ctx
                .density_change_rates(&velocities)
                .into_par_iter()
                .enumerate()
                .map(|(i, rate)| {
                    if parts[i].boundary {
                        0.
                    } else {
                        (ctx.densities[i] + dt * rate).max(rest_density) - rest_density
                    }
                })
                .collect::<Vec<_>>();
            let kappas = errors
                .par_iter()
                .zip(ctx.alphas.par_iter())
                .map(|(error, alpha)| error * alpha / (dt * dt))
                .collect::<Vec<_>>();
            ctx.correct_velocities(&mut velocities, &kappas, dt);

            let average_error = fluid_average(parts, &errors);
            stats.iterations += 1;
            stats.density_errors.push(average_error);
            if (average_error <= threshold && stats.iterations >= solver_params.min_iterations)
                || stats.iterations >= solver_params.max_iterations
            {
                break;
            }
        }
        log::debug!(
            "DFSPH: {} density iterations, average density error: {:.3e} (threshold: {:.3e})",
            stats.iterations,
            stats.final_density_error().unwrap_or_default(),
            threshold
        );
        drop(ctx);

        particles
            .par_iter_mut()
            .zip(velocities.par_iter())
            .for_each(|(part, &v)| {
                if part.is_fluid() {
                    part.v = v;
                    part.drift(dt);
                }
            });

        stats
    }
}

impl SphSolver for Dfsph {
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
        "DFSPH"
    }

    fn fields(&self) -> &FieldOps {
        &self.fields
    }

    fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }
}
