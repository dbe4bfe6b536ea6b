use glam::DVec2;
use rayon::prelude::*;
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError, fields::FieldOps, neighbours::NeighbourIndex,
    parameters::SimulationParameters, part::Particle, utils::parse_optional_f64,
};

use super::{
    fluid_average, parse_error_factor, parse_iterations, positions, velocities, SolverPool,
    SolverStats, SphSolver,
};

/// Diagonal elements below this magnitude are treated as zero.
const DIAGONAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IisphParameters {
    /// Relaxation factor of the Jacobi iterations, in `(0, 1]`.
    pub omega: f64,
    pub min_iterations: usize,
    pub max_iterations: usize,
    /// Maximal allowed average density error as a fraction of the rest density.
    pub max_density_error_factor: f64,
}

impl Default for IisphParameters {
    fn default() -> Self {
        Self {
            omega: 0.5,
            min_iterations: 2,
            max_iterations: 100,
            max_density_error_factor: 0.01,
        }
    }
}

impl IisphParameters {
    pub fn init(cfg: &Yaml) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let omega = parse_optional_f64(&cfg["omega"], "solver:omega")?.unwrap_or(defaults.omega);
        if !(omega > 0. && omega <= 1.) {
            return Err(ConfigError::InvalidParameter(
                "solver:omega".to_string(),
                format!("expected a value in (0, 1], got {omega}"),
            ));
        }
        let (min_iterations, max_iterations) =
            parse_iterations(cfg, defaults.min_iterations, defaults.max_iterations)?;
        let max_density_error_factor = parse_error_factor(
            cfg,
            "max_density_error_factor",
            defaults.max_density_error_factor,
        )?;
        Ok(Self {
            omega,
            min_iterations,
            max_iterations,
            max_density_error_factor,
        })
    }
}

/// Implicit incompressible SPH (Ihmsen et al. 2013).
///
/// Solves the pressure Poisson equation with relaxed Jacobi iterations. Boundary
/// particles mirror the pressure of the fluid particle interacting with them.
/// The pressures of the previous step are kept to warm start the next solve.
pub struct Iisph {
    fields: FieldOps,
    pool: SolverPool,
    solver_params: IisphParameters,
    previous_pressures: Vec<f64>,
}

impl Iisph {
    pub fn new(
        params: SimulationParameters,
        solver_params: IisphParameters,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            fields: FieldOps::new(params),
            pool: SolverPool::new(&params)?,
            solver_params,
            previous_pressures: vec![],
        })
    }

    pub fn solver_params(&self) -> &IisphParameters {
        &self.solver_params
    }

    /// The pressures of the last step, aligned with the particle slice.
    pub fn pressures(&self) -> &[f64] {
        &self.previous_pressures
    }

    fn solve(
        &mut self,
        particles: &mut [Particle],
        external_accelerations: &mut [DVec2],
        dt: f64,
    ) -> SolverStats {
        debug_assert_eq!(particles.len(), external_accelerations.len());
        let fields = &self.fields;
        let num_particles = particles.len();
        let mass = fields.params().particle_mass();
        let dt2 = dt * dt;
        let external_accelerations: &[DVec2] = external_accelerations;
        let parts: &[Particle] = particles;

        let positions = positions(parts);
        let velocities = velocities(parts);
        let neighbours = NeighbourIndex::build(parts, fields.params().smoothing_length());
        let grad = |i: usize, j: usize| fields.kernel_gradient(positions[i] - positions[j]);

        let rest_density = fields.rest_density();
        let densities = (0..num_particles)
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    rest_density
                } else {
                    fields.density(&positions, &neighbours[i], i)
                }
            })
            .collect::<Vec<_>>();

        // Advection without pressure forces
        let advected_velocities = (0..num_particles)
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    return parts[i].v;
                }
                let a_viscosity = fields.viscosity_acceleration(
                    &positions,
                    &velocities,
                    &neighbours[i],
                    &densities,
                    i,
                );
                parts[i].v + dt * (a_viscosity + external_accelerations[i])
            })
            .collect::<Vec<_>>();
        let self_displacements = (0..num_particles)
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    return DVec2::ZERO;
                }
                let factor = -dt2 * mass / (densities[i] * densities[i]);
                neighbours[i].iter().fold(DVec2::ZERO, |d_ii, &j| {
                    let mirror = if parts[j].boundary { 2. } else { 1. };
                    d_ii + mirror * factor * grad(i, j)
                })
            })
            .collect::<Vec<_>>();
        let (advected_densities, diagonal): (Vec<f64>, Vec<f64>) = (0..num_particles)
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    return (rest_density, 0.);
                }
                let d_ji_factor = dt2 * mass / (densities[i] * densities[i]);
                neighbours[i]
                    .iter()
                    .fold((densities[i], 0.), |(density, a_ii), &j| {
                        let grad_ij = grad(i, j);
                        let d_ji = if parts[j].boundary {
                            DVec2::ZERO
                        } else {
                            d_ji_factor * grad_ij
                        };
                        (
                            density
                                + dt * mass * (advected_velocities[i] - advected_velocities[j]).dot(grad_ij),
                            a_ii + mass * (self_displacements[i] - d_ji).dot(grad_ij),
                        )
                    })
            })
            .unzip();

        // Warm start
        if self.previous_pressures.len() != num_particles {
            self.previous_pressures = vec![0.; num_particles];
        }
        let mut pressures = self
            .previous_pressures
            .par_iter()
            .zip(parts.par_iter())
            .map(|(&pressure, part)| if part.boundary { 0. } else { 0.5 * pressure })
            .collect::<Vec<_>>();

        let omega = self.solver_params.omega;
        let error_threshold = self.solver_params.max_density_error_factor * rest_density;
        let mut stats = SolverStats::default();
        loop {
            let displacement_sums = (0..num_particles)
                .into_par_iter()
                .map(|i| {
                    if parts[i].boundary {
                        return DVec2::ZERO;
                    }
                    neighbours[i]
                        .iter()
                        .filter(|&&j| parts[j].is_fluid())
                        .fold(DVec2::ZERO, |sum, &j| {
                            sum - dt2 * mass * pressures[j] / (densities[j] * densities[j])
                                * grad(i, j)
                        })
                })
                .collect::<Vec<_>>();

            let (updated_pressures, errors): (Vec<f64>, Vec<f64>) = (0..num_particles)
                .into_par_iter()
                .map(|i| {
                    if parts[i].boundary {
                        return (0., 0.);
                    }
                    let d_ji_factor = dt2 * mass / (densities[i] * densities[i]);
                    let sum_i = displacement_sums[i];
                    let off_diagonal = neighbours[i].iter().fold(0., |s, &j| {
                        let grad_ij = grad(i, j);
                        if parts[j].boundary {
                            return s + mass * sum_i.dot(grad_ij);
                        }
                        let d_ji = d_ji_factor * grad_ij;
                        let sum_j = displacement_sums[j] - d_ji * pressures[i];
                        s + mass * (sum_i - self_displacements[j] * pressures[j] - sum_j).dot(grad_ij)
                    });

                    let a_ii = diagonal[i];
                    let pressure = if a_ii.abs() > DIAGONAL_EPSILON {
                        ((1. - omega) * pressures[i]
                            + omega * (rest_density - advected_densities[i] - off_diagonal) / a_ii)
                            .max(0.)
                    } else {
                        0.
                    };
                    let predicted_density = advected_densities[i] + a_ii * pressure + off_diagonal;
                    (pressure, (predicted_density - rest_density).max(0.))
                })
                .unzip();
            pressures = updated_pressures;

            let average_error = fluid_average(parts, &errors);
            stats.iterations += 1;
            stats.density_errors.push(average_error);
            if (average_error <= error_threshold
                && stats.iterations >= self.solver_params.min_iterations)
                || stats.iterations >= self.solver_params.max_iterations
            {
                break;
            }
        }
        log::debug!(
            "IISPH: {} iterations, average density error: {:.3e} (threshold: {:.3e})",
            stats.iterations,
            stats.final_density_error().unwrap_or_default(),
            error_threshold
        );

        // Pressure accelerations, with the pressure mirrored onto boundary particles
        let pressure_accelerations = (0..num_particles)
            .into_par_iter()
            .map(|i| {
                if parts[i].boundary {
                    return DVec2::ZERO;
                }
                let p_over_rho2_i = pressures[i] / (densities[i] * densities[i]);
                let sum = neighbours[i].iter().fold(DVec2::ZERO, |sum, &j| {
                    let p_over_rho2_j = if parts[j].boundary {
                        p_over_rho2_i
                    } else {
                        pressures[j] / (densities[j] * densities[j])
                    };
                    sum + mass * (p_over_rho2_i + p_over_rho2_j) * grad(i, j)
                });
                -mass * sum
            })
            .collect::<Vec<_>>();

        particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, part)| {
                if part.boundary {
                    return;
                }
                part.v = advected_velocities[i] + dt * pressure_accelerations[i];
                part.drift(dt);
            });
        self.previous_pressures = pressures;

        stats
    }
}

impl SphSolver for Iisph {
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
        "IISPH"
    }

    fn fields(&self) -> &FieldOps {
        &self.fields
    }

    fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }
}
