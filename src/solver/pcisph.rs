use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec2;
use rayon::prelude::*;
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError, fields::FieldOps, neighbours::NeighbourIndex,
    parameters::SimulationParameters, part::Particle,
};

use super::{
    half_drift, parse_error_factor, parse_iterations, positions, velocities, SolverPool,
    SolverStats, SphSolver,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcisphParameters {
    pub min_iterations: usize,
    pub max_iterations: usize,
    /// Maximal allowed density error as a fraction of the rest density.
    pub max_density_error_factor: f64,
}

impl Default for PcisphParameters {
    fn default() -> Self {
        Self {
            min_iterations: 1,
            max_iterations: 1,
            max_density_error_factor: 0.05,
        }
    }
}

impl PcisphParameters {
    pub fn init(cfg: &Yaml) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let (min_iterations, max_iterations) =
            parse_iterations(cfg, defaults.min_iterations, defaults.max_iterations)?;
        let max_density_error_factor = parse_error_factor(
            cfg,
            "max_density_error_factor",
            defaults.max_density_error_factor,
        )?;
        Ok(Self {
            min_iterations,
            max_iterations,
            max_density_error_factor,
        })
    }
}

/// Predictive-corrective incompressible SPH (Solenthaler & Pajarola 2009).
///
/// Pressures are increased iteratively from the predicted density errors until the
/// maximal error drops below a threshold, or the maximal number of iterations is reached.
pub struct Pcisph {
    fields: FieldOps,
    pool: SolverPool,
    solver_params: PcisphParameters,
}

/// Thread safe running maximum of non-negative floats.
///
/// The bit patterns of non-negative IEEE 754 doubles are ordered like the values themselves.
struct AtomicMax(AtomicU64);

impl AtomicMax {
    fn new() -> Self {
        Self(AtomicU64::new(0f64.to_bits()))
    }

    fn update(&self, value: f64) {
        debug_assert!(value >= 0.);
        self.0.fetch_max(value.to_bits(), Ordering::Relaxed);
    }

    fn into_inner(self) -> f64 {
        f64::from_bits(self.0.into_inner())
    }
}

impl Pcisph {
    pub fn new(
        params: SimulationParameters,
        solver_params: PcisphParameters,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            fields: FieldOps::new(params),
            pool: SolverPool::new(&params)?,
            solver_params,
        })
    }

    pub fn solver_params(&self) -> &PcisphParameters {
        &self.solver_params
    }

    /// Prescribed density of boundary particles.
    fn boundary_density(&self, rest_density: f64) -> f64 {
        self.fields.params().smoothing_length() / std::f64::consts::SQRT_2 * rest_density
    }

    /// Pressure increment per unit of density error, precomputed on a filled lattice
    /// around a prototype particle.
    pub fn scaling_factor(&self, dt: f64, rest_density: f64) -> f64 {
        let params = self.fields.params();
        let spacing = params.particle_spacing();
        let (grad_sum, grad_dot_sum) = self
            .fields
            .lattice(-0.99 * params.smoothing_length())
            .filter(|pos| pos.length() >= 0.5 * spacing)
            .map(|pos| self.fields.kernel_gradient(pos))
            .fold((DVec2::ZERO, 0.), |(sum, dot_sum), grad| {
                (sum + grad, dot_sum + grad.dot(grad))
            });

        let beta = 2. * (dt * params.particle_mass() / rest_density).powi(2);
        -1. / (beta * (-grad_sum.dot(grad_sum) - grad_dot_sum))
    }

    fn solve(
        &self,
        particles: &mut [Particle],
        external_accelerations: &mut [DVec2],
        dt: f64,
    ) -> SolverStats {
        debug_assert_eq!(particles.len(), external_accelerations.len());
        let fields = &self.fields;
        let num_particles = particles.len();

        half_drift(particles, dt);
        let particles_ro: &[Particle] = particles;

        let mut predicted_positions = positions(particles_ro);
        let mut predicted_velocities = velocities(particles_ro);
        let neighbours = NeighbourIndex::build(particles_ro, fields.params().smoothing_length());

        let rest_density = fields.rest_density();
        let scaling_factor = self.scaling_factor(dt, rest_density);
        let boundary_density = self.boundary_density(rest_density);
        let boundary_pressure = fields.pressure(boundary_density, rest_density);

        let mut pressures = vec![0.; num_particles];
        let mut pressure_accelerations = vec![DVec2::ZERO; num_particles];
        let mut predicted_densities = vec![0.; num_particles];
        predicted_densities
            .par_iter_mut()
            .zip(pressures.par_iter_mut())
            .enumerate()
            .for_each(|(i, (density, pressure))| {
                if particles_ro[i].boundary {
                    *density = boundary_density;
                    *pressure = boundary_pressure;
                } else {
                    *density = fields.density(&predicted_positions, &neighbours[i], i);
                }
            });

        // Viscosity is treated as an external force during the pressure iterations
        external_accelerations
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, a_external)| {
                if particles_ro[i].boundary {
                    return;
                }
                *a_external += fields.viscosity_acceleration(
                    &predicted_positions,
                    &predicted_velocities,
                    &neighbours[i],
                    &predicted_densities,
                    i,
                );
            });
        let external_accelerations: &[DVec2] = external_accelerations;

        let error_threshold = self.solver_params.max_density_error_factor * rest_density;
        let mut max_error = 0.;
        let mut stats = SolverStats::default();
        while (max_error > error_threshold || stats.iterations < self.solver_params.min_iterations)
            && stats.iterations < self.solver_params.max_iterations
        {
            // Predict velocities and positions
            predicted_velocities
                .par_iter_mut()
                .zip(predicted_positions.par_iter_mut())
                .enumerate()
                .for_each(|(i, (v, x))| {
                    let part = &particles_ro[i];
                    if part.boundary {
                        return;
                    }
                    *v = part.v + dt * (external_accelerations[i] + pressure_accelerations[i]);
                    *x = part.x + 0.5 * dt * *v;
                });

            // Predict densities and correct pressures
            let iteration_max_error = AtomicMax::new();
            predicted_densities
                .par_iter_mut()
                .zip(pressures.par_iter_mut())
                .enumerate()
                .for_each(|(i, (density, pressure))| {
                    if particles_ro[i].boundary {
                        return;
                    }
                    *density = fields.density(&predicted_positions, &neighbours[i], i);
                    let error = (*density - rest_density).max(0.);
                    iteration_max_error.update(error);
                    *pressure += scaling_factor * error;
                });
            max_error = iteration_max_error.into_inner();

            // Update pressure accelerations
            pressure_accelerations
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, a_pressure)| {
                    if particles_ro[i].boundary {
                        return;
                    }
                    *a_pressure = fields.pressure_acceleration(
                        &predicted_positions,
                        &neighbours[i],
                        &predicted_densities,
                        &pressures,
                        i,
                    );
                });

            stats.iterations += 1;
            stats.density_errors.push(max_error);
        }
        log::debug!(
            "PCISPH: {} iterations, max density error: {:.3e} (threshold: {:.3e})",
            stats.iterations,
            max_error,
            error_threshold
        );

        // Integrate
        particles
            .par_iter_mut()
            .zip(pressure_accelerations.par_iter())
            .zip(external_accelerations.par_iter())
            .for_each(|((part, &a_pressure), &a_external)| {
                part.kick(a_pressure + a_external, dt);
                part.drift(0.5 * dt);
            });

        stats
    }
}

impl SphSolver for Pcisph {
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
        "PCISPH"
    }

    fn fields(&self) -> &FieldOps {
        &self.fields
    }

    fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }
}
