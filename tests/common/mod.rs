#![allow(dead_code)]

use glam::DVec2;
use sph_hydro::{
    solver::{get_solver, SphSolver},
    InitialConditions, Particle, SimulationParameters,
};
use yaml_rust::{Yaml, YamlLoader};

pub const CONFIG: &str = r###"
parameters:
  particle_spacing: 1.
  smoothing_length: 2.
  sound_speed: 20.
  stiffness: 7.
  viscosity: 0.1
  particle_mass: 1.
  max_parallelism: 2

solver:
  kind: "PCISPH"
  min_iterations: 2
  max_iterations: 5
  max_density_error_factor: 0.05

engine:
  dt: 0.01
  t_end: 0.1
  dt_status: 0.05

gravity:
  acceleration: [0., -1.]

initial_conditions:
  fluid:
    - kind: "circle"
      centre: [0., 5.]
      radius: 3.
      velocity: [1., 0.]
  boundary:
    - kind: "line"
      start: [-8., -1.]
      end: [8., -1.]
    - kind: "circle"
      centre: [0., 3.]
      radius: 10.
"###;

pub const PARAMETERS_CONFIG: &str = r##"
particle_spacing: 1.
smoothing_length: 2.
sound_speed: 20.
stiffness: 7.
viscosity: 0.1
particle_mass: 1.
"##;

/// Particle spacing close to the smoothing length: the rest density is lower than the density
/// of two particles half a smoothing length apart.
pub const SPARSE_PARAMETERS_CONFIG: &str = r##"
particle_spacing: 1.5
smoothing_length: 2.
sound_speed: 20.
stiffness: 7.
viscosity: 0.1
particle_mass: 1.
"##;

pub const WCSPH_CONFIG: &str = r##"
kind: "WCSPH"
"##;

pub const PCISPH_CONFIG: &str = r##"
kind: "PCISPH"
min_iterations: 3
max_iterations: 3
max_density_error_factor: 0.05
"##;

pub const IISPH_CONFIG: &str = r##"
kind: "IISPH"
omega: 0.5
min_iterations: 4
max_iterations: 4
"##;

pub const DFSPH_CONFIG: &str = r##"
kind: "DFSPH"
min_iterations: 4
max_iterations: 4
max_divergence_error_factor: 1000.
"##;

pub const SOLVER_CONFIGS: [&str; 4] = [WCSPH_CONFIG, PCISPH_CONFIG, IISPH_CONFIG, DFSPH_CONFIG];

pub fn load(cfg: &str) -> Yaml {
    YamlLoader::load_from_str(cfg).unwrap().remove(0)
}

pub fn get_params(cfg: &str) -> SimulationParameters {
    SimulationParameters::init(&load(cfg)).unwrap()
}

/// All solver variants, with the given parameters.
pub fn get_solvers(params_cfg: &str) -> Vec<Box<dyn SphSolver>> {
    let params = get_params(params_cfg);
    SOLVER_CONFIGS
        .iter()
        .map(|cfg| get_solver(&load(cfg), params).unwrap())
        .collect()
}

/// A block of `nx` by `ny` fluid particles with the given spacing.
pub fn fluid_block(nx: usize, ny: usize, spacing: f64) -> Vec<Particle> {
    InitialConditions::new(spacing)
        .fluid_block(
            DVec2::ZERO,
            spacing * DVec2::new((nx - 1) as f64, (ny - 1) as f64),
            DVec2::ZERO,
        )
        .into_parts()
}

/// A fluid block resting above a boundary floor and between two boundary walls.
pub fn tank() -> Vec<Particle> {
    InitialConditions::new(1.)
        .fluid_block(DVec2::new(1., 1.), DVec2::new(8., 6.), DVec2::ZERO)
        .boundary_line(DVec2::new(-1., 0.), DVec2::new(10., 0.))
        .boundary_line(DVec2::new(-1., 1.), DVec2::new(-1., 10.))
        .boundary_line(DVec2::new(10., 1.), DVec2::new(10., 10.))
        .into_parts()
}

pub fn step_n(
    solver: &mut dyn SphSolver,
    particles: &mut [Particle],
    gravity: DVec2,
    dt: f64,
    num_steps: usize,
) {
    for _ in 0..num_steps {
        let mut external_accelerations: Vec<_> = particles
            .iter()
            .map(|part| if part.boundary { DVec2::ZERO } else { gravity })
            .collect();
        solver.step(particles, &mut external_accelerations, dt);
    }
}
