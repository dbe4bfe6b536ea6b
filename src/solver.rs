use std::sync::Arc;

use glam::DVec2;
use rayon::{prelude::*, ThreadPool};
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError, fields::FieldOps, parameters::SimulationParameters, part::Particle,
    utils::{parse_optional_f64, parse_optional_usize},
};

mod dfsph;
mod iisph;
mod pcisph;
mod wcsph;

pub use dfsph::{Dfsph, DfsphParameters};
pub use iisph::{Iisph, IisphParameters};
pub use pcisph::{Pcisph, PcisphParameters};
pub use wcsph::Wcsph;

/// Convergence information of a single step of an SPH solver.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SolverStats {
    /// Number of pressure (density) solver iterations.
    pub iterations: usize,
    /// The density error after every iteration, as measured by the solver.
    pub density_errors: Vec<f64>,
    /// Number of divergence solver iterations (DFSPH only).
    pub divergence_iterations: usize,
    /// Number of threads available to the parallel passes of the step.
    pub num_threads: usize,
}

impl SolverStats {
    pub fn final_density_error(&self) -> Option<f64> {
        self.density_errors.last().copied()
    }
}

/// A scheme advancing a set of SPH particles over one timestep.
pub trait SphSolver: Send + Sync {
    /// Advance all particles over `dt` and report the convergence of the step.
    ///
    /// `external_accelerations` holds one acceleration per particle and may be modified by the solver.
    /// All parallel passes run on the solver's own thread pool, bounded by
    /// [`SimulationParameters::max_parallelism`].
    fn step_with_stats(
        &mut self,
        particles: &mut [Particle],
        external_accelerations: &mut [DVec2],
        dt: f64,
    ) -> SolverStats;

    fn step(&mut self, particles: &mut [Particle], external_accelerations: &mut [DVec2], dt: f64) {
        self.step_with_stats(particles, external_accelerations, dt);
    }

    fn label(&self) -> &'static str;

    fn fields(&self) -> &FieldOps;

    /// Size of the thread pool running the parallel passes of a step.
    fn num_threads(&self) -> usize;

    fn params(&self) -> &SimulationParameters {
        self.fields().params()
    }
}

/// Thread pool shared by all parallel passes of a solver.
#[derive(Clone)]
struct SolverPool(Arc<ThreadPool>);

impl SolverPool {
    fn new(params: &SimulationParameters) -> Result<Self, ConfigError> {
        Ok(Self(Arc::new(params.thread_pool()?)))
    }

    fn num_threads(&self) -> usize {
        self.0.current_num_threads()
    }

    /// Run a solver step inside the pool.
    fn install<F>(&self, step: F) -> SolverStats
    where
        F: FnOnce() -> SolverStats + Send,
    {
        self.0.install(|| {
            let mut stats = step();
            stats.num_threads = rayon::current_num_threads();
            stats
        })
    }
}

/// Construct a solver from the `solver` section of a configuration file.
pub fn get_solver(
    cfg: &Yaml,
    params: SimulationParameters,
) -> Result<Box<dyn SphSolver>, ConfigError> {
    let kind = cfg["kind"]
        .as_str()
        .ok_or(ConfigError::MissingParameter("solver:kind".to_string()))?;
    let solver: Box<dyn SphSolver> = match kind {
        "WCSPH" => Box::new(Wcsph::new(params)?),
        "PCISPH" => Box::new(Pcisph::new(params, PcisphParameters::init(cfg)?)?),
        "IISPH" => Box::new(Iisph::new(params, IisphParameters::init(cfg)?)?),
        "DFSPH" => Box::new(Dfsph::new(params, DfsphParameters::init(cfg)?)?),
        _ => return Err(ConfigError::UnknownSolver(kind.to_string())),
    };
    Ok(solver)
}

/// Read the iteration bounds shared by the iterative solvers.
fn parse_iterations(
    cfg: &Yaml,
    default_min: usize,
    default_max: usize,
) -> Result<(usize, usize), ConfigError> {
    let read = |key: &str, default: usize| {
        parse_optional_usize(&cfg[key], &format!("solver:{key}"))
            .map(|value| value.unwrap_or(default))
    };
    let min_iterations = read("min_iterations", default_min)?;
    let max_iterations = read("max_iterations", default_max)?;
    if max_iterations == 0 || max_iterations < min_iterations {
        return Err(ConfigError::InvalidParameter(
            "solver:max_iterations".to_string(),
            format!("must be at least 1 and at least min_iterations ({min_iterations}), got {max_iterations}"),
        ));
    }
    Ok((min_iterations, max_iterations))
}

fn parse_error_factor(cfg: &Yaml, key: &str, default: f64) -> Result<f64, ConfigError> {
    let factor = parse_optional_f64(&cfg[key], &format!("solver:{key}"))?.unwrap_or(default);
    if factor > 0. {
        Ok(factor)
    } else {
        Err(ConfigError::InvalidParameter(
            format!("solver:{key}"),
            format!("expected a strictly positive number, got {factor}"),
        ))
    }
}

fn positions(particles: &[Particle]) -> Vec<DVec2> {
    particles.par_iter().map(|part| part.x).collect()
}

fn velocities(particles: &[Particle]) -> Vec<DVec2> {
    particles.par_iter().map(|part| part.v).collect()
}

/// Drift all fluid particles over half a timestep.
fn half_drift(particles: &mut [Particle], dt: f64) {
    particles.par_iter_mut().for_each(|part| part.drift(0.5 * dt));
}

/// Average of `values` over the fluid particles.
fn fluid_average(particles: &[Particle], values: &[f64]) -> f64 {
    let (sum, count) = particles
        .par_iter()
        .zip(values.par_iter())
        .filter(|(part, _)| part.is_fluid())
        .map(|(_, value)| (*value, 1usize))
        .reduce(|| (0., 0), |a, b| (a.0 + b.0, a.1 + b.1));
    if count == 0 {
        0.
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod test {
    use glam::DVec2;
    use rayon::ThreadPoolBuilder;
    use yaml_rust::YamlLoader;

    use super::get_solver;
    use crate::{errors::ConfigError, parameters::SimulationParameters, part::Particle};

    fn load(cfg: &str) -> yaml_rust::Yaml {
        YamlLoader::load_from_str(cfg).unwrap().remove(0)
    }

    #[test]
    fn test_get_solver() {
        let params = SimulationParameters::default();
        for (kind, label) in [
            ("WCSPH", "WCSPH"),
            ("PCISPH", "PCISPH"),
            ("IISPH", "IISPH"),
            ("DFSPH", "DFSPH"),
        ] {
            let solver = get_solver(&load(&format!("kind: \"{kind}\"")), params).unwrap();
            assert_eq!(solver.label(), label);
            assert_eq!(solver.params(), &params);
        }
    }

    #[test]
    fn test_get_solver_errors() {
        let params = SimulationParameters::default();
        assert!(matches!(
            get_solver(&load("kind: \"SPH\""), params),
            Err(ConfigError::UnknownSolver(_))
        ));
        assert!(matches!(
            get_solver(&load("min_iterations: 1"), params),
            Err(ConfigError::MissingParameter(_))
        ));
        assert!(matches!(
            get_solver(
                &load("kind: \"PCISPH\"\nmin_iterations: 4\nmax_iterations: 2"),
                params
            ),
            Err(ConfigError::InvalidParameter(..))
        ));
        assert!(get_solver(&load("kind: \"IISPH\"\nomega: 0."), params).is_err());
    }

    #[test]
    fn test_step_runs_on_solver_pool() {
        let params = SimulationParameters::default().with_max_parallelism(Some(3));
        let outer_pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        for kind in ["WCSPH", "PCISPH", "IISPH", "DFSPH"] {
            let mut solver = get_solver(&load(&format!("kind: \"{kind}\"")), params).unwrap();
            assert_eq!(solver.num_threads(), 3);

            let mut particles = vec![
                Particle::fluid(DVec2::ZERO, DVec2::ZERO),
                Particle::fluid(DVec2::new(0.5, 0.), DVec2::ZERO),
                Particle::boundary(DVec2::new(0., -1.)),
            ];
            let mut external = vec![DVec2::ZERO; particles.len()];
            let stats = solver.step_with_stats(&mut particles, &mut external, 0.001);
            assert_eq!(stats.num_threads, 3, "{kind}");

            // The caller's pool does not leak into the step
            let stats = outer_pool
                .install(|| solver.step_with_stats(&mut particles, &mut external, 0.001));
            assert_eq!(stats.num_threads, 3, "{kind}");
        }
    }
}
