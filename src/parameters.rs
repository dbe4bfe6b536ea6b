use rayon::{ThreadPool, ThreadPoolBuilder};
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError,
    utils::{parse_optional_f64, parse_optional_usize},
};

/// Physical and numerical constants shared by all SPH solvers.
///
/// These are set once before the first step and are read-only during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    particle_spacing: f64,
    smoothing_length: f64,
    sound_speed: f64,
    stiffness: f64,
    viscosity: f64,
    particle_mass: f64,
    max_parallelism: Option<usize>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            particle_spacing: 1.,
            smoothing_length: 2.,
            sound_speed: 88.5,
            stiffness: 7.,
            viscosity: 0.08,
            particle_mass: 1.,
            max_parallelism: None,
        }
    }
}

fn positive(name: &str, value: f64) -> Result<f64, ConfigError> {
    if value > 0. && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter(
            name.to_string(),
            format!("expected a strictly positive number, got {value}"),
        ))
    }
}

impl SimulationParameters {
    pub fn new(
        particle_spacing: f64,
        smoothing_length: f64,
        sound_speed: f64,
        stiffness: f64,
        viscosity: f64,
        particle_mass: f64,
    ) -> Result<Self, ConfigError> {
        if !(viscosity >= 0.) {
            return Err(ConfigError::InvalidParameter(
                "parameters:viscosity".to_string(),
                format!("expected a non-negative number, got {viscosity}"),
            ));
        }
        Ok(Self {
            particle_spacing: positive("parameters:particle_spacing", particle_spacing)?,
            smoothing_length: positive("parameters:smoothing_length", smoothing_length)?,
            sound_speed: positive("parameters:sound_speed", sound_speed)?,
            stiffness: positive("parameters:stiffness", stiffness)?,
            viscosity,
            particle_mass: positive("parameters:particle_mass", particle_mass)?,
            max_parallelism: None,
        })
    }

    /// Read the parameters from the `parameters` section of a configuration file.
    ///
    /// Missing keys fall back to the defaults, the smoothing length defaults to twice the particle spacing.
    pub fn init(cfg: &Yaml) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read = |key: &str, default: f64| {
            parse_optional_f64(&cfg[key], &format!("parameters:{key}"))
                .map(|value| value.unwrap_or(default))
        };
        let particle_spacing = read("particle_spacing", defaults.particle_spacing)?;
        let smoothing_length = read("smoothing_length", 2. * particle_spacing)?;
        let sound_speed = read("sound_speed", defaults.sound_speed)?;
        let stiffness = read("stiffness", defaults.stiffness)?;
        let viscosity = read("viscosity", defaults.viscosity)?;
        let particle_mass = read("particle_mass", defaults.particle_mass)?;
        let max_parallelism =
            parse_optional_usize(&cfg["max_parallelism"], "parameters:max_parallelism")?;
        if max_parallelism == Some(0) {
            return Err(ConfigError::InvalidParameter(
                "parameters:max_parallelism".to_string(),
                "expected at least one thread, got 0".to_string(),
            ));
        }

        Ok(Self::new(
            particle_spacing,
            smoothing_length,
            sound_speed,
            stiffness,
            viscosity,
            particle_mass,
        )?
        .with_max_parallelism(max_parallelism))
    }

    pub fn with_max_parallelism(mut self, max_parallelism: Option<usize>) -> Self {
        self.max_parallelism = max_parallelism.map(|n| n.max(1));
        self
    }

    pub fn particle_spacing(&self) -> f64 {
        self.particle_spacing
    }

    pub fn smoothing_length(&self) -> f64 {
        self.smoothing_length
    }

    pub fn sound_speed(&self) -> f64 {
        self.sound_speed
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub fn viscosity(&self) -> f64 {
        self.viscosity
    }

    pub fn particle_mass(&self) -> f64 {
        self.particle_mass
    }

    pub fn max_parallelism(&self) -> Option<usize> {
        self.max_parallelism
    }

    /// Build a thread pool honouring the configured maximum parallelism.
    ///
    /// Without a limit, rayon picks the number of threads (one per logical core).
    pub fn thread_pool(&self) -> Result<ThreadPool, ConfigError> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(num_threads) = self.max_parallelism {
            builder = builder.num_threads(num_threads);
        }
        builder
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))
    }
}
