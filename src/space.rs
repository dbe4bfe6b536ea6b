use glam::DVec2;
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError, initial_conditions::InitialConditions, part::Particle,
    utils::parse_optional_dvec2,
};

/// The particles of a simulation, together with the external (gravitational) acceleration
/// acting on them.
///
/// The passes over the particles here are sequential, parallel work belongs to the solver.
pub struct Space {
    parts: Vec<Particle>,
    gravity: DVec2,
}

impl Space {
    pub fn new(parts: Vec<Particle>, gravity: DVec2) -> Self {
        Self { parts, gravity }
    }

    /// Constructs a space from the given initial conditions and the `gravity` section of
    /// a configuration file (zero gravity when absent).
    pub fn from_ic(
        initial_conditions: InitialConditions,
        gravity_cfg: &Yaml,
    ) -> Result<Self, ConfigError> {
        let gravity = parse_optional_dvec2(&gravity_cfg["acceleration"], "gravity:acceleration")?
            .unwrap_or(DVec2::ZERO);
        Ok(Self::new(initial_conditions.into_parts(), gravity))
    }

    pub fn parts(&self) -> &[Particle] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Particle] {
        &mut self.parts
    }

    pub fn gravity(&self) -> DVec2 {
        self.gravity
    }

    pub fn num_fluid(&self) -> usize {
        self.parts.iter().filter(|part| part.is_fluid()).count()
    }

    /// One external acceleration per particle. Boundary particles feel no gravity.
    pub fn external_accelerations(&self) -> Vec<DVec2> {
        self.parts
            .iter()
            .map(|part| if part.boundary { DVec2::ZERO } else { self.gravity })
            .collect()
    }

    pub fn kinetic_energy(&self, particle_mass: f64) -> f64 {
        self.parts
            .iter()
            .map(|part| part.kinetic_energy(particle_mass))
            .sum()
    }

    /// Largest particle speed.
    pub fn max_speed(&self) -> f64 {
        self.parts
            .iter()
            .map(|part| part.v.length())
            .fold(0., f64::max)
    }

    /// Consistency checks, only run in debug builds.
    pub fn self_check(&self) {
        debug_assert!(
            self.parts
                .iter()
                .all(|part| part.x.is_finite() && part.v.is_finite()),
            "Non finite particle position or velocity encountered!"
        );
        debug_assert!(
            self.parts
                .iter()
                .filter(|part| part.boundary)
                .all(|part| part.v == DVec2::ZERO),
            "Boundary particle with non-zero velocity encountered!"
        );
    }
}
