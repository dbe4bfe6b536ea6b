use std::f64::consts::PI;

use glam::DVec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use yaml_rust::Yaml;

use crate::{
    errors::ConfigError,
    part::Particle,
    utils::{parse_dvec2, parse_optional_dvec2, parse_optional_f64, parse_optional_usize},
};

/// Scene setup: a list of fluid and boundary particles built from simple shapes.
///
/// All shapes are sampled with the same particle spacing. Nothing checks for overlapping
/// shapes.
#[derive(Debug, Clone)]
pub struct InitialConditions {
    spacing: f64,
    parts: Vec<Particle>,
}

impl InitialConditions {
    pub fn new(spacing: f64) -> Self {
        debug_assert!(spacing > 0.);
        Self {
            spacing,
            parts: vec![],
        }
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn parts(&self) -> &[Particle] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Particle> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Fill the axis aligned rectangle `[min, max]` with fluid on a square lattice starting at `min`.
    pub fn fluid_block(mut self, min: DVec2, max: DVec2, velocity: DVec2) -> Self {
        let count = ((max - min) / self.spacing + 1e-9).floor();
        for a in 0..=(count.x as i64) {
            for b in 0..=(count.y as i64) {
                let x = min + self.spacing * DVec2::new(a as f64, b as f64);
                self.parts.push(Particle::fluid(x, velocity));
            }
        }
        self
    }

    /// Fill a disk with fluid, using the lattice points of its bounding square.
    pub fn fluid_circle(mut self, centre: DVec2, radius: f64, velocity: DVec2) -> Self {
        let count = (2. * radius / self.spacing + 1e-9).floor() as i64;
        for a in 0..=count {
            for b in 0..=count {
                let offset = DVec2::splat(-radius) + self.spacing * DVec2::new(a as f64, b as f64);
                if offset.length() <= radius {
                    self.parts.push(Particle::fluid(centre + offset, velocity));
                }
            }
        }
        self
    }

    /// A straight wall of boundary particles from `start` to `end` (both included).
    pub fn boundary_line(mut self, start: DVec2, end: DVec2) -> Self {
        let segments = ((end - start).length() / self.spacing).round().max(1.) as usize;
        for k in 0..=segments {
            let x = start.lerp(end, k as f64 / segments as f64);
            self.parts.push(Particle::boundary(x));
        }
        self
    }

    /// A ring of boundary particles, an arc length of one spacing apart.
    pub fn boundary_circle(mut self, centre: DVec2, radius: f64) -> Self {
        debug_assert!(radius > 0.);
        let d_angle = self.spacing / radius;
        let count = (2. * PI / d_angle).ceil() as usize;
        for k in 0..count {
            let angle = k as f64 * d_angle;
            let x = centre + radius * DVec2::new(angle.cos(), angle.sin());
            self.parts.push(Particle::boundary(x));
        }
        self
    }

    /// Randomly displace the fluid particles by at most `amplitude` times the spacing in
    /// each direction.
    pub fn perturb(mut self, amplitude: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_displacement = amplitude.abs() * self.spacing;
        if max_displacement == 0. {
            return self;
        }
        for part in self.parts.iter_mut().filter(|part| part.is_fluid()) {
            part.x += DVec2::new(
                rng.gen_range(-max_displacement..=max_displacement),
                rng.gen_range(-max_displacement..=max_displacement),
            );
        }
        self
    }

    /// Build the initial conditions from the `initial_conditions` section of a configuration file.
    ///
    /// `default_spacing` is used when the section does not set its own `spacing`.
    pub fn init(cfg: &Yaml, default_spacing: f64) -> Result<Self, ConfigError> {
        let spacing = parse_optional_f64(&cfg["spacing"], "initial_conditions:spacing")?
            .unwrap_or(default_spacing);
        if !(spacing > 0.) {
            return Err(ConfigError::InvalidParameter(
                "initial_conditions:spacing".to_string(),
                format!("expected a strictly positive number, got {spacing}"),
            ));
        }

        let mut ic = Self::new(spacing);
        for shape in shapes(&cfg["fluid"]) {
            let kind = shape_kind(shape, "fluid")?;
            let velocity = parse_optional_dvec2(&shape["velocity"], "fluid:velocity")?
                .unwrap_or(DVec2::ZERO);
            ic = match kind {
                "block" => ic.fluid_block(
                    parse_dvec2(&shape["min"], "fluid:block:min")?,
                    parse_dvec2(&shape["max"], "fluid:block:max")?,
                    velocity,
                ),
                "circle" => ic.fluid_circle(
                    parse_dvec2(&shape["centre"], "fluid:circle:centre")?,
                    radius(shape, "fluid:circle:radius")?,
                    velocity,
                ),
                _ => return Err(ConfigError::UnknownICs(format!("fluid:{kind}"))),
            };
        }
        for shape in shapes(&cfg["boundary"]) {
            let kind = shape_kind(shape, "boundary")?;
            ic = match kind {
                "line" => ic.boundary_line(
                    parse_dvec2(&shape["start"], "boundary:line:start")?,
                    parse_dvec2(&shape["end"], "boundary:line:end")?,
                ),
                "circle" => ic.boundary_circle(
                    parse_dvec2(&shape["centre"], "boundary:circle:centre")?,
                    radius(shape, "boundary:circle:radius")?,
                ),
                _ => return Err(ConfigError::UnknownICs(format!("boundary:{kind}"))),
            };
        }

        let perturbations =
            parse_optional_f64(&cfg["perturbations"], "initial_conditions:perturbations")?;
        if let Some(amplitude) = perturbations {
            let seed =
                parse_optional_usize(&cfg["seed"], "initial_conditions:seed")?.unwrap_or(0) as u64;
            ic = ic.perturb(amplitude, seed);
        }

        Ok(ic)
    }
}

fn shapes(yaml: &Yaml) -> impl Iterator<Item = &Yaml> {
    yaml.as_vec().into_iter().flatten()
}

fn shape_kind<'a>(shape: &'a Yaml, section: &str) -> Result<&'a str, ConfigError> {
    shape["kind"]
        .as_str()
        .ok_or(ConfigError::MissingParameter(format!(
            "initial_conditions:{section}:kind"
        )))
}

fn radius(shape: &Yaml, name: &str) -> Result<f64, ConfigError> {
    match parse_optional_f64(&shape["radius"], name)? {
        Some(radius) if radius > 0. => Ok(radius),
        Some(radius) => Err(ConfigError::InvalidParameter(
            name.to_string(),
            format!("expected a strictly positive number, got {radius}"),
        )),
        None => Err(ConfigError::MissingParameter(name.to_string())),
    }
}
