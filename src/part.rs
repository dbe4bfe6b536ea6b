use glam::DVec2;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: DVec2,
    pub v: DVec2,
    /// Boundary particles never move, their velocity stays zero.
    pub boundary: bool,
}

impl Particle {
    pub fn fluid(x: DVec2, v: DVec2) -> Self {
        Self {
            x,
            v,
            boundary: false,
        }
    }

    pub fn boundary(x: DVec2) -> Self {
        Self {
            x,
            v: DVec2::ZERO,
            boundary: true,
        }
    }

    pub fn is_fluid(&self) -> bool {
        !self.boundary
    }

    /// Drift the position over `dt` with the current velocity. Boundary particles are left untouched.
    pub fn drift(&mut self, dt: f64) {
        if self.boundary {
            return;
        }
        self.x += dt * self.v;
    }

    /// Apply an acceleration over `dt`. Boundary particles are left untouched.
    pub fn kick(&mut self, acceleration: DVec2, dt: f64) {
        if self.boundary {
            return;
        }
        self.v += dt * acceleration;
    }

    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        0.5 * mass * self.v.length_squared()
    }
}
