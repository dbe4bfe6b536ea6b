use glam::DVec2;

use crate::{
    equation_of_state::EquationOfState,
    kernels::{CubicSpline, Kernel},
    parameters::SimulationParameters,
};

/// The SPH field estimates shared by all solvers: densities, pressures and the
/// pairwise pressure and viscosity accelerations.
///
/// All per particle methods only read the given arrays and return the value for
/// particle `i`, so they can be evaluated for all particles in parallel.
#[derive(Debug, Clone, Copy)]
pub struct FieldOps {
    params: SimulationParameters,
    kernel: CubicSpline,
    eos: EquationOfState,
}

impl FieldOps {
    pub fn new(params: SimulationParameters) -> Self {
        Self {
            params,
            kernel: CubicSpline,
            eos: EquationOfState::tait(&params),
        }
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn kernel(&self, displacement: DVec2) -> f64 {
        self.kernel.kernel(displacement, self.params.smoothing_length())
    }

    pub fn kernel_gradient(&self, displacement: DVec2) -> DVec2 {
        self.kernel.gradient(displacement, self.params.smoothing_length())
    }

    /// Regular lattice with the particle spacing, starting at `start` in both directions and
    /// extending up to (and including) the smoothing length.
    pub fn lattice(&self, start: f64) -> impl Iterator<Item = DVec2> {
        let h = self.params.smoothing_length();
        let spacing = self.params.particle_spacing();
        let count = ((h + 0.5 * spacing - start) / spacing).floor() as i64;
        (0..=count).flat_map(move |a| {
            (0..=count).map(move |b| {
                DVec2::new(start + a as f64 * spacing, start + b as f64 * spacing)
            })
        })
    }

    /// Density of an infinite uniform fluid at rest, i.e. the kernel sum over a lattice with
    /// the particle spacing centered on the origin.
    pub fn rest_density(&self) -> f64 {
        let mass = self.params.particle_mass();
        self.lattice(-self.params.smoothing_length())
            .map(|pos| mass * self.kernel(pos))
            .sum()
    }

    pub fn density(&self, positions: &[DVec2], neighbours: &[usize], i: usize) -> f64 {
        let mass = self.params.particle_mass();
        let x_i = positions[i];
        let self_contribution = mass * self.kernel(DVec2::ZERO);
        neighbours.iter().fold(self_contribution, |density, &j| {
            density + mass * self.kernel(positions[j] - x_i)
        })
    }

    pub fn pressure(&self, density: f64, rest_density: f64) -> f64 {
        self.eos.pressure(density, rest_density)
    }

    /// Artificial viscosity (Monaghan), only acting between approaching particles.
    pub fn viscosity_acceleration(
        &self,
        positions: &[DVec2],
        velocities: &[DVec2],
        neighbours: &[usize],
        densities: &[f64],
        i: usize,
    ) -> DVec2 {
        let mass = self.params.particle_mass();
        let h = self.params.smoothing_length();
        let viscosity_h_c = 2. * self.params.viscosity() * h * self.params.sound_speed();
        let regularization = 0.01 * h * h;

        let mut acceleration = DVec2::ZERO;
        for &j in neighbours {
            let v_ab = velocities[i] - velocities[j];
            let x_ab = positions[i] - positions[j];
            let v_dot_x = v_ab.dot(x_ab);
            if v_dot_x >= 0. {
                // separating
                continue;
            }
            let mu = viscosity_h_c / (densities[i] + densities[j]);
            let pi_ab = -mu * v_dot_x / (x_ab.length_squared() + regularization);
            acceleration -= mass * pi_ab * self.kernel_gradient(x_ab);
        }
        acceleration
    }

    /// Symmetric pressure acceleration, antisymmetric for every pair of particles.
    pub fn pressure_acceleration(
        &self,
        positions: &[DVec2],
        neighbours: &[usize],
        densities: &[f64],
        pressures: &[f64],
        i: usize,
    ) -> DVec2 {
        let mass = self.params.particle_mass();
        let p_over_rho2_i = pressures[i] / (densities[i] * densities[i]);
        let sum = neighbours.iter().fold(DVec2::ZERO, |sum, &j| {
            let p_over_rho2_j = pressures[j] / (densities[j] * densities[j]);
            let gradient = self.kernel_gradient(positions[i] - positions[j]);
            sum + mass * (p_over_rho2_i + p_over_rho2_j) * gradient
        });
        -mass * sum
    }
}
