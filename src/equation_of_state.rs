use crate::parameters::SimulationParameters;

/// Stiff equation of state for weakly compressible fluids.
#[derive(Debug, Clone, Copy)]
pub enum EquationOfState {
    /// Tait equation `p = rho_0 c^2 / gamma ((rho / rho_0)^gamma - 1)`, clamped to non-negative values.
    Tait { sound_speed: f64, gamma: f64 },
}

impl EquationOfState {
    pub fn tait(params: &SimulationParameters) -> Self {
        EquationOfState::Tait {
            sound_speed: params.sound_speed(),
            gamma: params.stiffness(),
        }
    }

    /// Pressure for a given density. Tensile (negative) pressures are clamped to zero.
    pub fn pressure(&self, density: f64, rest_density: f64) -> f64 {
        match self {
            EquationOfState::Tait { sound_speed, gamma } => {
                let pressure = rest_density * sound_speed * sound_speed / gamma
                    * ((density / rest_density).powf(*gamma) - 1.);
                // NaN (e.g. from a negative density with a fractional exponent) is also clamped
                pressure.max(0.)
            }
        }
    }
}
