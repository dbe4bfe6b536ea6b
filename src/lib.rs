//! Two dimensional Smoothed Particle Hydrodynamics (SPH) fluid solvers.
//!
//! The library provides weakly compressible (WCSPH), predictive-corrective (PCISPH), implicit
//! incompressible (IISPH) and divergence-free (DFSPH) solvers, which share the same neighbour
//! search, kernel and field estimates.

pub use engine::Engine;
pub use errors::ConfigError;
pub use initial_conditions::InitialConditions;
pub use parameters::SimulationParameters;
pub use part::Particle;
pub use space::Space;

mod engine;
mod equation_of_state;
mod errors;
pub mod fields;
mod initial_conditions;
pub mod kernels;
pub mod neighbours;
mod parameters;
mod part;
pub mod solver;
mod space;
mod utils;
