use common::{fluid_block, get_solvers, step_n, PARAMETERS_CONFIG};
use float_cmp::assert_approx_eq;
use glam::DVec2;
use sph_hydro::Particle;

mod common;

macro_rules! assert_approx_eq_dvec2 {
    ($a:expr, $b:expr, epsilon=$eps:expr) => {
        assert_approx_eq!(f64, $a.x, $b.x, epsilon = $eps);
        assert_approx_eq!(f64, $a.y, $b.y, epsilon = $eps);
    };
}

fn boost(particles: &[Particle], velocity: DVec2) -> Vec<Particle> {
    particles
        .iter()
        .map(|part| Particle::fluid(part.x, part.v + velocity))
        .collect()
}

#[test]
fn test_galilean_invariance() {
    let boost_velocity = DVec2::new(0.3, -0.2);
    let dt = 0.002;
    let num_steps = 5;
    // Compressed, so the pressure forces are not trivial
    let particles = fluid_block(6, 6, 0.8);

    let solvers = get_solvers(PARAMETERS_CONFIG).into_iter();
    let boosted_solvers = get_solvers(PARAMETERS_CONFIG).into_iter();
    for (mut solver, mut boosted_solver) in solvers.zip(boosted_solvers) {
        let mut parts = particles.clone();
        let mut parts_boosted = boost(&particles, boost_velocity);
        step_n(solver.as_mut(), &mut parts, DVec2::ZERO, dt, num_steps);
        step_n(
            boosted_solver.as_mut(),
            &mut parts_boosted,
            DVec2::ZERO,
            dt,
            num_steps,
        );

        let t = dt * num_steps as f64;
        let mut moved = false;
        for ((part, part_boosted), initial) in parts.iter().zip(&parts_boosted).zip(&particles) {
            assert_approx_eq_dvec2!(part.x, part_boosted.x - t * boost_velocity, epsilon = 1e-9);
            assert_approx_eq_dvec2!(part.v, part_boosted.v - boost_velocity, epsilon = 1e-7);
            moved |= (part.x - initial.x).length() > 1e-6;
        }
        assert!(moved, "{}: the pressure forces did not act", solver.label());
    }
}
