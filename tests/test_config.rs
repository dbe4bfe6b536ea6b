use common::{load, CONFIG};
use float_cmp::assert_approx_eq;
use glam::DVec2;
use sph_hydro::{
    solver::get_solver, ConfigError, Engine, InitialConditions, SimulationParameters, Space,
};

mod common;

fn setup(config: &str) -> Result<(Engine, Space), ConfigError> {
    let config = load(config);
    let params = SimulationParameters::init(&config["parameters"])?;
    let solver = get_solver(&config["solver"], params)?;
    let engine = Engine::init(&config["engine"], solver)?;
    let ic = InitialConditions::init(&config["initial_conditions"], params.particle_spacing())?;
    let space = Space::from_ic(ic, &config["gravity"])?;
    Ok((engine, space))
}

#[test]
fn test_run_from_config() {
    let (mut engine, mut space) = setup(CONFIG).unwrap();
    assert_eq!(engine.solver().label(), "PCISPH");
    assert_eq!(engine.num_threads(), 2);
    assert_eq!(space.gravity(), DVec2::new(0., -1.));
    assert!(space.num_fluid() > 0);

    let initial = space.parts().to_vec();
    engine.run(&mut space);
    assert_eq!(engine.num_steps(), 10);
    assert_approx_eq!(f64, engine.time(), 0.1);

    let mut fluid_momentum = DVec2::ZERO;
    for (part, initial) in space.parts().iter().zip(&initial) {
        if part.boundary {
            assert_eq!(part, initial);
        } else {
            fluid_momentum += part.v;
        }
    }
    // The initial velocity is kept and gravity pulls the fluid down
    let mean_velocity = fluid_momentum / space.num_fluid() as f64;
    assert!(mean_velocity.x > 0.5);
    assert!(mean_velocity.y < 0.);
}

#[test]
fn test_config_errors() {
    let unknown_solver = CONFIG.replace("kind: \"PCISPH\"", "kind: \"SPH\"");
    assert!(matches!(setup(&unknown_solver), Err(ConfigError::UnknownSolver(_))));

    let invalid_spacing = CONFIG.replace("particle_spacing: 1.", "particle_spacing: -1.");
    assert!(matches!(
        setup(&invalid_spacing),
        Err(ConfigError::InvalidParameter(..))
    ));

    let invalid_gravity = CONFIG.replace("acceleration: [0., -1.]", "acceleration: [0., -1., 0.]");
    assert!(matches!(setup(&invalid_gravity), Err(ConfigError::IllegalDVec2(_))));

    let unknown_shape = CONFIG.replace("kind: \"line\"", "kind: \"spline\"");
    assert!(matches!(setup(&unknown_shape), Err(ConfigError::UnknownICs(_))));

    let missing_dt = CONFIG.replace("dt: 0.01", "");
    assert!(matches!(setup(&missing_dt), Err(ConfigError::MissingParameter(_))));
}
