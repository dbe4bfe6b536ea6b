use clap::Parser;
use sph_hydro::{
    solver::get_solver, ConfigError, Engine, InitialConditions, SimulationParameters, Space,
};
use std::{error::Error, fs, path::PathBuf, time::Instant};
use yaml_rust::{Yaml, YamlLoader};

#[derive(Parser)]
pub struct Cli {
    /// The path to the config file to read
    #[clap(parse(from_os_str))]
    pub config: PathBuf,
}

struct Config {
    parameters: SimulationParameters,
    solver: Yaml,
    engine: Yaml,
    gravity: Yaml,
    initial_conditions: Yaml,
}

impl Config {
    fn parse(file: PathBuf) -> Result<Self, Box<dyn Error>> {
        let mut docs = YamlLoader::load_from_str(&fs::read_to_string(file)?)?;
        if docs.is_empty() {
            return Err(Box::new(ConfigError::MissingParameter(
                "parameters".to_string(),
            )));
        }
        let config_yml = docs.swap_remove(0);

        let solver = config_yml["solver"].clone();
        if solver.is_badvalue() {
            return Err(Box::new(ConfigError::MissingParameter("solver".to_string())));
        }
        let engine = config_yml["engine"].clone();
        if engine.is_badvalue() {
            return Err(Box::new(ConfigError::MissingParameter("engine".to_string())));
        }

        Ok(Self {
            parameters: SimulationParameters::init(&config_yml["parameters"])?,
            solver,
            engine,
            gravity: config_yml["gravity"].clone(),
            initial_conditions: config_yml["initial_conditions"].clone(),
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // parse command line parameters
    let args = Cli::parse();

    // read configuration
    let config = Config::parse(args.config)?;

    // Setup simulation
    let solver = get_solver(&config.solver, config.parameters)?;
    let mut engine = Engine::init(&config.engine, solver)?;
    let ic = InitialConditions::init(
        &config.initial_conditions,
        config.parameters.particle_spacing(),
    )?;
    if ic.is_empty() {
        return Err(Box::new(ConfigError::MissingParameter(
            "initial_conditions:fluid".to_string(),
        )));
    }
    let mut space = Space::from_ic(ic, &config.gravity)?;

    // run
    let start = Instant::now();
    engine.run(&mut space);

    log::info!(
        "Done! {} steps in {:.3}s",
        engine.num_steps(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
