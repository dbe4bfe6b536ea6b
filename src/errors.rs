use std::{
    error::Error,
    fmt::{Debug, Display},
};

#[derive(Debug)]
pub enum ConfigError {
    MissingParameter(String),
    InvalidParameter(String, String),
    UnknownSolver(String),
    UnknownICs(String),
    IllegalDVec2(String),
    ThreadPool(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingParameter(name) => {
                write!(f, "Missing required parameter in configuration: {}", name)
            }
            ConfigError::InvalidParameter(name, reason) => {
                write!(f, "Invalid value for parameter {}: {}", name, reason)
            }
            ConfigError::UnknownSolver(name) => {
                write!(f, "Unknown type of SPH solver configured: {name}")
            }
            ConfigError::UnknownICs(name) => {
                write!(f, "Unknown type of initial conditions configured: {}", name)
            }
            ConfigError::IllegalDVec2(name) => {
                write!(f, "Illegal DVec2 format: {}!", name)
            }
            ConfigError::ThreadPool(reason) => {
                write!(f, "Unable to build thread pool: {}", reason)
            }
        }
    }
}

impl Error for ConfigError {}
