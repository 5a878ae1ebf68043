// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline validation error: {0}")]
    ValidationError(String),

    #[error("Cycle detected in reaction dependencies: {0}")]
    DependencyCycle(String),

    #[error("State store violation: {0}")]
    StateViolation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ReflowError>;
