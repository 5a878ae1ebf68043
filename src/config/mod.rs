// src/config/mod.rs

//! Declarative pipeline configuration for reflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and compile it into a pipeline
//!   (`loader.rs`).
//! - Validate basic invariants before use (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{build_pipeline, load_and_validate, load_from_path};
pub use model::{ConfigFile, DefaultSection, PipelineSection, RawConfigFile, TaskConfig};
