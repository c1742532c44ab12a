// src/config/mod.rs

//! Session configuration for the `procline` driver.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a session file from disk (`loader.rs`).
//! - Validate it into typed steps (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ProcessSection, RawSessionConfig, ReaderSection, SessionConfig, Step, StepAction,
    StepConfig,
};
