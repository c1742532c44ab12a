// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSessionConfig, SessionConfig};
use crate::errors::Result;

/// Load a session file from a given path and return the raw `RawSessionConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSessionConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawSessionConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a session file from path and validate it into a [`SessionConfig`].
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks the command path, reader settings and every step.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SessionConfig> {
    let raw_config = load_from_path(&path)?;
    let config = SessionConfig::try_from(raw_config)?;
    Ok(config)
}

/// `Procline.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Procline.toml")
}
