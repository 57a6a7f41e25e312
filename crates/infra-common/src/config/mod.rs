//! TOML configuration loading.
//!
//! Config structs across the workspace derive `Deserialize` with
//! `#[serde(default)]`, so a file only needs the keys it overrides.

use crate::errors::types::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Parse a config value from TOML text
pub fn from_toml_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}

/// Read and parse a TOML config file
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    tracing::debug!("Loaded config from {}", path.display());
    from_toml_str(&text).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}
