//! YAML documents on disk: definitions, groups, requests and source configs.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn from_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    Ok(serde_yaml::from_str(input)?)
}

pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Opening YAML file {path:?}"))?;
    from_str(&raw).with_context(|| format!("Parsing YAML file {path:?}"))
}

/// Like [`load_from_path`], but a missing file is `None` rather than an error.
pub fn load_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(raw) => from_str(&raw)
            .map(Some)
            .with_context(|| format!("Parsing YAML file {path:?}")),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("Opening YAML file {path:?}")),
    }
}

pub fn save_to_path<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = to_string(data)?;
    fs::write(path, serialized).with_context(|| format!("Writing YAML file {path:?}"))
}
