//! Configuration resolver: YAML file → typed [`Configuration`].
//!
//! The stages run in a fixed order and each one is a pure tree → tree step:
//!
//! 1. parse the YAML text into a [`serde_yaml::Value`]
//! 2. [`template::expand`] against the document itself
//! 3. [`markers::resolve`] every `ENV`/`CMD`/`FUNC` marker
//! 4. deserialize into [`Configuration`]
//!
//! Any failure is reported as [`ReleaseError::Config`].

use std::fs;
use std::path::Path;

use anyhow::Result;
use release_manager_types::{Configuration, ReleaseError};
use serde_yaml::Value;

use crate::functions::FunctionTable;
use crate::{markers, template};

/// Load and fully resolve the configuration at `path`.
pub fn resolve(path: &Path, functions: &FunctionTable) -> Result<Configuration> {
    let text = fs::read_to_string(path).map_err(|e| {
        ReleaseError::config(format!("failed to read config {}: {e}", path.display()))
    })?;
    resolve_str(&text, functions)
}

/// Resolve configuration text.
pub fn resolve_str(text: &str, functions: &FunctionTable) -> Result<Configuration> {
    into_configuration(resolve_document(text, functions)?)
}

/// Stages 1–3: the resolved, still untyped document.
pub fn resolve_document(text: &str, functions: &FunctionTable) -> Result<Value> {
    let raw = parse_document(text)?;
    let templated = template::expand(&raw)?;
    markers::resolve(&templated, functions)
}

pub fn parse_document(text: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(text)
        .map_err(|e| ReleaseError::config(format!("invalid config passed to the program: {e}")))?;
    match value {
        Value::Mapping(_) => Ok(value),
        Value::Null => Err(ReleaseError::config("config file is empty").into()),
        _ => Err(ReleaseError::config("config root must be a mapping").into()),
    }
}

pub fn into_configuration(document: Value) -> Result<Configuration> {
    serde_yaml::from_value(document)
        .map_err(|e| ReleaseError::config(format!("invalid config structure: {e}")).into())
}
