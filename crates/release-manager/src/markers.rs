//! `<%= KIND['key'] %>` marker substitution.
//!
//! A marker may sit anywhere inside a string scalar, several may share one
//! scalar, and a marker's key may itself contain markers. Resolution works
//! from the last opening `<%=` backwards, so inner markers are replaced before
//! the marker that encloses them. Text outside markers, including text
//! produced by a substitution, is never rescanned.

use std::env;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use release_manager_process::run_shell;
use release_manager_types::ReleaseError;
use serde_yaml::{Mapping, Value};

use crate::functions::FunctionTable;

const OPEN: &str = "<%=";
const CLOSE: &str = "%>";

static MARKER_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(ENV|CMD|FUNC)\['(.*)'\]\s*$").expect("marker pattern is valid")
});

static CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_]*)\((.*)\)\s*$").expect("call pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Environment variable lookup.
    Env,
    /// Trimmed stdout of a shell command.
    Cmd,
    /// Call into the [`FunctionTable`].
    Func,
}

/// A parsed marker body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub key: String,
}

impl Marker {
    /// Parse the text between `<%=` and `%>`.
    pub fn parse(body: &str) -> Result<Self, ReleaseError> {
        let caps = MARKER_BODY.captures(body).ok_or_else(|| {
            ReleaseError::config(format!(
                "unrecognised marker '{}'; expected ENV['..'], CMD['..'] or FUNC['..']",
                body.trim()
            ))
        })?;
        let kind = match &caps[1] {
            "ENV" => MarkerKind::Env,
            "CMD" => MarkerKind::Cmd,
            _ => MarkerKind::Func,
        };
        Ok(Self {
            kind,
            key: caps[2].to_string(),
        })
    }

    /// Produce the replacement text.
    pub fn evaluate(&self, functions: &FunctionTable) -> Result<String> {
        match self.kind {
            MarkerKind::Env => env::var(&self.key).map_err(|e| {
                ReleaseError::config(format!(
                    "environment variable '{}' could not be read: {e}",
                    self.key
                ))
                .into()
            }),
            MarkerKind::Cmd => {
                let result = run_shell(&self.key).map_err(|e| {
                    ReleaseError::config(format!("command '{}' could not be run: {e:#}", self.key))
                })?;
                if !result.success {
                    return Err(ReleaseError::config(format!(
                        "command '{}' exited with {:?}: {}",
                        self.key,
                        result.exit_code,
                        result.stderr.trim()
                    ))
                    .into());
                }
                Ok(result.stdout.trim().to_string())
            }
            MarkerKind::Func => {
                let caps = CALL.captures(&self.key).ok_or_else(|| {
                    ReleaseError::config(format!(
                        "malformed function call '{}'; expected name(argument)",
                        self.key
                    ))
                })?;
                functions.call(&caps[1], caps[2].trim())
            }
        }
    }
}

/// Replace every marker inside `text`.
pub fn resolve_scalar(text: &str, functions: &FunctionTable) -> Result<String> {
    let mut current = text.to_string();
    let mut search_end = current.len();

    while let Some(start) = current[..search_end].rfind(OPEN) {
        let body_start = start + OPEN.len();
        let Some(close) = current[body_start..].find(CLOSE) else {
            return Err(ReleaseError::config(format!("unterminated marker in '{text}'")).into());
        };
        let body_end = body_start + close;

        let value = Marker::parse(&current[body_start..body_end])?.evaluate(functions)?;
        current.replace_range(start..body_end + CLOSE.len(), &value);
        search_end = start;
    }

    Ok(current)
}

/// Resolve markers in every string scalar of `document`.
pub fn resolve(document: &Value, functions: &FunctionTable) -> Result<Value> {
    Ok(match document {
        Value::String(s) if s.contains(OPEN) => Value::String(resolve_scalar(s, functions)?),
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| resolve(item, functions))
                .collect::<Result<_>>()?,
        ),
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve(v, functions)?);
            }
            Value::Mapping(out)
        }
        Value::Tagged(tagged) => {
            let mut tagged = tagged.as_ref().clone();
            tagged.value = resolve(&tagged.value, functions)?;
            Value::Tagged(Box::new(tagged))
        }
        other => other.clone(),
    })
}
