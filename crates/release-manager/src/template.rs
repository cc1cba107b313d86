//! Self-referential `{{ dotted.path }}` expansion.
//!
//! Every string scalar (and string mapping key) in the document is rendered
//! against the document's own root mapping. Expansion is a single pass over
//! the raw document: a referenced value that itself contains `{{ }}` is
//! inserted as written, not rendered again.
//!
//! A scalar that consists of exactly one expression is replaced by the
//! referenced value with its type intact, so `retries: "{{ defaults.retries }}"`
//! stays a number. Mixed text interpolates the scalar's text form. Undefined
//! variables render as the empty string.
//!
//! Paths are dotted names with optional `[index]` subscripts, so
//! `packages[0].version` and `packages.0.version` are the same lookup.
//! Anything else between braces (filters, calls, arithmetic) is rejected
//! rather than left in the output.

use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};
use release_manager_types::ReleaseError;
use serde_yaml::{Mapping, Value};

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\[\d+\])*(?:\.[A-Za-z0-9_\-]+(?:\[\d+\])*)*)\s*\}\}")
        .expect("expression pattern is valid")
});

/// Render `document` against itself.
pub fn expand(document: &Value) -> Result<Value> {
    render_value(document, document)
}

fn render_value(value: &Value, root: &Value) -> Result<Value> {
    Ok(match value {
        Value::String(s) => render_scalar(s, root)?,
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| render_value(item, root))
                .collect::<Result<_>>()?,
        ),
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => {
                        check_supported(s)?;
                        Value::String(render_text(s, root)?)
                    }
                    other => other.clone(),
                };
                out.insert(key, render_value(v, root)?);
            }
            Value::Mapping(out)
        }
        Value::Tagged(tagged) => {
            let mut tagged = tagged.as_ref().clone();
            tagged.value = render_value(&tagged.value, root)?;
            Value::Tagged(Box::new(tagged))
        }
        other => other.clone(),
    })
}

fn render_scalar(text: &str, root: &Value) -> Result<Value> {
    check_supported(text)?;
    let trimmed = text.trim();
    if let Some(caps) = EXPRESSION.captures(trimmed) {
        if caps[0].len() == trimmed.len() {
            return Ok(lookup(root, &caps[1])
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())));
        }
    }
    Ok(Value::String(render_text(text, root)?))
}

/// Braces left over once every path expression is taken out.
fn check_supported(text: &str) -> Result<(), ReleaseError> {
    if !text.contains("{{") && !text.contains("}}") {
        return Ok(());
    }
    let rest = EXPRESSION.replace_all(text, "");
    if rest.contains("{{") || rest.contains("}}") {
        return Err(ReleaseError::config(format!(
            "unsupported template expression in '{text}'"
        )));
    }
    Ok(())
}

fn render_text(text: &str, root: &Value) -> Result<String> {
    let mut failure = None;
    let rendered = EXPRESSION.replace_all(text, |caps: &Captures<'_>| {
        match lookup(root, &caps[1]).map(scalar_text) {
            Some(Ok(s)) => s,
            Some(Err(e)) => {
                if failure.is_none() {
                    failure = Some(e);
                }
                String::new()
            }
            None => String::new(),
        }
    });
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(rendered.into_owned()),
    }
}

/// Walk `path` from `root`. Segments are split on `.` and `[n]`; numeric
/// segments index sequences.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let normalized = path.replace('[', ".").replace(']', "");
    normalized.split('.').try_fold(root, |node, segment| match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Tagged(tagged) => match &tagged.value {
            Value::Mapping(map) => map.get(segment),
            _ => None,
        },
        _ => None,
    })
}

fn scalar_text(value: &Value) -> Result<String, ReleaseError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err(ReleaseError::config(
            "template expression refers to a list or mapping inside text",
        )),
    }
}
