//! Predefined functions callable from `FUNC['name(arg)']` markers.
//!
//! The table is immutable once built and is handed to the resolver
//! explicitly; there is no global registry.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use release_manager_process::{command_exists, run_command_in_dir};
use release_manager_types::ReleaseError;

use crate::heartbeat::Heartbeat;

/// A helper taking one string argument.
pub type HelperFn = fn(&str) -> Result<String>;

/// Name → helper lookup table.
#[derive(Clone, Default)]
pub struct FunctionTable {
    entries: BTreeMap<String, HelperFn>,
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl FunctionTable {
    /// Table with no functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The functions shipped with release-manager.
    pub fn builtin() -> Self {
        Self::empty().with("sbt_version", sbt_version)
    }

    pub fn with(mut self, name: &str, helper: HelperFn) -> Self {
        self.entries.insert(name.to_string(), helper);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Invoke `name(arg)`. Unknown names and helper failures are
    /// configuration errors.
    pub fn call(&self, name: &str, arg: &str) -> Result<String> {
        let helper = self.entries.get(name).ok_or_else(|| {
            ReleaseError::config(format!(
                "unknown function '{name}'; expected one of [{}]",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        helper(arg).map_err(|e| {
            ReleaseError::config(format!("function {name}({arg}) failed: {e:#}")).into()
        })
    }
}

static SBT_VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[info\]\s*(\d+\.\d+\.\d+.*)$").expect("sbt version pattern is valid")
});

/// Version of the sbt project in `dir`, as reported by `sbt version`.
pub fn sbt_version(dir: &str) -> Result<String> {
    anyhow::ensure!(command_exists("sbt"), "sbt was not found on PATH");
    let _heartbeat = Heartbeat::start("sbt version");

    let output = run_command_in_dir("sbt", &["version", "-Dsbt.log.noformat=true"], Path::new(dir))
        .with_context(|| format!("failed to run sbt in {dir}"))?;

    parse_sbt_version(&output.stdout)
        .with_context(|| format!("not an sbt project: {dir}"))
}

/// First version reported on an `[info]` line.
pub fn parse_sbt_version(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        SBT_VERSION_LINE
            .captures(line.trim_end())
            .map(|caps| caps[1].to_string())
    })
}
