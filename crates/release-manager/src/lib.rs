//! # release-manager
//!
//! Packages build artifacts and publishes them to a package-hosting service
//! and/or an S3-compatible object store, driven by one YAML file.
//!
//! ## Pipeline
//!
//! 1. [`config::resolve`] parses the YAML, expands self-referential
//!    `{{ dotted.path }}` templates, substitutes `<%= ENV/CMD/FUNC[...] %>`
//!    markers and deserializes the result into a typed
//!    [`Configuration`](release_manager_types::Configuration).
//! 2. [`engine::run_release`] walks packages in order. Per package it
//!    optionally checks the version, runs build commands and builds
//!    artifacts ([`artifact`]), then hands them to every configured
//!    publish target ([`targets`]).
//!
//! Every failure is fatal and surfaces as a
//! [`ReleaseError`](release_manager_types::ReleaseError) at the root of the
//! `anyhow` chain. `continue_on_conflict` is the only knob that downgrades a
//! rejected upload to a log line.
//!
//! ## Example
//!
//! ```ignore
//! use std::path::Path;
//! use release_manager::{config, engine, functions::FunctionTable};
//! use release_manager_types::ActionFlags;
//!
//! let cfg = config::resolve(Path::new("release.yml"), &FunctionTable::builtin())?;
//! let flags = ActionFlags { make_artifact: true, ..Default::default() };
//! engine::run_release(&cfg, &flags, &mut reporter)?;
//! ```
//!
//! ## Modules
//!
//! - [`config`]: resolver pipeline from file to typed configuration
//! - [`template`]: `{{ dotted.path }}` expansion against the document itself
//! - [`markers`]: `ENV`, `CMD` and `FUNC` marker substitution
//! - [`functions`]: predefined functions callable from `FUNC` markers
//! - [`heartbeat`]: bounded keep-alive output for long lookups
//! - [`artifact`]: version check, build commands and artifact packaging
//! - [`targets`]: package-repository and object-store publishing
//! - [`engine`]: the release orchestrator

pub mod artifact;
pub mod config;
pub mod engine;
pub mod functions;
pub mod heartbeat;
pub mod markers;
pub mod targets;
pub mod template;

pub use release_manager_types as types;
