//! Configuration model and error taxonomy for release-manager.
//!
//! These are the typed shapes the resolved YAML document is deserialized
//! into, plus the [`ReleaseError`] classification shared by every crate in
//! the workspace.
//!
//! # Example
//!
//! ```
//! use release_manager_types::{ArtifactKind, TargetKind};
//!
//! assert_eq!("zip".parse::<ArtifactKind>().unwrap(), ArtifactKind::Zip);
//! assert_eq!("awss3".parse::<TargetKind>().unwrap(), TargetKind::ObjectStore);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default base URL for the package-hosting API.
pub const DEFAULT_REPOSITORY_API: &str = "https://api.bintray.com";

/// Directory (relative to the root dir) that zip artifacts are staged in.
pub const ARTIFACT_STAGING_DIR: &str = "dist";

/// Fatal error classes. Every failure in a release run bottoms out in one of
/// these; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseError {
    /// Malformed or missing configuration, unresolvable marker, bad flags.
    #[error("configuration error: {0}")]
    Config(String),
    /// Artifact could not be produced.
    #[error("build error: {0}")]
    Build(String),
    /// A target rejected the artifact and the conflict was not absorbed.
    #[error("publish error: {0}")]
    Publish(String),
    /// Declared version differs from the one the build reports.
    #[error("version extracted from build [{build}] doesn't match declared in config [{declared}]")]
    VersionMismatch { declared: String, build: String },
}

impl ReleaseError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }
}

/// Action flags selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    pub check_version: bool,
    pub make_version: bool,
    pub make_artifact: bool,
    pub upload_artifact: bool,
}

impl ActionFlags {
    /// True when no action was requested at all.
    pub fn is_noop(&self) -> bool {
        !(self.check_version || self.make_version || self.make_artifact || self.upload_artifact)
    }

    /// Reject flag combinations that cannot be honoured.
    pub fn validate(&self) -> Result<(), ReleaseError> {
        if self.upload_artifact && !self.make_artifact {
            return Err(ReleaseError::config(
                "cannot upload artifact without first creating it; add '--make-artifact' to resolve",
            ));
        }
        Ok(())
    }
}

/// Fully resolved release configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub local: LocalConfig,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

impl Configuration {
    /// Check the invariants that only matter once an action is requested.
    pub fn validate_for(&self, flags: &ActionFlags) -> Result<(), ReleaseError> {
        if flags.is_noop() {
            return Ok(());
        }
        if self.packages.is_empty() {
            return Err(ReleaseError::config("no packages configured"));
        }
        if self.targets.is_empty() {
            return Err(ReleaseError::config("no targets configured"));
        }
        for target in &self.targets {
            target.target_kind()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory artifacts and binaries are resolved against.
    pub root_dir: PathBuf,
}

/// One releasable package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(deserialize_with = "string_like")]
    pub version: String,
    /// Version reported by the build, compared against `version` on `--check-version`.
    #[serde(default, deserialize_with = "opt_string_like")]
    pub build_version: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactDescriptor>,
    #[serde(default)]
    pub build_commands: Vec<String>,
    #[serde(default)]
    pub publish: bool,
    /// Overwrite whatever already sits at the destination.
    #[serde(default, rename = "override")]
    pub override_existing: bool,
    #[serde(default)]
    pub continue_on_conflict: bool,

    // package-repository coordinates
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub user_org: Option<String>,

    // object-store coordinates: either the single triple or `locations`
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub locations: Option<Vec<Location>>,
}

impl Package {
    /// Object-store destinations for this package. Always at least one.
    pub fn locations(&self) -> Result<Vec<Location>, ReleaseError> {
        match (&self.bucket, &self.locations) {
            (Some(_), Some(_)) => Err(ReleaseError::config(format!(
                "package {} cannot contain both 'bucket' and 'locations'",
                self.name
            ))),
            (Some(bucket), None) => match (&self.path, &self.region) {
                (Some(path), Some(region)) => Ok(vec![Location {
                    bucket: bucket.clone(),
                    path: path.clone(),
                    region: region.clone(),
                }]),
                _ => Err(ReleaseError::config(format!(
                    "package {} is missing required keys (bucket, path, region)",
                    self.name
                ))),
            },
            (None, Some(locations)) if !locations.is_empty() => Ok(locations.clone()),
            (None, Some(_)) => Err(ReleaseError::config(format!(
                "package {} has an empty 'locations' list",
                self.name
            ))),
            (None, None) => Err(ReleaseError::config(format!(
                "package {}: either 'locations' array or 'bucket' must be present",
                self.name
            ))),
        }
    }

    /// `(repo, user_org)` for the package-repository target.
    pub fn repository_coordinates(&self) -> Result<(&str, &str), ReleaseError> {
        let repo = self.repo.as_deref().ok_or_else(|| {
            ReleaseError::config(format!("package {} is missing 'repo'", self.name))
        })?;
        let org = self.user_org.as_deref().ok_or_else(|| {
            ReleaseError::config(format!("package {} is missing 'user_org'", self.name))
        })?;
        Ok((repo, org))
    }
}

/// How to produce one artifact of a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Raw type tag; parsed into [`ArtifactKind`] by the builder.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub binary_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Copy binaries into a staging dir and zip them.
    Zip,
    /// Upload the single binary untouched.
    Asis,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Zip => write!(f, "zip"),
            ArtifactKind::Asis => write!(f, "asis"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zip" => Ok(ArtifactKind::Zip),
            "asis" => Ok(ArtifactKind::Asis),
            other => Err(ReleaseError::build(format!(
                "invalid artifact type; expected one of [zip, asis] and got {other}"
            ))),
        }
    }
}

/// Object-store destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub bucket: String,
    /// Key prefix inside the bucket.
    #[serde(default)]
    pub path: String,
    pub region: String,
}

impl Location {
    /// Object key for an artifact under this location.
    pub fn object_key(&self, artifact_name: &str) -> String {
        if self.path.is_empty() {
            artifact_name.to_string()
        } else if self.path.ends_with('/') {
            format!("{}{}", self.path, artifact_name)
        } else {
            format!("{}/{}", self.path, artifact_name)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bucket [{}] at [{}] region, key prefix [{}]",
            self.bucket, self.region, self.path
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Bintray-style package hosting service.
    PackageRepository,
    /// S3-compatible object store.
    ObjectStore,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::PackageRepository => write!(f, "bintray"),
            TargetKind::ObjectStore => write!(f, "awss3"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bintray" | "package-repository" => Ok(TargetKind::PackageRepository),
            "awss3" | "s3" | "object-store" => Ok(TargetKind::ObjectStore),
            _ => Err(ReleaseError::config(format!(
                "invalid target specified; expected one of [bintray, awss3] and got {s}"
            ))),
        }
    }
}

/// A configured destination and the credentials to reach it.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(rename = "type")]
    pub kind: String,

    // package repository
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, alias = "api_key", alias = "key")]
    pub password: Option<String>,
    /// Base URL of the package-hosting API.
    #[serde(default)]
    pub api_base: Option<String>,

    // object store
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Custom endpoint for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl TargetSpec {
    pub fn target_kind(&self) -> Result<TargetKind, ReleaseError> {
        self.kind.parse()
    }

    pub fn repository_credentials(&self) -> Result<BasicCredentials, ReleaseError> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Ok(BasicCredentials {
                user: user.clone(),
                api_key: password.clone(),
            }),
            _ => Err(ReleaseError::config(format!(
                "target {} requires 'user' and 'password'",
                self.kind
            ))),
        }
    }

    pub fn object_store_credentials(&self) -> Result<KeyPair, ReleaseError> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Ok(KeyPair {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
                session_token: self.session_token.clone(),
            }),
            _ => Err(ReleaseError::config(format!(
                "target {} requires 'access_key_id' and 'secret_access_key'",
                self.kind
            ))),
        }
    }
}

fn masked(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}

impl fmt::Debug for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSpec")
            .field("kind", &self.kind)
            .field("user", &self.user)
            .field("password", &masked(&self.password))
            .field("api_base", &self.api_base)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &masked(&self.secret_access_key))
            .field("session_token", &masked(&self.session_token))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// User + API key for the package-hosting service.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub user: String,
    pub api_key: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("user", &self.user)
            .field("api_key", &"***")
            .finish()
    }
}

/// Access key pair for the object store.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &masked(&self.session_token))
            .finish()
    }
}

/// An artifact ready for upload. Lives only as long as the build/upload step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    pub artifact_name: String,
    pub artifact_path: PathBuf,
}

fn string_like<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringLikeVisitor)
}

fn opt_string_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringLike>::deserialize(deserializer).map(|v| v.map(|s| s.0))
}

struct StringLike(String);

impl<'de> Deserialize<'de> for StringLike {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StringLikeVisitor).map(StringLike)
    }
}

/// YAML happily turns `1.0` into a float; versions must stay text.
struct StringLikeVisitor;

impl Visitor<'_> for StringLikeVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
        Ok(v.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}
