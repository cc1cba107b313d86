//! Package-hosting API client for release-manager.
//!
//! Speaks the Bintray-style REST surface: one call to create a package
//! version and one to upload file content into it. Status codes are
//! classified here; what a rejection *means* for the release is decided by
//! the caller.
//!
//! # Example
//!
//! ```no_run
//! use release_manager_registry::{RepositoryClient, PackageCoordinates};
//! use release_manager_types::BasicCredentials;
//!
//! let client = RepositoryClient::new("https://api.bintray.com").expect("client");
//! let coords = PackageCoordinates {
//!     org: "snowplow",
//!     repo: "snowplow-generic",
//!     package: "sql-runner",
//! };
//! let creds = BasicCredentials { user: "me".into(), api_key: "key".into() };
//! let outcome = client.create_version(&coords, "0.9.0", &creds).expect("request");
//! assert!(outcome.is_success());
//! ```

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use release_manager_types::BasicCredentials;
use serde::Serialize;

/// Default timeout for API requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default user agent for API requests
pub const USER_AGENT: &str = concat!("release-manager/", env!("CARGO_PKG_VERSION"));

/// Where a package lives on the hosting service.
#[derive(Debug, Clone, Copy)]
pub struct PackageCoordinates<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub package: &'a str,
}

/// Outcome of a create-version request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateVersionOutcome {
    Created(u16),
    AlreadyExists,
    Rejected(u16),
}

impl CreateVersionOutcome {
    fn from_status(status: u16) -> Self {
        if status == 409 {
            CreateVersionOutcome::AlreadyExists
        } else if is_success_family(status) {
            CreateVersionOutcome::Created(status)
        } else {
            CreateVersionOutcome::Rejected(status)
        }
    }

    /// An existing version counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, CreateVersionOutcome::Rejected(_))
    }
}

/// Outcome of a content upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(u16),
    Rejected(u16),
}

impl UploadOutcome {
    fn from_status(status: u16) -> Self {
        if is_success_family(status) {
            UploadOutcome::Uploaded(status)
        } else {
            UploadOutcome::Rejected(status)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded(_))
    }
}

/// 2xx and 3xx both count as accepted.
pub fn is_success_family(status: u16) -> bool {
    matches!(status / 100, 2 | 3)
}

/// Upload knobs forwarded as query parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    pub publish: bool,
    pub override_existing: bool,
}

impl UploadOptions {
    fn query(&self) -> String {
        format!(
            "publish={}&override={}",
            u8::from(self.publish),
            u8::from(self.override_existing)
        )
    }
}

#[derive(Debug, Serialize)]
struct NewVersion<'a> {
    name: &'a str,
    desc: String,
}

/// Package-hosting API client
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RepositoryClient {
    /// Create a new client for the given base URL
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with an explicit request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `POST /packages/{org}/{repo}/{package}/versions`
    pub fn create_version(
        &self,
        coords: &PackageCoordinates<'_>,
        version: &str,
        credentials: &BasicCredentials,
    ) -> Result<CreateVersionOutcome> {
        let url = format!(
            "{}/packages/{}/{}/{}/versions",
            self.base_url, coords.org, coords.repo, coords.package
        );
        let payload = NewVersion {
            name: version,
            desc: format!("Release of {}", coords.package),
        };
        let body = serde_json::to_vec(&payload).context("failed to serialize version payload")?;

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.user, Some(&credentials.api_key))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .with_context(|| format!("failed to send create-version request to {url}"))?;

        Ok(CreateVersionOutcome::from_status(response.status().as_u16()))
    }

    /// `PUT /content/{org}/{repo}/{package}/{version}/{artifact}?publish=..&override=..`
    pub fn upload_content(
        &self,
        coords: &PackageCoordinates<'_>,
        version: &str,
        artifact_name: &str,
        artifact_path: &Path,
        options: UploadOptions,
        credentials: &BasicCredentials,
    ) -> Result<UploadOutcome> {
        let url = format!(
            "{}/content/{}/{}/{}/{}/{}?{}",
            self.base_url,
            coords.org,
            coords.repo,
            coords.package,
            version,
            artifact_name,
            options.query()
        );
        let file = File::open(artifact_path)
            .with_context(|| format!("failed to open artifact {}", artifact_path.display()))?;

        let response = self
            .client
            .put(&url)
            .basic_auth(&credentials.user, Some(&credentials.api_key))
            .body(file)
            .send()
            .with_context(|| format!("failed to send upload request to {url}"))?;

        Ok(UploadOutcome::from_status(response.status().as_u16()))
    }
}
