//! Object-store backends for release-manager.
//!
//! This crate provides the [`ObjectStore`] trait and an S3-compatible
//! implementation ([`S3Client`]) that signs requests with AWS Signature
//! Version 4.
//!
//! The trait only offers the two verbs a release needs: probe whether a key
//! already holds an object, and put a local file at a key.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use release_manager_types::{KeyPair, Location};
use serde::{Deserialize, Serialize};

pub mod sigv4;

use sigv4::{CanonicalRequest, EMPTY_PAYLOAD_SHA256, Signer};

/// Default timeout for object-store requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// What a probe found at a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectProbe {
    Exists,
    Missing,
}

/// Common trait for object-store backends.
///
/// A probe that is neither "exists" nor "not found" (auth failure, throttling,
/// 5xx) is returned as an error; callers decide whether that is fatal.
pub trait ObjectStore {
    /// Fetch the object at `key` to learn whether it exists.
    fn probe(&self, location: &Location, key: &str) -> Result<ObjectProbe>;

    /// Upload the file at `source` to `key`, replacing any existing object.
    fn put(&self, location: &Location, key: &str, source: &Path) -> Result<()>;
}

/// Connection settings for an S3-compatible store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    /// Custom endpoint (for S3-compatible services like MinIO). Uses
    /// path-style addressing when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl S3Config {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set custom endpoint (for S3-compatible services)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// S3 REST client signing every request with SigV4.
pub struct S3Client {
    http: reqwest::blocking::Client,
    config: S3Config,
    keys: KeyPair,
}

/// Resolved address of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAddress {
    pub url: String,
    pub host: String,
    pub canonical_uri: String,
}

impl S3Client {
    pub fn new(keys: KeyPair, config: S3Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build object-store HTTP client")?;
        Ok(Self { http, config, keys })
    }

    /// Virtual-hosted address on AWS, path-style on a custom endpoint.
    pub fn address(&self, location: &Location, key: &str) -> Result<ObjectAddress> {
        let encoded_key = sigv4::uri_encode(key.trim_start_matches('/'), true);
        let (url, canonical_uri) = match &self.config.endpoint {
            Some(endpoint) => {
                let uri = format!("/{}/{}", sigv4::uri_encode(&location.bucket, false), encoded_key);
                (format!("{}{}", endpoint.trim_end_matches('/'), uri), uri)
            }
            None => {
                let uri = format!("/{encoded_key}");
                (
                    format!(
                        "https://{}.s3.{}.amazonaws.com{}",
                        location.bucket, location.region, uri
                    ),
                    uri,
                )
            }
        };

        let parsed = reqwest::Url::parse(&url).with_context(|| format!("invalid object URL {url}"))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => bail!("object URL has no host: {url}"),
        };

        Ok(ObjectAddress {
            url,
            host,
            canonical_uri,
        })
    }

    fn signed_request(
        &self,
        method: reqwest::Method,
        location: &Location,
        key: &str,
        payload_hash: &str,
    ) -> Result<reqwest::blocking::RequestBuilder> {
        let address = self.address(location, key)?;
        let now = Utc::now();
        let amz_date = sigv4::amz_date(&now);

        let mut headers = vec![
            ("host".to_string(), address.host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &self.keys.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let canonical = CanonicalRequest {
            method: method.as_str(),
            uri: &address.canonical_uri,
            query: "",
            headers,
            payload_hash,
        };
        let authorization = Signer::new(&self.keys, &location.region, "s3")
            .authorization(&canonical, &now)?;

        let mut request = self
            .http
            .request(method.clone(), &address.url)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date)
            .header("Authorization", authorization);
        if let Some(token) = &self.keys.session_token {
            request = request.header("x-amz-security-token", token);
        }
        Ok(request)
    }
}

impl ObjectStore for S3Client {
    fn probe(&self, location: &Location, key: &str) -> Result<ObjectProbe> {
        let response = self
            .signed_request(reqwest::Method::GET, location, key, EMPTY_PAYLOAD_SHA256)?
            .send()
            .with_context(|| format!("failed to fetch s3://{}/{}", location.bucket, key))?;

        let status = response.status();
        if status.is_success() {
            Ok(ObjectProbe::Exists)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(ObjectProbe::Missing)
        } else {
            bail!(
                "object store returned {} for s3://{}/{}",
                status,
                location.bucket,
                key
            )
        }
    }

    fn put(&self, location: &Location, key: &str, source: &Path) -> Result<()> {
        let body = fs::read(source)
            .with_context(|| format!("failed to read artifact {}", source.display()))?;
        let payload_hash = sigv4::sha256_hex(&body);

        let response = self
            .signed_request(reqwest::Method::PUT, location, key, &payload_hash)?
            .body(body)
            .send()
            .with_context(|| format!("failed to upload s3://{}/{}", location.bucket, key))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!(
                "object store rejected upload to s3://{}/{} with {}: {}",
                location.bucket,
                key,
                status,
                text
            );
        }
        Ok(())
    }
}
