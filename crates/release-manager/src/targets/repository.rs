//! Package-repository (Bintray-style) target.

use anyhow::Result;
use release_manager_registry::{
    CreateVersionOutcome, PackageCoordinates, RepositoryClient, UploadOptions, UploadOutcome,
};
use release_manager_types::{
    ActionFlags, BasicCredentials, BuiltArtifact, DEFAULT_REPOSITORY_API, Package, ReleaseError,
    TargetSpec,
};

use crate::engine::Reporter;

pub struct RepositoryTarget {
    client: RepositoryClient,
    credentials: Option<BasicCredentials>,
}

impl RepositoryTarget {
    pub fn new(client: RepositoryClient, credentials: BasicCredentials) -> Self {
        Self {
            client,
            credentials: Some(credentials),
        }
    }

    /// Credentials are read only when `flags` ask for an API call.
    pub fn from_spec(spec: &TargetSpec, flags: &ActionFlags) -> Result<Self> {
        let credentials = if flags.make_version || flags.upload_artifact {
            Some(spec.repository_credentials()?)
        } else {
            None
        };
        let base = spec.api_base.as_deref().unwrap_or(DEFAULT_REPOSITORY_API);
        Ok(Self {
            client: RepositoryClient::new(base)?,
            credentials,
        })
    }

    fn credentials(&self) -> Result<&BasicCredentials, ReleaseError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ReleaseError::config("bintray target has no 'user' and 'password'"))
    }

    /// Create the package version. An existing version is success.
    pub fn ensure_version(&self, package: &Package, reporter: &mut dyn Reporter) -> Result<bool> {
        let credentials = self.credentials()?;
        let (repo, org) = package.repository_coordinates()?;
        let coords = PackageCoordinates {
            org,
            repo,
            package: &package.name,
        };
        reporter.info(&format!(
            "creating version {} in package {}",
            package.version, package.name
        ));

        let outcome = self
            .client
            .create_version(&coords, &package.version, credentials)
            .map_err(|e| ReleaseError::publish(format!("{e:#}")))?;

        match outcome {
            CreateVersionOutcome::Created(_) => reporter.info("version created"),
            CreateVersionOutcome::AlreadyExists => reporter.info(&format!(
                "version {} already exists, skipping",
                package.version
            )),
            CreateVersionOutcome::Rejected(code) => reporter.warn(&format!(
                "API response {code} is not 409 (version exists) nor in the 2xx or 3xx range"
            )),
        }
        Ok(outcome.is_success())
    }

    /// Upload one artifact. A rejection counts as success when the package
    /// sets `continue_on_conflict`.
    pub fn upload(
        &self,
        package: &Package,
        artifact: &BuiltArtifact,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        let credentials = self.credentials()?;
        let (repo, org) = package.repository_coordinates()?;
        let coords = PackageCoordinates {
            org,
            repo,
            package: &package.name,
        };
        let options = UploadOptions {
            publish: package.publish,
            override_existing: package.override_existing,
        };
        reporter.info(&format!("uploading artifact {}", artifact.artifact_name));

        let outcome = self
            .client
            .upload_content(
                &coords,
                &package.version,
                &artifact.artifact_name,
                &artifact.artifact_path,
                options,
                credentials,
            )
            .map_err(|e| ReleaseError::publish(format!("{e:#}")))?;

        match outcome {
            UploadOutcome::Uploaded(_) => {
                reporter.info("artifact uploaded");
                Ok(true)
            }
            UploadOutcome::Rejected(code) => {
                reporter.warn(&format!("API response {code} is not in the 2xx or 3xx range"));
                if package.continue_on_conflict {
                    reporter.info("continue_on_conflict flag is true, not failing release");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    pub fn publish(
        &self,
        package: &Package,
        flags: &ActionFlags,
        artifacts: &[BuiltArtifact],
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        if flags.make_version && !self.ensure_version(package, reporter)? {
            return Err(ReleaseError::publish(format!(
                "could not create version {} for package {}",
                package.version, package.name
            ))
            .into());
        }

        if flags.upload_artifact {
            for artifact in artifacts {
                if !self.upload(package, artifact, reporter)? {
                    return Err(ReleaseError::publish(format!(
                        "could not upload artifact {} for package {}",
                        artifact.artifact_name, package.name
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}
