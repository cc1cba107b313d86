//! Object-store target.
//!
//! Every artifact built with `--make-artifact` goes to every location of the
//! package. Without `override` the key is probed first and an existing object
//! is a conflict.
//!
//! The probe and the upload are two separate requests, so another writer can
//! slip in between them. Nothing here guards against that race.

use anyhow::Result;
use release_manager_storage::{ObjectProbe, ObjectStore, S3Client, S3Config};
use release_manager_types::{
    ActionFlags, BuiltArtifact, Location, Package, ReleaseError, TargetSpec,
};

use crate::engine::Reporter;

pub struct ObjectStoreTarget {
    store: Option<Box<dyn ObjectStore>>,
}

impl ObjectStoreTarget {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self { store: Some(store) }
    }

    /// The S3 client, and the keys it needs, exist only when `flags` will
    /// build something to upload.
    pub fn from_spec(spec: &TargetSpec, flags: &ActionFlags) -> Result<Self> {
        if !flags.make_artifact {
            return Ok(Self { store: None });
        }
        let keys = spec.object_store_credentials()?;
        let mut config = S3Config::new();
        if let Some(endpoint) = &spec.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        Ok(Self::new(Box::new(S3Client::new(keys, config)?)))
    }

    fn store(&self) -> Result<&dyn ObjectStore, ReleaseError> {
        self.store.as_deref().ok_or_else(|| {
            ReleaseError::config("awss3 target has no 'access_key_id' and 'secret_access_key'")
        })
    }

    /// Place one artifact at one location, honouring `override` and
    /// `continue_on_conflict`.
    pub fn upload(
        &self,
        package: &Package,
        artifact: &BuiltArtifact,
        location: &Location,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let key = location.object_key(&artifact.artifact_name);
        let full_path = format!("s3://{}/{}", location.bucket, key);

        if package.override_existing {
            self.put(artifact, location, &key)?;
            reporter.info(&format!("artifact uploaded to {location}"));
            return Ok(());
        }

        match self.store()?.probe(location, &key) {
            Ok(ObjectProbe::Missing) => {
                self.put(artifact, location, &key)?;
                reporter.info(&format!("artifact uploaded to {location}"));
                Ok(())
            }
            Ok(ObjectProbe::Exists) if package.continue_on_conflict => {
                reporter.info(&format!(
                    "artifact [{full_path}] exists, but continue_on_conflict flag is true, not failing release"
                ));
                Ok(())
            }
            Ok(ObjectProbe::Exists) => Err(ReleaseError::publish(format!(
                "artifact at {full_path} already exists"
            ))
            .into()),
            Err(e) if package.continue_on_conflict => {
                reporter.warn(&format!("could not check {full_path}: {e:#}"));
                reporter.info("continue_on_conflict flag is true, not failing release");
                Ok(())
            }
            Err(e) => Err(ReleaseError::publish(format!("could not check {full_path}: {e:#}")).into()),
        }
    }

    fn put(&self, artifact: &BuiltArtifact, location: &Location, key: &str) -> Result<()> {
        self.store()?
            .put(location, key, &artifact.artifact_path)
            .map_err(|e| ReleaseError::publish(format!("{e:#}")).into())
    }

    pub fn publish(
        &self,
        package: &Package,
        flags: &ActionFlags,
        artifacts: &[BuiltArtifact],
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        if !flags.make_artifact {
            reporter.info("make-artifact flag was not passed, nothing to upload");
            return Ok(());
        }

        let locations = package.locations()?;
        for artifact in artifacts {
            for location in &locations {
                self.upload(package, artifact, location, reporter)?;
            }
        }
        Ok(())
    }
}
