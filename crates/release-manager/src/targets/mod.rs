//! Publish targets.
//!
//! A configured [`TargetSpec`] becomes a [`PublishTarget`], one variant per
//! [`TargetKind`]. The orchestrator hands each target the package, the
//! action flags and whatever artifacts were built for it.

use anyhow::Result;
use release_manager_types::{ActionFlags, BuiltArtifact, Package, TargetKind, TargetSpec};

use crate::engine::Reporter;

pub mod object_store;
pub mod repository;

pub use object_store::ObjectStoreTarget;
pub use repository::RepositoryTarget;

pub enum PublishTarget {
    PackageRepository(RepositoryTarget),
    ObjectStore(ObjectStoreTarget),
}

impl PublishTarget {
    /// Build the client for `spec`. Unknown types are configuration errors,
    /// and so are missing credentials when `flags` need them.
    pub fn from_spec(spec: &TargetSpec, flags: &ActionFlags) -> Result<Self> {
        Ok(match spec.target_kind()? {
            TargetKind::PackageRepository => {
                PublishTarget::PackageRepository(RepositoryTarget::from_spec(spec, flags)?)
            }
            TargetKind::ObjectStore => {
                PublishTarget::ObjectStore(ObjectStoreTarget::from_spec(spec, flags)?)
            }
        })
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            PublishTarget::PackageRepository(_) => TargetKind::PackageRepository,
            PublishTarget::ObjectStore(_) => TargetKind::ObjectStore,
        }
    }

    pub fn publish(
        &self,
        package: &Package,
        flags: &ActionFlags,
        artifacts: &[BuiltArtifact],
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        match self {
            PublishTarget::PackageRepository(target) => {
                target.publish(package, flags, artifacts, reporter)
            }
            PublishTarget::ObjectStore(target) => target.publish(package, flags, artifacts, reporter),
        }
    }
}
