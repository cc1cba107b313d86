//! The release orchestrator.
//!
//! `ConfigLoaded → per package ([version checked] → [built] → [published]) → Done`,
//! stopping at the first error. Packages and targets are visited in the order
//! they are configured.

use anyhow::{Context, Result};
use release_manager_types::{ActionFlags, BuiltArtifact, Configuration, ReleaseError};

use crate::artifact;
use crate::targets::PublishTarget;

pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// What a run did, for callers that want more than the log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub packages_processed: usize,
    pub artifacts_built: usize,
}

/// Run every requested action for every package.
pub fn run_release(
    config: &Configuration,
    flags: &ActionFlags,
    reporter: &mut dyn Reporter,
) -> Result<ReleaseSummary> {
    let targets = prepare(config, flags, reporter)?;
    if targets.is_empty() {
        return Ok(ReleaseSummary::default());
    }
    run_with_targets(config, flags, &targets, reporter)
}

/// Validate flags and configuration and build the publish targets. Empty when
/// no action was requested.
pub fn prepare(
    config: &Configuration,
    flags: &ActionFlags,
    reporter: &mut dyn Reporter,
) -> Result<Vec<PublishTarget>> {
    if flags.is_noop() {
        reporter.info("no actions selected, quitting");
        return Ok(Vec::new());
    }
    flags.validate()?;
    config.validate_for(flags)?;

    config
        .targets
        .iter()
        .map(|spec| PublishTarget::from_spec(spec, flags))
        .collect()
}

/// The per-package loop, with targets already built.
pub fn run_with_targets(
    config: &Configuration,
    flags: &ActionFlags,
    targets: &[PublishTarget],
    reporter: &mut dyn Reporter,
) -> Result<ReleaseSummary> {
    let root_dir = &config.local.root_dir;
    let mut summary = ReleaseSummary::default();

    reporter.info("starting package release");
    for package in &config.packages {
        reporter.info(&format!("processing package {}", package.name));

        if flags.check_version {
            let build = package.build_version.as_deref().ok_or_else(|| {
                ReleaseError::config(format!(
                    "package {} has no build_version to check against",
                    package.name
                ))
            })?;
            artifact::check_version(&package.version, build)?;
            reporter.info(&format!("version {} matches the build", package.version));
        }

        let artifacts: Vec<BuiltArtifact> = if flags.make_artifact {
            artifact::run_build_commands(&package.build_commands, root_dir, reporter)
                .with_context(|| format!("build commands failed for package {}", package.name))?;
            artifact::build_package(root_dir, package, reporter)?
        } else {
            Vec::new()
        };
        summary.artifacts_built += artifacts.len();

        for target in targets {
            target
                .publish(package, flags, &artifacts, reporter)
                .with_context(|| format!("{} target failed for package {}", target.kind(), package.name))?;
        }

        reporter.info(&format!("finished processing package {}!", package.name));
        summary.packages_processed += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    use release_manager_storage::{ObjectProbe, ObjectStore};
    use release_manager_types::Location;

    use crate::targets::ObjectStoreTarget;

    #[derive(Default)]
    struct CollectingReporter {
        infos: Vec<String>,
        warns: Vec<String>,
        errors: Vec<String>,
    }

    impl Reporter for CollectingReporter {
        fn info(&mut self, msg: &str) {
            self.infos.push(msg.to_string());
        }

        fn warn(&mut self, msg: &str) {
            self.warns.push(msg.to_string());
        }

        fn error(&mut self, msg: &str) {
            self.errors.push(msg.to_string());
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStore(Rc<RefCell<Vec<String>>>);

    impl ObjectStore for MemoryStore {
        fn probe(&self, location: &Location, key: &str) -> Result<ObjectProbe> {
            let full = format!("{}/{key}", location.bucket);
            Ok(if self.0.borrow().contains(&full) {
                ObjectProbe::Exists
            } else {
                ObjectProbe::Missing
            })
        }

        fn put(&self, location: &Location, key: &str, source: &Path) -> Result<()> {
            anyhow::ensure!(source.is_file(), "missing {}", source.display());
            self.0.borrow_mut().push(format!("{}/{key}", location.bucket));
            Ok(())
        }
    }

    fn config(root: &Path, extra_package_yaml: &str) -> Configuration {
        let yaml = format!(
            "local:\n  root_dir: {}\npackages:\n  - name: sink\n    version: 0.4.0\n    build_version: 0.4.0\n    bucket: releases\n    path: sink\n    region: eu-west-1\n    artifacts:\n      - type: zip\n        prefix: sink-\n        binary_paths: [bin/sink]\n{extra_package_yaml}targets:\n  - type: awss3\n    access_key_id: a\n    secret_access_key: s\n",
            root.display()
        );
        serde_yaml::from_str(&yaml).expect("config")
    }

    fn workspace() -> tempfile::TempDir {
        let td = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(td.path().join("bin")).expect("mkdir");
        fs::write(td.path().join("bin/sink"), b"binary").expect("write");
        td
    }

    fn classify(err: &anyhow::Error) -> Option<&ReleaseError> {
        err.chain().find_map(|e| e.downcast_ref::<ReleaseError>())
    }

    #[test]
    fn no_flags_is_a_noop() {
        let td = workspace();
        let cfg = config(td.path(), "");
        let mut reporter = CollectingReporter::default();
        let summary = run_release(&cfg, &ActionFlags::default(), &mut reporter).expect("noop");
        assert_eq!(summary, ReleaseSummary::default());
        assert_eq!(reporter.infos, vec!["no actions selected, quitting"]);
        assert!(!td.path().join("dist").exists());
    }

    #[test]
    fn upload_without_make_fails_before_any_package() {
        let td = workspace();
        let cfg = config(td.path(), "");
        let flags = ActionFlags {
            upload_artifact: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let err = run_release(&cfg, &flags, &mut reporter).unwrap_err();
        assert!(matches!(classify(&err), Some(ReleaseError::Config(_))));
        assert!(reporter.infos.iter().all(|m| !m.starts_with("processing")));
    }

    #[test]
    fn unknown_target_type_is_config_error() {
        let td = workspace();
        let mut cfg = config(td.path(), "");
        cfg.targets[0].kind = "ftp".into();
        let flags = ActionFlags {
            check_version: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let err = run_release(&cfg, &flags, &mut reporter).unwrap_err();
        assert!(matches!(classify(&err), Some(ReleaseError::Config(_))));
    }

    #[test]
    fn version_mismatch_stops_the_run() {
        let td = workspace();
        let mut cfg = config(td.path(), "");
        cfg.packages[0].build_version = Some("0.4.1".into());
        let flags = ActionFlags {
            check_version: true,
            make_artifact: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let err = run_release(&cfg, &flags, &mut reporter).unwrap_err();
        assert_eq!(
            classify(&err),
            Some(&ReleaseError::VersionMismatch {
                declared: "0.4.0".into(),
                build: "0.4.1".into()
            })
        );
        assert!(!td.path().join("dist").exists());
    }

    #[test]
    fn check_version_needs_no_credentials() {
        let td = workspace();
        let mut cfg = config(td.path(), "");
        cfg.targets = vec![serde_yaml::from_str("type: bintray\n").expect("target")];
        let flags = ActionFlags {
            check_version: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let summary = run_release(&cfg, &flags, &mut reporter).expect("release");
        assert_eq!(summary.packages_processed, 1);
        assert!(reporter.infos.iter().any(|m| m == "version 0.4.0 matches the build"));
    }

    #[test]
    fn upload_credentials_are_checked_before_any_package() {
        let td = workspace();
        let mut cfg = config(td.path(), "");
        cfg.targets = vec![serde_yaml::from_str("type: bintray\n").expect("target")];
        let flags = ActionFlags {
            make_artifact: true,
            upload_artifact: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let err = run_release(&cfg, &flags, &mut reporter).unwrap_err();
        assert!(matches!(classify(&err), Some(ReleaseError::Config(_))));
        assert!(!td.path().join("dist").exists());
    }

    #[test]
    fn missing_build_version_is_config_error() {
        let td = workspace();
        let mut cfg = config(td.path(), "");
        cfg.packages[0].build_version = None;
        let flags = ActionFlags {
            check_version: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let err = run_release(&cfg, &flags, &mut reporter).unwrap_err();
        assert!(matches!(classify(&err), Some(ReleaseError::Config(_))));
    }

    #[test]
    fn builds_once_and_uploads_to_store() {
        let td = workspace();
        let cfg = config(td.path(), "");
        let store = MemoryStore::default();
        let targets = vec![PublishTarget::ObjectStore(ObjectStoreTarget::new(Box::new(
            store.clone(),
        )))];
        let flags = ActionFlags {
            make_artifact: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();

        let summary = run_with_targets(&cfg, &flags, &targets, &mut reporter).expect("release");
        assert_eq!(
            summary,
            ReleaseSummary {
                packages_processed: 1,
                artifacts_built: 1
            }
        );
        assert_eq!(*store.0.borrow(), vec!["releases/sink/sink_0.4.0.zip"]);
        assert!(td.path().join("dist/sink/sink_0.4.0.zip").is_file());
        assert_eq!(
            reporter.infos.last().map(String::as_str),
            Some("finished processing package sink!")
        );
    }

    #[test]
    fn second_run_conflicts_unless_continuing() {
        let td = workspace();
        let store = MemoryStore::default();
        let targets = vec![PublishTarget::ObjectStore(ObjectStoreTarget::new(Box::new(
            store.clone(),
        )))];
        let flags = ActionFlags {
            make_artifact: true,
            upload_artifact: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();

        let cfg = config(td.path(), "");
        run_with_targets(&cfg, &flags, &targets, &mut reporter).expect("first");
        let err = run_with_targets(&cfg, &flags, &targets, &mut reporter).unwrap_err();
        assert!(matches!(classify(&err), Some(ReleaseError::Publish(_))));

        let lenient = config(td.path(), "    continue_on_conflict: true\n");
        run_with_targets(&lenient, &flags, &targets, &mut reporter).expect("absorbed");
        assert_eq!(store.0.borrow().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn failing_build_command_is_build_error() {
        let td = workspace();
        let cfg = config(td.path(), "    build_commands:\n      - exit 1\n");
        let flags = ActionFlags {
            make_artifact: true,
            ..Default::default()
        };
        let targets = vec![PublishTarget::ObjectStore(ObjectStoreTarget::new(Box::new(
            MemoryStore::default(),
        )))];
        let mut reporter = CollectingReporter::default();
        let err = run_with_targets(&cfg, &flags, &targets, &mut reporter).unwrap_err();
        assert!(matches!(classify(&err), Some(ReleaseError::Build(_))));
        assert!(reporter.errors.is_empty());
    }
}
