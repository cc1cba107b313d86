//! Version check, build commands and artifact packaging.
//!
//! Nothing here changes the process working directory. Relative binary
//! paths are joined onto the root dir and build commands receive it as
//! their `current_dir`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use release_manager_process::run_shell_in_dir;
use release_manager_types::{
    ARTIFACT_STAGING_DIR, ArtifactDescriptor, ArtifactKind, BuiltArtifact, Package, ReleaseError,
};
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::engine::Reporter;

/// Compare the declared version against the one the build reports.
pub fn check_version(declared: &str, build: &str) -> Result<(), ReleaseError> {
    if declared == build {
        Ok(())
    } else {
        Err(ReleaseError::VersionMismatch {
            declared: declared.to_string(),
            build: build.to_string(),
        })
    }
}

/// Run `commands` in order through the shell inside `root_dir`.
pub fn run_build_commands(
    commands: &[String],
    root_dir: &Path,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    for command in commands {
        reporter.info(&format!("running build command: {command}"));
        let result = run_shell_in_dir(command, root_dir)
            .map_err(|e| ReleaseError::build(format!("{e:#}")))?;

        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            reporter.info(&format!("  {line}"));
        }
        if !result.success {
            return Err(ReleaseError::build(format!(
                "build command '{command}' failed with exit code {:?}: {}",
                result.exit_code,
                result.stderr.trim()
            ))
            .into());
        }
    }
    Ok(())
}

/// `prefix + version + suffix + ".zip"` with every `-` turned into `_`.
pub fn zip_artifact_name(prefix: &str, version: &str, suffix: &str) -> String {
    format!("{prefix}{version}{suffix}.zip").replace('-', "_")
}

/// `prefix + version + suffix`, unchanged.
pub fn asis_artifact_name(prefix: &str, version: &str, suffix: &str) -> String {
    format!("{prefix}{version}{suffix}")
}

/// Staging directory for a package's zip artifacts.
pub fn staging_dir(root_dir: &Path, package_name: &str) -> PathBuf {
    root_dir.join(ARTIFACT_STAGING_DIR).join(package_name)
}

/// Produce one artifact for `package_name` at `version`.
pub fn build(
    root_dir: &Path,
    version: &str,
    package_name: &str,
    descriptor: &ArtifactDescriptor,
) -> Result<BuiltArtifact> {
    let kind: ArtifactKind = descriptor.kind.parse()?;
    match kind {
        ArtifactKind::Zip => build_zip(
            root_dir,
            version,
            package_name,
            &descriptor.prefix,
            &descriptor.suffix,
            &descriptor.binary_paths,
        ),
        ArtifactKind::Asis => Ok(build_asis(
            root_dir,
            version,
            &descriptor.prefix,
            &descriptor.suffix,
            &descriptor.binary_paths,
        )?),
    }
}

/// Build every artifact of `package`, in declaration order.
pub fn build_package(
    root_dir: &Path,
    package: &Package,
    reporter: &mut dyn Reporter,
) -> Result<Vec<BuiltArtifact>> {
    let mut built = Vec::with_capacity(package.artifacts.len());
    for descriptor in &package.artifacts {
        let artifact = build(root_dir, &package.version, &package.name, descriptor)?;
        reporter.info(&format!(
            "built {} artifact {} at {}",
            descriptor.kind,
            artifact.artifact_name,
            artifact.artifact_path.display()
        ));
        built.push(artifact);
    }
    Ok(built)
}

fn build_asis(
    root_dir: &Path,
    version: &str,
    prefix: &str,
    suffix: &str,
    binary_paths: &[String],
) -> Result<BuiltArtifact, ReleaseError> {
    let [binary] = binary_paths else {
        return Err(ReleaseError::build(format!(
            "asis artifacts need exactly one binary path, got {}",
            binary_paths.len()
        )));
    };
    Ok(BuiltArtifact {
        artifact_name: asis_artifact_name(prefix, version, suffix),
        artifact_path: root_dir.join(binary),
    })
}

fn build_zip(
    root_dir: &Path,
    version: &str,
    package_name: &str,
    prefix: &str,
    suffix: &str,
    binary_paths: &[String],
) -> Result<BuiltArtifact> {
    if binary_paths.is_empty() {
        return Err(ReleaseError::build("zip artifacts need at least one binary path").into());
    }

    let name = zip_artifact_name(prefix, version, suffix);
    let staging = staging_dir(root_dir, package_name);
    fs::create_dir_all(&staging).map_err(|e| {
        ReleaseError::build(format!("failed to create {}: {e}", staging.display()))
    })?;

    let mut staged = Vec::with_capacity(binary_paths.len());
    for binary in binary_paths {
        let source = root_dir.join(binary);
        let file_name = source.file_name().ok_or_else(|| {
            ReleaseError::build(format!("binary path '{binary}' has no file name"))
        })?;
        let dest = staging.join(file_name);
        fs::copy(&source, &dest).map_err(|e| {
            ReleaseError::build(format!("failed to copy {}: {e}", source.display()))
        })?;
        staged.push((file_name.to_string_lossy().into_owned(), dest));
    }

    let artifact_path = staging.join(&name);
    write_zip(&artifact_path, &staged).map_err(|e| {
        ReleaseError::build(format!("failed to write {}: {e}", artifact_path.display()))
    })?;

    Ok(BuiltArtifact {
        artifact_name: name,
        artifact_path,
    })
}

fn write_zip(path: &Path, entries: &[(String, PathBuf)]) -> zip::result::ZipResult<()> {
    let mut writer = zip::ZipWriter::new(File::create(path)?);
    for (entry_name, source) in entries {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(source)?);
        writer.start_file(entry_name.as_str(), options)?;
        io::copy(&mut File::open(source)?, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
    Ok(0o644)
}
