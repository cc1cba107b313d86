use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use release_manager::config;
use release_manager::engine::{self, Reporter};
use release_manager::functions::FunctionTable;
use release_manager_types::ActionFlags;

#[derive(Parser, Debug)]
#[command(name = "release-manager", version)]
#[command(about = "Utility for creating and uploading zip packages")]
struct Cli {
    /// Path to the configuration YAML file
    #[arg(long)]
    config: PathBuf,

    /// Create a new version for the package (package-repository targets only).
    #[arg(long)]
    make_version: bool,

    /// Build the artifacts that will be uploaded.
    #[arg(long)]
    make_artifact: bool,

    /// Upload the artifacts to the targets. Requires --make-artifact.
    #[arg(long)]
    upload_artifact: bool,

    /// Check that the declared version matches the one reported by the build.
    #[arg(long)]
    check_version: bool,
}

impl Cli {
    fn flags(&self) -> ActionFlags {
        ActionFlags {
            check_version: self.check_version,
            make_version: self.make_version,
            make_artifact: self.make_artifact,
            upload_artifact: self.upload_artifact,
        }
    }
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let flags = cli.flags();

    let cfg = config::resolve(&cli.config, &FunctionTable::builtin())?;

    let mut reporter = CliReporter;
    let summary = match engine::run_release(&cfg, &flags, &mut reporter) {
        Ok(summary) => summary,
        Err(e) => {
            reporter.error("release failed");
            return Err(e);
        }
    };

    if !flags.is_noop() {
        reporter.info(&format!(
            "done: {} package(s) processed, {} artifact(s) built",
            summary.packages_processed, summary.artifacts_built
        ));
    }
    Ok(())
}
