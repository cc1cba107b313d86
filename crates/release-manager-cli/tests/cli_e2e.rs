use std::fs;
use std::io::Read;
use std::path::Path;
use std::thread;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::tempdir;
use tiny_http::{Response, Server, StatusCode};

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

/// A project with one binary and a config whose package targets `target_yaml`.
fn create_project(root: &Path, package_extra: &str, target_yaml: &str) -> std::path::PathBuf {
    write_file(&root.join("bin/sink"), "binary");
    let config = format!(
        r#"
vars:
  version: 0.4.0
local:
  root_dir: {root}
packages:
  - name: kinesis-sink
    version: "{{{{ vars.version }}}}"
    build_version: 0.4.0
    repo: generic
    user_org: acme
    publish: true
    bucket: releases
    path: sink
    region: eu-west-1
    artifacts:
      - type: zip
        prefix: kinesis-sink-
        suffix: ""
        binary_paths:
          - bin/sink
{package_extra}targets:
{target_yaml}"#,
        root = root.display()
    );
    let path = root.join("release.yml");
    write_file(&path, &config);
    path
}

const S3_TARGET: &str = "  - type: awss3\n    access_key_id: a\n    secret_access_key: s\n";

struct TestApi {
    base_url: String,
    handle: thread::JoinHandle<Vec<String>>,
}

impl TestApi {
    fn join(self) -> Vec<String> {
        self.handle.join().expect("join server")
    }
}

fn spawn_api(statuses: Vec<u16>) -> TestApi {
    let server = Server::http("127.0.0.1:0").expect("server");
    let base_url = format!("http://{}", server.server_addr());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for status in statuses {
            let mut req = server.recv().expect("request");
            let mut body = Vec::new();
            req.as_reader().read_to_end(&mut body).expect("body");
            seen.push(format!("{} {}", req.method(), req.url()));
            req.respond(Response::from_string("{}").with_status_code(StatusCode(status)))
                .expect("respond");
        }
        seen
    });
    TestApi { base_url, handle }
}

fn release_manager() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("release-manager"))
}

#[test]
fn no_actions_is_a_successful_noop() {
    let td = tempdir().expect("tempdir");
    let config = create_project(td.path(), "", S3_TARGET);

    release_manager()
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("no actions selected, quitting"));

    assert!(!td.path().join("dist").exists());
}

#[test]
fn upload_without_make_artifact_fails() {
    let td = tempdir().expect("tempdir");
    let config = create_project(td.path(), "", S3_TARGET);

    release_manager()
        .arg("--config")
        .arg(&config)
        .arg("--upload-artifact")
        .assert()
        .failure()
        .stderr(contains("--make-artifact"))
        .stderr(contains("processing package").not());
}

#[test]
fn missing_config_file_fails() {
    let td = tempdir().expect("tempdir");

    release_manager()
        .arg("--config")
        .arg(td.path().join("nope.yml"))
        .arg("--make-artifact")
        .assert()
        .failure()
        .stderr(contains("failed to read config"));
}

#[test]
fn config_flag_is_required() {
    release_manager()
        .arg("--make-artifact")
        .assert()
        .failure()
        .stderr(contains("--config"));
}

#[test]
fn version_flag_prints_version() {
    release_manager()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn check_version_mismatch_fails() {
    let td = tempdir().expect("tempdir");
    let config = create_project(td.path(), "", S3_TARGET);
    let text = fs::read_to_string(&config).expect("read");
    fs::write(&config, text.replace("build_version: 0.4.0", "build_version: 0.5.0"))
        .expect("write");

    release_manager()
        .arg("--config")
        .arg(&config)
        .arg("--check-version")
        .assert()
        .failure()
        .stderr(contains(
            "version extracted from build [0.5.0] doesn't match declared in config [0.4.0]",
        ));
}

#[test]
fn make_artifact_builds_zip_and_uploads_to_store() {
    let td = tempdir().expect("tempdir");
    let api = spawn_api(vec![404, 200]);
    let target = format!(
        "  - type: awss3\n    access_key_id: a\n    secret_access_key: s\n    endpoint: {}\n",
        api.base_url
    );
    let config = create_project(td.path(), "", &target);

    release_manager()
        .arg("--config")
        .arg(&config)
        .arg("--check-version")
        .arg("--make-artifact")
        .assert()
        .success()
        .stderr(contains("processing package kinesis-sink"))
        .stderr(contains("artifact uploaded to"))
        .stderr(contains("finished processing package kinesis-sink!"));

    assert!(
        td.path()
            .join("dist/kinesis-sink/kinesis_sink_0.4.0.zip")
            .is_file()
    );
    assert_eq!(
        api.join(),
        vec![
            "GET /releases/sink/kinesis_sink_0.4.0.zip".to_string(),
            "PUT /releases/sink/kinesis_sink_0.4.0.zip".to_string(),
        ]
    );
}

#[test]
fn check_version_needs_no_target_credentials() {
    let td = tempdir().expect("tempdir");
    let config = create_project(td.path(), "", "  - type: bintray\n");

    release_manager()
        .arg("--config")
        .arg(&config)
        .arg("--check-version")
        .assert()
        .success()
        .stderr(contains("version 0.4.0 matches the build"));
}

#[cfg(unix)]
#[test]
fn failing_build_command_fails_the_release() {
    let td = tempdir().expect("tempdir");
    let config = create_project(
        td.path(),
        "    build_commands:\n      - \"false\"\n",
        S3_TARGET,
    );

    release_manager()
        .arg("--config")
        .arg(&config)
        .arg("--make-artifact")
        .assert()
        .failure()
        .stderr(contains("build error"));
}

#[test]
fn repository_release_creates_version_and_uploads() {
    let td = tempdir().expect("tempdir");
    let api = spawn_api(vec![201, 201]);
    let target = format!(
        "  - type: bintray\n    user: \"<%= ENV['RELMAN_E2E_USER'] %>\"\n    password: key\n    api_base: {}\n",
        api.base_url
    );
    let config = create_project(td.path(), "", &target);

    release_manager()
        .env("RELMAN_E2E_USER", "me")
        .arg("--config")
        .arg(&config)
        .arg("--make-version")
        .arg("--make-artifact")
        .arg("--upload-artifact")
        .assert()
        .success()
        .stderr(contains("done: 1 package(s) processed, 1 artifact(s) built"));

    assert_eq!(
        api.join(),
        vec![
            "POST /packages/acme/generic/kinesis-sink/versions".to_string(),
            "PUT /content/acme/generic/kinesis-sink/0.4.0/kinesis_sink_0.4.0.zip?publish=1&override=0"
                .to_string(),
        ]
    );
}

#[test]
fn rejected_upload_fails_the_release() {
    let td = tempdir().expect("tempdir");
    let api = spawn_api(vec![403]);
    let target = format!(
        "  - type: bintray\n    user: me\n    password: key\n    api_base: {}\n",
        api.base_url
    );
    let config = create_project(td.path(), "", &target);

    release_manager()
        .arg("--config")
        .arg(&config)
        .arg("--make-artifact")
        .arg("--upload-artifact")
        .assert()
        .failure()
        .stderr(contains("publish error"));

    api.join();
}

#[test]
fn unset_marker_variable_fails() {
    let td = tempdir().expect("tempdir");
    let target = "  - type: bintray\n    user: \"<%= ENV['RELMAN_E2E_NEVER_SET'] %>\"\n    password: key\n";
    let config = create_project(td.path(), "", target);

    release_manager()
        .env_remove("RELMAN_E2E_NEVER_SET")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("RELMAN_E2E_NEVER_SET"));
}
