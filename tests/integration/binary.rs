//! The launcher binary end to end, against a local release server.

use predicates::prelude::*;
use signed_launcher::test_utils::fixtures::{BUILD, BUILD_SIG};

use crate::common::{EXE, LauncherProject, ReleaseServer};

#[test]
fn missing_configuration_fails() {
    let project = LauncherProject::new();

    project
        .command()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn unknown_platform_fails_before_any_request() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    let project = LauncherProject::new();
    project.configure(&server);

    project
        .command()
        .arg("os=plan9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown platform 'plan9'"));

    assert!(server.requests().is_empty());
}

#[test]
fn invalid_configuration_fails() {
    let project = LauncherProject::new();
    std::fs::write(
        project.config_path(),
        "release_url = \"file:///etc/passwd\"\npublic_key_url = \"https://k\"\ndefault_executable = \"t\"\n",
    )
    .unwrap();

    project
        .command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("release_url"));
}

#[test]
fn no_launch_installs_verified_build() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    let project = LauncherProject::new();
    project.configure(&server);

    project.command().arg("--no-launch").assert().success();

    assert_eq!(std::fs::read(project.executable()).unwrap(), BUILD);
    assert_eq!(std::fs::read_to_string(project.signature()).unwrap(), BUILD_SIG);

    let requests = server.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|request| {
        request.user_agent.as_deref().is_some_and(|agent| agent.starts_with("signed-launcher/"))
    }));
}

#[test]
fn second_run_downloads_nothing_new() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    let project = LauncherProject::new();
    project.configure(&server);

    project.command().arg("--no-launch").assert().success();
    project.command().arg("--no-launch").assert().success();

    let exe_downloads =
        server.requests().iter().filter(|request| request.path == "/download/tool").count();
    assert_eq!(exe_downloads, 1);
}

#[test]
fn tampered_build_is_not_installed() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    server.serve("/download/tool", b"malicious payload".to_vec());
    let project = LauncherProject::new();
    project.configure(&server);

    project
        .command()
        .arg("--no-launch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to verify signature"));

    assert!(!project.executable().exists());
    assert!(!project.signature().exists());
}

#[test]
fn logs_are_written_to_log_dir() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    let project = LauncherProject::new();
    project.configure(&server);

    project.command().arg("--no-launch").assert().success();

    let log = std::fs::read_to_string(project.path().join("logs").join("launcher.log")).unwrap();
    assert!(log.contains("Update Success"), "{log}");
    assert!(log.contains("Verification signed by"), "{log}");
}

#[cfg(unix)]
#[test]
fn current_build_is_launched_with_forwarded_arguments() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    let project = LauncherProject::new();
    project.configure(&server);
    std::fs::write(project.signature(), BUILD_SIG).unwrap();
    project.install_script("echo \"child:$*\"\nexit 7");

    project
        .command()
        .args([&format!("exe={EXE}"), "--port", "80"])
        .assert()
        .code(7)
        .stdout(predicate::str::contains("child:--port 80"));

    assert!(!server.was_requested("/download/tool"));
}

#[cfg(unix)]
#[test]
fn nothing_is_launched_when_update_fails() {
    let server = ReleaseServer::start();
    server.publish_signed_build();
    server.respond("/releases/latest", 503);
    let project = LauncherProject::new();
    project.configure(&server);
    let marker = project.path().join("ran");
    project.install_script(&format!("touch '{}'", marker.display()));

    project
        .command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Response Code 503"));

    assert!(!marker.exists());
}
