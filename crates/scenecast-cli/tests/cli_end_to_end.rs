#![deny(clippy::all, clippy::pedantic)]

use assert_cmd::Command;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::MockServer;
use predicates::str::contains;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn script_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write script");
    file
}

#[test]
fn compile_works_end_to_end() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/compile");
        then.status(200)
            .header("content-type", "application/json")
            .body(format!(
                r#"{{"success":true,"video_bytes_base64":"{}","logs":"","duration":0.8}}"#,
                STANDARD.encode(b"video")
            ));
    });

    let script = script_file("from manim import *\nclass Intro(Scene): pass\n");
    let dir = TempDir::new().expect("temp dir");
    let out = dir.path().join("intro.mp4");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scenecast-cli"));
    cmd.env("SCENECAST_SERVER_URL", server.base_url())
        .arg("compile")
        .arg("--script-file")
        .arg(script.path())
        .arg("--class-name")
        .arg("Intro")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("\"bytes\": 5"));

    mock.assert();
    assert_eq!(std::fs::read(&out).expect("output"), b"video");
}

#[test]
fn failed_render_exits_nonzero_with_kind() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/compile");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"success":false,"error":"no video produced","error_kind":"artifact_not_found","logs":"listing"}"#);
    });

    let dir = TempDir::new().expect("temp dir");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scenecast-cli"));
    cmd.env("SCENECAST_SERVER_URL", server.base_url())
        .arg("compile")
        .arg("--script")
        .arg("print(1)")
        .arg("--out")
        .arg(dir.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(contains("artifact_not_found"));
}

#[test]
fn health_prints_report() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/health");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"status":"healthy","renderer_available":true,"renderer_version":"Manim Community v0.18.1","ffmpeg_available":true,"ffmpeg_version":"ffmpeg version 6.1","timestamp":"2026-01-01T00:00:00Z"}"#);
    });

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scenecast-cli"));
    cmd.env("SCENECAST_SERVER_URL", server.base_url())
        .arg("health")
        .assert()
        .success()
        .stdout(contains("\"status\": \"healthy\""));
    mock.assert();
}

#[test]
fn missing_server_fails_fast() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scenecast-cli"));
    cmd.arg("health")
        .env_remove("SCENECAST_SERVER_URL")
        .assert()
        .failure()
        .stderr(contains("MissingServer"));
}

#[test]
fn merge_requires_locations() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scenecast-cli"));
    cmd.env("SCENECAST_SERVER_URL", "http://127.0.0.1:9")
        .arg("merge")
        .arg("--out")
        .arg("merged.mp4")
        .assert()
        .failure()
        .stderr(contains("<URLS>"));
}
