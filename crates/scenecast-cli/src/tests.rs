#![deny(clippy::all, clippy::pedantic)]

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::MockServer;
use serde_json::json;
use tempfile::{NamedTempFile, TempDir};

use crate::args::{Cli, CompileArgs, Commands, MergeArgs};
use crate::client::{CliError, Ctx, build_ctx_from_cli};
use crate::handlers::{compile, health, merge};

fn ctx(server: &MockServer) -> Ctx {
    Ctx::new(&server.base_url(), Duration::from_secs(5)).expect("ctx")
}

fn tmp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write tmp");
    file
}

fn cli(server: Option<&str>, timeout_seconds: u64) -> Cli {
    Cli {
        server: server.map(str::to_string),
        timeout_seconds,
        command: Commands::Health,
    }
}

#[test]
fn build_ctx_requires_server() {
    let err = build_ctx_from_cli(&cli(None, 30)).expect_err("missing server should fail");
    assert!(matches!(err, CliError::MissingServer));
}

#[test]
fn build_ctx_rejects_zero_timeout() {
    let err = build_ctx_from_cli(&cli(Some("http://127.0.0.1:8000"), 0))
        .expect_err("zero timeout should fail");
    assert!(matches!(err, CliError::InvalidInput(_)));
}

#[test]
fn build_ctx_normalizes_base() -> Result<(), CliError> {
    let ctx = build_ctx_from_cli(&cli(Some("http://127.0.0.1:8000/api"), 30))?;
    assert_eq!(ctx.url("compile")?.as_str(), "http://127.0.0.1:8000/compile");
    Ok(())
}

#[test]
fn read_value_prefers_file_over_inline() -> Result<(), CliError> {
    let file = tmp_file("class Intro(Scene): pass\n");
    let val = crate::io::read_value(Some("inline".into()), Some(file.path().to_path_buf()))?;
    assert_eq!(val, "class Intro(Scene): pass\n");
    Ok(())
}

#[test]
fn read_value_requires_a_source() {
    let err = crate::io::read_value(None, None).expect_err("no script");
    assert!(matches!(err, CliError::InvalidInput(_)));
}

#[tokio::test]
async fn compile_writes_decoded_video() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/compile").json_body(json!({
            "python_code": "print(1)",
            "class_name": "Intro",
        }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "success": true,
                "video_bytes_base64": STANDARD.encode(b"rendered-bytes"),
                "logs": "",
                "duration": 1.5,
            }));
    });

    let dir = TempDir::new().expect("temp dir");
    let out = dir.path().join("intro.mp4");
    compile::handle(
        &ctx(&server),
        CompileArgs {
            script: Some("print(1)".into()),
            script_file: None,
            class_name: Some("Intro".into()),
            quality: None,
            out: out.clone(),
        },
    )
    .await?;

    mock.assert();
    assert_eq!(std::fs::read(&out).expect("output"), b"rendered-bytes");
    Ok(())
}

#[tokio::test]
async fn compile_failure_surfaces_error_kind() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/compile");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "success": false,
                "error": "SyntaxError: invalid syntax",
                "error_kind": "subprocess_failure",
                "logs": "Traceback ...",
            }));
    });

    let dir = TempDir::new().expect("temp dir");
    let out = dir.path().join("intro.mp4");
    let err = compile::handle(
        &ctx(&server),
        CompileArgs {
            script: Some("class Broken(".into()),
            script_file: None,
            class_name: None,
            quality: None,
            out: out.clone(),
        },
    )
    .await
    .expect_err("failed render");

    match err {
        CliError::Failed { kind, message } => {
            assert_eq!(kind, "subprocess_failure");
            assert!(message.contains("SyntaxError"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn rejected_request_is_decoded_from_400() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/compile");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({
                "success": false,
                "error": "unknown quality `ultra`",
                "error_kind": "invalid_request",
            }));
    });

    let dir = TempDir::new().expect("temp dir");
    let err = compile::handle(
        &ctx(&server),
        CompileArgs {
            script: Some("print(1)".into()),
            script_file: None,
            class_name: None,
            quality: Some("ultra".into()),
            out: dir.path().join("out.mp4"),
        },
    )
    .await
    .expect_err("invalid request");

    assert!(matches!(err, CliError::Failed { ref kind, .. } if kind == "invalid_request"));
}

#[tokio::test]
async fn merge_sends_locations_in_order() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/merge").json_body(json!({
            "video_urls": ["https://cdn.example.com/a.mp4", "https://cdn.example.com/b.mp4"],
            "add_transitions": true,
            "transition_duration": 0.75,
        }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "success": true,
                "video_bytes_base64": STANDARD.encode(b"merged"),
                "scene_count": 2,
            }));
    });

    let dir = TempDir::new().expect("temp dir");
    let out = dir.path().join("lesson.mp4");
    merge::handle(
        &ctx(&server),
        MergeArgs {
            urls: vec![
                "https://cdn.example.com/a.mp4".into(),
                "https://cdn.example.com/b.mp4".into(),
            ],
            transitions: true,
            transition_duration: Some(0.75),
            out: out.clone(),
        },
    )
    .await?;

    mock.assert();
    assert_eq!(std::fs::read(&out).expect("output"), b"merged");
    Ok(())
}

#[tokio::test]
async fn merge_rejects_non_positive_duration_locally() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/merge");
        then.status(200);
    });

    let dir = TempDir::new().expect("temp dir");
    let err = merge::handle(
        &ctx(&server),
        MergeArgs {
            urls: vec!["https://cdn.example.com/a.mp4".into()],
            transitions: true,
            transition_duration: Some(0.0),
            out: dir.path().join("out.mp4"),
        },
    )
    .await
    .expect_err("zero duration");

    assert!(matches!(err, CliError::InvalidInput(_)));
    mock.assert_calls(0);
}

#[tokio::test]
async fn unhealthy_service_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/health");
        then.status(503)
            .header("content-type", "application/json")
            .json_body(json!({
                "status": "unhealthy",
                "renderer_available": false,
                "ffmpeg_available": true,
                "ffmpeg_version": "ffmpeg version 6.1",
                "timestamp": "2026-01-01T00:00:00Z",
            }));
    });

    let err = health::handle(&ctx(&server)).await.expect_err("unhealthy");
    assert!(matches!(err, CliError::Unhealthy));
}

#[tokio::test]
async fn unexpected_status_is_a_server_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/health");
        then.status(502).body("bad gateway");
    });

    let err = health::handle(&ctx(&server)).await.expect_err("bad gateway");
    match err {
        CliError::Server(message) => assert!(message.contains("502"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
