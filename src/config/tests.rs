use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8000");
    assert_eq!(settings.server.request_timeout, Duration::from_secs(300));
    assert_eq!(
        settings.server.max_request_bytes.get(),
        DEFAULT_MAX_REQUEST_BYTES
    );
    assert_eq!(settings.render.cli_path, PathBuf::from("manim"));
    assert_eq!(settings.render.timeout, Duration::from_secs(240));
    assert_eq!(settings.render.default_quality, Quality::Low);
    assert!(settings.render.scratch_root.is_none());
    assert_eq!(settings.merge.ffmpeg_path, PathBuf::from("ffmpeg"));
    assert_eq!(settings.merge.crf, 23);
    assert_eq!(settings.merge.preset, "medium");
    assert_eq!(settings.merge.transition_spacing_seconds, 10.0);
    assert_eq!(settings.merge.default_transition_seconds, 0.5);
    assert!(settings.fetch.user_agent.starts_with("scenecast/"));
    assert!(!settings.fetch.allow_file_locations);
    assert_eq!(settings.health.probe_timeout, Duration::from_secs(5));
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.render.cli_path = Some(PathBuf::from("/opt/manim"));

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        tools: ToolOverrides {
            render_cli_path: Some(PathBuf::from("/usr/local/bin/manim")),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.render.cli_path,
        PathBuf::from("/usr/local/bin/manim")
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_quality_accepts_aliases_and_rejects_unknown() {
    let mut raw = RawSettings::default();
    raw.render.default_quality = Some("high".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.default_quality, Quality::High);

    let mut raw = RawSettings::default();
    raw.render.default_quality = Some("ultra".to_string());
    let err = Settings::from_raw(raw).expect_err("unknown quality");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.default_quality",
            ..
        }
    ));
}

#[test]
fn subprocess_bounds_must_be_shorter_than_request_bound() {
    let mut raw = RawSettings::default();
    raw.server.request_timeout_seconds = Some(120);
    raw.render.timeout_seconds = Some(60);
    raw.merge.timeout_seconds = Some(120);

    let err = Settings::from_raw(raw).expect_err("merge bound equals request bound");
    match err {
        LoadError::Invalid { key, reason } => {
            assert_eq!(key, "merge.timeout_seconds");
            assert!(reason.contains("120s"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.fetch.max_artifact_bytes = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "fetch.max_artifact_bytes",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.render.timeout_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "render.timeout_seconds",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.merge.default_transition_seconds = Some(0.0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "merge.default_transition_seconds",
            ..
        })
    ));
}

#[test]
fn crf_and_paths_are_validated() {
    let mut raw = RawSettings::default();
    raw.merge.crf = Some(52);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "merge.crf",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.merge.ffmpeg_path = Some(PathBuf::new());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "merge.ffmpeg_path",
            ..
        })
    ));
}

#[test]
fn pipeline_configs_follow_settings() {
    let mut raw = RawSettings::default();
    raw.render.scratch_root = Some(PathBuf::from("/var/scratch"));
    raw.merge.crf = Some(18);
    let settings = Settings::from_raw(raw).expect("valid settings");

    let render = RenderPipelineConfig::from(&settings);
    assert_eq!(render.scratch_root, Some(PathBuf::from("/var/scratch")));

    let merge = MergePipelineConfig::from(&settings);
    assert_eq!(merge.crf, 18);
    assert_eq!(merge.scratch_root, Some(PathBuf::from("/var/scratch")));

    let health = HealthProbeConfig::from(&settings);
    assert_eq!(health.renderer_path, PathBuf::from("manim"));
    assert_eq!(health.timeout, Duration::from_secs(5));
}

#[test]
fn file_locations_flow_into_fetch_config() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert!(!FetchConfig::from(&settings.fetch).allow_file_locations);

    let mut raw = RawSettings::default();
    raw.fetch.allow_file_locations = Some(true);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(FetchConfig::from(&settings.fetch).allow_file_locations);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["scenecast"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "scenecast",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--render-default-quality",
        "medium_quality",
        "--merge-ffmpeg-path",
        "/usr/bin/ffmpeg",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.render_default_quality.as_deref(),
                Some("medium_quality")
            );
            assert_eq!(
                serve.overrides.tools.ffmpeg_path,
                Some(PathBuf::from("/usr/bin/ffmpeg"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_tool_check_subcommand() {
    let args = CliArgs::parse_from(["scenecast", "probe", "--render-cli-path", "/opt/manim"]);

    match args.command.expect("subcommand") {
        Command::Probe(check) => {
            assert_eq!(
                check.tools.render_cli_path,
                Some(PathBuf::from("/opt/manim"))
            );
            assert!(check.tools.ffmpeg_path.is_none());
        }
        _ => panic!("wrong command parsed"),
    }
}
