use std::{future::IntoFuture, process, sync::Arc};

use scenecast::{
    application::{
        error::AppError,
        fetch::{ArtifactFetcher, FetchConfig, HttpArtifactFetcher},
        health::{HealthProbe, HealthProbeConfig},
        merge::{MergePipeline, MergePipelineConfig},
        process::{ProcessRunner, TokioProcessRunner},
        render::{RenderPipeline, RenderPipelineConfig},
    },
    config,
    infra::{
        error::InfraError,
        http::{self, AppState, RequestDefaults},
        telemetry,
    },
};
use scenecast_api_types::HealthStatus;
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Probe(_) => run_probe(settings).await,
    }
}

async fn run_probe(settings: config::Settings) -> Result<(), AppError> {
    let probe = HealthProbe::new(
        HealthProbeConfig::from(&settings),
        Arc::new(TokioProcessRunner),
    );
    let report = probe.check().await;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to encode probe report: {err}")))?;
    println!("{rendered}");

    match report.status {
        HealthStatus::Healthy => Ok(()),
        HealthStatus::Unhealthy => Err(AppError::unexpected(
            "renderer or ffmpeg did not answer the version probe",
        )),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    if let Some(root) = settings.render.scratch_root.as_ref() {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|err| AppError::from(InfraError::Io(err)))?;
    }

    let state = build_app_state(&settings)?;
    let max_request_bytes = usize::try_from(settings.server.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("server.max_request_bytes exceeds usize"))?;
    let router = http::build_router(state, max_request_bytes);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "scenecast::serve",
        addr = %settings.server.addr,
        renderer = %settings.render.cli_path.display(),
        ffmpeg = %settings.merge.ffmpeg_path.display(),
        request_timeout_secs = settings.server.request_timeout.as_secs(),
        "Listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();
    let mut handle = tokio::spawn(server);

    tokio::select! {
        joined = &mut handle => return server_result(joined),
        _ = stop_rx.changed() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "scenecast::serve",
        grace_secs = grace.as_secs(),
        "Shutdown requested, draining in-flight requests"
    );

    match tokio::time::timeout(grace, &mut handle).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "scenecast::serve",
                grace_secs = grace.as_secs(),
                "Graceful shutdown window elapsed, aborting remaining requests"
            );
            handle.abort();
            Ok(())
        }
    }
}

fn build_app_state(settings: &config::Settings) -> Result<AppState, AppError> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);
    let fetcher: Arc<dyn ArtifactFetcher> = Arc::new(
        HttpArtifactFetcher::new(&FetchConfig::from(&settings.fetch))
            .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?,
    );

    let render = RenderPipeline::new(RenderPipelineConfig::from(settings), runner.clone());
    let merge = MergePipeline::new(MergePipelineConfig::from(settings), runner.clone(), fetcher);
    let health = HealthProbe::new(HealthProbeConfig::from(settings), runner);

    Ok(AppState {
        render: Arc::new(render),
        merge: Arc::new(merge),
        health: Arc::new(health),
        defaults: RequestDefaults {
            quality: settings.render.default_quality,
            transition_seconds: settings.merge.default_transition_seconds,
            request_timeout: settings.server.request_timeout,
            allow_file_locations: settings.fetch.allow_file_locations,
        },
    })
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
