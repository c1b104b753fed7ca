use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use mra_connector::cli::Cli;
use mra_connector::telemetry::{self, TelemetryOptions};
use mra_connector::{ConfigReconciler, EnvSecretResolver, FileConfigStore, LiveComponents, SettingsFile};
use tokio_util::sync::CancellationToken;

/// Reconciler 自身收尾（停止 Supervisor 之外）预留的时间。
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = TelemetryOptions {
        verbose: cli.verbose,
        log_file: cli.log_file.clone(),
        format: cli.log_format,
    };
    if let Err(error) = telemetry::install(&options) {
        eprintln!("mrav2-syslog-connector: {error}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "connector failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = SettingsFile::load(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    let state_path = settings.state_path(&cli.config);
    let reconciler_settings = settings.reconciler_settings();
    let stop_timeout = reconciler_settings.stop_timeout;

    tracing::info!(
        config = %cli.config.display(),
        state = %state_path.display(),
        entity_id = settings.lookout.entity_id,
        entity = %settings.lookout.entity_name,
        target = %settings.to_snapshot().target,
        types = %settings.event_types().to_query(),
        "starting MRA v2 syslog connector"
    );

    let reconciler = ConfigReconciler::new(
        Arc::new(FileConfigStore::new(cli.config.clone(), state_path)),
        Arc::new(EnvSecretResolver),
        Arc::new(LiveComponents),
        reconciler_settings,
    );
    let shutdown = CancellationToken::new();
    let mut task = tokio::spawn(reconciler.run(shutdown.clone()));

    tokio::select! {
        signal = shutdown_signal() => {
            signal.context("failed to listen for shutdown signals")?;
            tracing::info!("shutdown requested");
        }
        joined = &mut task => {
            joined.context("reconciler task failed")?;
            return Ok(());
        }
    }

    shutdown.cancel();
    match tokio::time::timeout(stop_timeout + SHUTDOWN_MARGIN, task).await {
        Ok(Ok(())) => tracing::info!("connector stopped"),
        Ok(Err(error)) => tracing::warn!(error = %error, "reconciler task failed during shutdown"),
        Err(_) => tracing::warn!(
            timeout_secs = (stop_timeout + SHUTDOWN_MARGIN).as_secs(),
            "reconciler did not stop in time, exiting anyway"
        ),
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
