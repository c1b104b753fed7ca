use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::cli::LogFormat;

/// 全局日志订阅器的安装参数。
#[derive(Clone, Debug, Default)]
pub struct TelemetryOptions {
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
    pub format: LogFormat,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// 安装进程级 `tracing` 订阅器。
///
/// # 教案式注释
/// - `RUST_LOG` 存在时优先生效，否则默认 `info`，`verbose` 时为 `debug`；
/// - 指定日志文件时以追加方式写入，写端包在 `Mutex` 中供多线程共享，且关闭 ANSI 颜色；
/// - 只能调用一次，重复安装返回 [`TelemetryError::AlreadyInstalled`]。
pub fn install(options: &TelemetryOptions) -> Result<(), TelemetryError> {
    let filter = build_env_filter(options.verbose);
    let writer = match &options.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| TelemetryError::OpenLogFile {
                    path: path.clone(),
                    source,
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter);
    match options.format {
        LogFormat::Text => registry
            .with(layer.with_ansi(options.log_file.is_none()))
            .try_init()?,
        LogFormat::Json => registry.with(layer.json()).try_init()?,
    }
    Ok(())
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}
