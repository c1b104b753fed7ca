use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// 日志输出格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "mrav2-syslog-connector",
    version,
    about = "Forward Lookout MRA v2 events to a syslog console (QRadar LEEF or Splunk JSON)"
)]
pub struct Cli {
    /// Path to the connector configuration file (TOML).
    #[arg(short, long, env = "MRA_CONNECTOR_CONFIG")]
    pub config: PathBuf,

    /// Append logs to this file instead of stderr.
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
