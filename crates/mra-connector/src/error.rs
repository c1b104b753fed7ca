//! # error 模块说明
//!
//! ## 角色定位
//! - 运行时（Supervisor、Forwarder、Reconciler、配置加载）的错误类型；
//! - 每个跨越循环边界的错误都实现 [`Classified`]，循环据此决定退避还是停止。
//!
//! ## 错误码约定
//! - `mra.fetch.*`：远端事件 API；
//! - `mra.delivery.*`：出站投递；
//! - `mra.settings.*`：启动期配置文件。

use std::path::PathBuf;

use mra_core::{Classified, FailureClass, SecretError};
use mra_transport_syslog::TransportError;
use thiserror::Error;

/// 拉取一页事件失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// 刷新令牌后仍被拒绝，或令牌端点本身拒绝了 API key。
    #[error("authentication rejected by {endpoint}: HTTP {status}")]
    Unauthorized { endpoint: String, status: u16 },

    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("request to {endpoint} failed: {detail}")]
    Network { endpoint: String, detail: String },

    #[error("response from {endpoint} could not be decoded: {detail}")]
    Decode { endpoint: String, detail: String },

    #[error("event client is misconfigured: {detail}")]
    Configuration { detail: String },
}

impl Classified for FetchError {
    fn class(&self) -> FailureClass {
        match self {
            FetchError::Unauthorized { .. } | FetchError::Configuration { .. } => {
                FailureClass::Permanent
            }
            FetchError::Status { status, .. } if (400..500).contains(status) => {
                FailureClass::Permanent
            }
            FetchError::Status { .. }
            | FetchError::RateLimited { .. }
            | FetchError::Network { .. }
            | FetchError::Decode { .. } => FailureClass::Transient,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            FetchError::Unauthorized { .. } => "mra.fetch.unauthorized",
            FetchError::RateLimited { .. } => "mra.fetch.rate_limited",
            FetchError::Status { .. } => "mra.fetch.http_status",
            FetchError::Network { .. } => "mra.fetch.network",
            FetchError::Decode { .. } => "mra.fetch.decode",
            FetchError::Configuration { .. } => "mra.fetch.configuration",
        }
    }
}

/// 一个批次未能完整送达下游。
///
/// 批次被整体放弃且不触发完成通知，游标因此不会前进。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("failed to open channel to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to transmit event {index} of batch to {target}: {source}")]
    Transmit {
        target: String,
        index: usize,
        #[source]
        source: TransportError,
    },

    #[error("failed to close channel to {target}: {source}")]
    Close {
        target: String,
        #[source]
        source: TransportError,
    },
}

impl DeliveryError {
    pub fn transport(&self) -> &TransportError {
        match self {
            DeliveryError::Connect { source, .. }
            | DeliveryError::Transmit { source, .. }
            | DeliveryError::Close { source, .. } => source,
        }
    }
}

impl Classified for DeliveryError {
    fn class(&self) -> FailureClass {
        self.transport().class()
    }

    fn code(&self) -> &'static str {
        match self {
            DeliveryError::Connect { .. } => "mra.delivery.connect_failed",
            DeliveryError::Transmit { .. } => "mra.delivery.transmit_failed",
            DeliveryError::Close { .. } => "mra.delivery.close_failed",
        }
    }
}

/// Supervisor 因永久失败而终止。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("event stream stopped: {0}")]
    Fetch(#[from] FetchError),
}

impl Classified for SupervisorError {
    fn class(&self) -> FailureClass {
        match self {
            SupervisorError::Fetch(inner) => inner.class(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            SupervisorError::Fetch(inner) => inner.code(),
        }
    }
}

/// 启动期配置文件无法使用。
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("configuration field `{field}` must not be empty")]
    MissingField { field: &'static str },

    #[error("configuration field `{field}` is invalid: {detail}")]
    InvalidField { field: &'static str, detail: String },

    #[error(transparent)]
    Secret(#[from] SecretError),
}

impl Classified for SettingsError {
    fn class(&self) -> FailureClass {
        FailureClass::Permanent
    }

    fn code(&self) -> &'static str {
        match self {
            SettingsError::Read { .. } => "mra.settings.read_failed",
            SettingsError::Parse { .. } => "mra.settings.parse_failed",
            SettingsError::MissingField { .. } => "mra.settings.missing_field",
            SettingsError::InvalidField { .. } => "mra.settings.invalid_field",
            SettingsError::Secret(inner) => inner.code(),
        }
    }
}
