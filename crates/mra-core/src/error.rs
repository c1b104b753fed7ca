//! # error 模块说明
//!
//! ## 角色定位
//! - 集中声明核心数据层与协作者接口的错误类型；
//! - 提供 [`FailureClass`] 与 [`Classified`]，使 Supervisor/Reconciler 在不了解具体错误来源的
//!   情况下判断应当退避重试还是终止。
//!
//! ## 设计要求
//! - 所有错误类型派生 `thiserror::Error`，并提供稳定的点分错误码（`mra.*`）；
//! - 错误文案保持英文，便于直接进入日志检索。

use thiserror::Error;

/// 失败的重试分类。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 网络抖动、限流、下游暂不可达等，可在退避后重试。
    Transient,
    /// 认证/授权失败或请求本身非法，重试无法自愈。
    Permanent,
}

/// 可被重试策略识别的错误。
pub trait Classified {
    fn class(&self) -> FailureClass;

    /// 稳定错误码，用于日志字段 `error.code`。
    fn code(&self) -> &'static str;

    fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

/// 配置存储读写失败。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration store is unavailable: {detail}")]
    Unavailable { detail: String },

    #[error("configuration record {entity_id} is invalid: {detail}")]
    Invalid { entity_id: i64, detail: String },

    #[error("failed to persist progress for configuration {entity_id}: {detail}")]
    Persist { entity_id: i64, detail: String },
}

impl Classified for StoreError {
    fn class(&self) -> FailureClass {
        match self {
            StoreError::Unavailable { .. } | StoreError::Persist { .. } => {
                FailureClass::Transient
            }
            StoreError::Invalid { .. } => FailureClass::Permanent,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "mra.store.unavailable",
            StoreError::Invalid { .. } => "mra.store.invalid",
            StoreError::Persist { .. } => "mra.store.persist_failed",
        }
    }
}

/// 凭据引用无法解析。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("credential reference `{reference}` is not set")]
    Missing { reference: String },

    #[error("credential reference `{reference}` is empty")]
    Empty { reference: String },
}

impl Classified for SecretError {
    fn class(&self) -> FailureClass {
        FailureClass::Permanent
    }

    fn code(&self) -> &'static str {
        match self {
            SecretError::Missing { .. } => "mra.secret.missing",
            SecretError::Empty { .. } => "mra.secret.empty",
        }
    }
}

/// 单条事件的格式化失败。
///
/// 调用方丢弃该事件而不是整批。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("event is missing mandatory field `{field}`")]
    MissingField { field: &'static str },

    #[error("event could not be encoded: {detail}")]
    Encode { detail: String },
}

impl Classified for TranslateError {
    fn class(&self) -> FailureClass {
        FailureClass::Permanent
    }

    fn code(&self) -> &'static str {
        match self {
            TranslateError::MissingField { .. } => "mra.translate.missing_field",
            TranslateError::Encode { .. } => "mra.translate.encode_failed",
        }
    }
}
