use std::borrow::Cow;
use std::io;

use mra_core::{Classified, FailureClass};
use thiserror::Error;

/// 描述一次底层操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy, Debug)]
pub(crate) struct OperationKind {
    pub code: &'static str,
    pub message: &'static str,
}

pub(crate) const RESOLVE: OperationKind = OperationKind {
    code: "mra.transport.syslog.resolve_failed",
    message: "syslog resolve",
};
pub(crate) const CONNECT: OperationKind = OperationKind {
    code: "mra.transport.syslog.connect_failed",
    message: "syslog connect",
};
pub(crate) const WRITE: OperationKind = OperationKind {
    code: "mra.transport.syslog.write_failed",
    message: "syslog write",
};
pub(crate) const SHUTDOWN: OperationKind = OperationKind {
    code: "mra.transport.syslog.shutdown_failed",
    message: "syslog shutdown",
};
pub(crate) const CONFIGURE: OperationKind = OperationKind {
    code: "mra.transport.syslog.configure_failed",
    message: "syslog configure",
};

const TIMEOUT_CODE: &str = "mra.transport.syslog.timeout";

/// 传输层错误：稳定错误码 + 可读描述 + 重试分类。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct TransportError {
    code: &'static str,
    message: Cow<'static, str>,
    class: FailureClass,
}

impl TransportError {
    pub fn new(
        code: &'static str,
        message: impl Into<Cow<'static, str>>,
        class: FailureClass,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            class,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Classified for TransportError {
    fn class(&self) -> FailureClass {
        self.class
    }

    fn code(&self) -> &'static str {
        self.code
    }
}

/// 将 IO 错误映射为传输错误，并附带重试分类。
pub(crate) fn map_io_error(kind: OperationKind, error: io::Error) -> TransportError {
    let class = categorize_io_error(&error);
    TransportError::new(
        kind.code,
        Cow::Owned(format!("{}: {}", kind.message, error)),
        class,
    )
}

/// 构造超时错误。
pub(crate) fn timeout_error(kind: OperationKind) -> TransportError {
    TransportError::new(
        TIMEOUT_CODE,
        format!("{} timed out", kind.message),
        FailureClass::Transient,
    )
}

/// 地址无法解析为任何套接字地址。
pub(crate) fn unresolved_error(target: &str) -> TransportError {
    TransportError::new(
        RESOLVE.code,
        format!("{}: no address found for {target}", RESOLVE.message),
        FailureClass::Transient,
    )
}

/// 下游控制台的连接与写入失败几乎都可在稍后恢复，只有权限与不支持的操作视为永久失败。
fn categorize_io_error(error: &io::Error) -> FailureClass {
    use io::ErrorKind;
    match error.kind() {
        ErrorKind::PermissionDenied | ErrorKind::Unsupported | ErrorKind::InvalidInput => {
            FailureClass::Permanent
        }
        _ => FailureClass::Transient,
    }
}
