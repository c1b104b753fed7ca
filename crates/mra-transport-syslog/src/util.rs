use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{OperationKind, RESOLVE, TransportError, map_io_error, timeout_error, unresolved_error};

/// 在截止时间内执行一次 IO Future，超时与 IO 错误统一映射为 [`TransportError`]。
pub(crate) async fn run_with_timeout<F, T>(
    kind: OperationKind,
    timeout: Duration,
    future: F,
) -> Result<T, TransportError>
where
    F: Future<Output = io::Result<T>>,
{
    let sleep = tokio::time::sleep(timeout);
    tokio::pin!(sleep);
    tokio::pin!(future);
    tokio::select! {
        biased;
        result = &mut future => result.map_err(|err| map_io_error(kind, err)),
        _ = &mut sleep => Err(timeout_error(kind)),
    }
}

/// 解析 `host:port`，取第一个可用地址。
pub(crate) async fn resolve(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<SocketAddr, TransportError> {
    let mut addrs = run_with_timeout(RESOLVE, timeout, tokio::net::lookup_host((host, port))).await?;
    addrs
        .next()
        .ok_or_else(|| unresolved_error(&format!("{host}:{port}")))
}
