#![doc = r#"
# mra-transport-syslog

## 定位
- Event Forwarder 的出站传输层：按批次建立到下游控制台（QRadar/Splunk）的 syslog 行通道，
  支持 TCP（`\n` 分帧）与 UDP（一行一个数据报）。

## 核心契约（What）
- [`LineConnector::open`]：为一个批次打开全新的通道，绝不复用上一批次的连接；
- [`LineSink`]：逐行写出，`close` 返回 `Ok` 即表示该批次全部行已交付；
- 失败统一为 [`TransportError`]，携带稳定错误码（`mra.transport.syslog.*`）与
  [`FailureClass`](mra_core::FailureClass)，Supervisor 据此退避重试。

## 实现策略（How）
- 每次 IO 都包在超时内执行，超时映射为可重试错误；
- 地址在每次建连时重新解析，DNS 变化无需重启进程；
- TCP 连接通过 `socket2` 打开 keepalive。
"#]

mod channel;
mod error;
mod util;

use std::time::Duration;

use async_trait::async_trait;
use mra_core::{DeliveryTarget, TransportProtocol};

pub use channel::{LineSink, TcpLineChannel, UdpLineChannel};
pub use error::TransportError;

/// 为每个批次打开新通道的工厂。
#[async_trait]
pub trait LineConnector: Send + Sync + 'static {
    /// `client_name` 作为诊断标识写入通道，调用方负责使其唯一。
    async fn open(&self, client_name: String) -> Result<Box<dyn LineSink>, TransportError>;

    /// 目标的可读描述，用于日志。
    fn describe(&self) -> String;
}

/// 连接到固定 `host:port` 的 syslog 连接器。
#[derive(Clone, Debug)]
pub struct SyslogConnector {
    target: DeliveryTarget,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl SyslogConnector {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(target: DeliveryTarget) -> Self {
        Self {
            target,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.write_timeout = write;
        self
    }

    pub fn target(&self) -> &DeliveryTarget {
        &self.target
    }
}

#[async_trait]
impl LineConnector for SyslogConnector {
    async fn open(&self, client_name: String) -> Result<Box<dyn LineSink>, TransportError> {
        let addr = util::resolve(&self.target.host, self.target.port, self.connect_timeout).await?;
        tracing::debug!(
            client = %client_name,
            target = %self.target,
            resolved = %addr,
            "opening syslog channel"
        );
        match self.target.protocol {
            TransportProtocol::Tcp => {
                let channel = TcpLineChannel::connect(
                    client_name,
                    addr,
                    self.connect_timeout,
                    self.write_timeout,
                )
                .await?;
                Ok(Box::new(channel))
            }
            TransportProtocol::Udp => {
                let channel = UdpLineChannel::connect(client_name, addr, self.write_timeout).await?;
                Ok(Box::new(channel))
            }
        }
    }

    fn describe(&self) -> String {
        self.target.to_string()
    }
}
