#![doc = r#"
# mra-connector

## 定位（Where）
- 连接器运行时：把 Lookout MRA v2 事件流持续转发到 syslog 控制台（QRadar 的 LEEF 行或
  Splunk 的 JSON 行），并跟随外部配置变化自动重启。
- 二进制 `mrav2-syslog-connector` 只负责解析命令行、安装日志与处理进程信号，其余逻辑全部
  位于本库，便于以内存替身测试。

## 组件（What）
- [`StreamSupervisor`]：单实体拉取循环，含退避与可观察的状态机；
- [`EventForwarder`]：补齐字段、格式化并按批次写出，完成后恰好通知一次；
- [`ConfigReconciler`]：唯一的 Supervisor 管理者，检测配置变化并持久化进度；
- [`MraApiClient`]：基于 `reqwest` 的远端事件 API 客户端；
- [`FileConfigStore`] / [`EnvSecretResolver`]：文件配置存储与凭据解析。

## 并发模型（How）
- Reconciler 与 Supervisor 是两个 tokio 任务，经 `CancellationToken`（父子令牌）下发停止信号，
  经完成通知回传进度；
- 任一时刻至多一个 Supervisor 存活，停止总是带超时的有界等待。
"#]

pub mod api;
pub mod cli;
pub mod error;
pub mod forwarder;
pub mod reconciler;
pub mod secrets;
pub mod settings;
pub mod store;
pub mod supervisor;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use api::{EventPage, EventSource, MraApiClient};
pub use error::{DeliveryError, FetchError, SettingsError, SupervisorError};
pub use forwarder::{CompletionHandler, DeliveryReport, EventBatch, EventForwarder};
pub use reconciler::{
    ComponentFactory, ConfigReconciler, LiveComponents, ProgressRecorder, ReconcilerSettings,
    formatter_for,
};
pub use secrets::EnvSecretResolver;
pub use settings::SettingsFile;
pub use store::FileConfigStore;
pub use supervisor::{
    StopOutcome, StreamSupervisor, SupervisorHandle, SupervisorParams, SupervisorState,
};
