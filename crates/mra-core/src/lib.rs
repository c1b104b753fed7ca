#![doc = r#"
# mra-core

## 定位（Where）
- 连接器工作区的基础积木：承载 MRA 事件的数据模型、流游标、配置快照、退避策略，
  以及与外部协作者（配置存储、密钥解析、事件格式化）交互的窄接口。
- `mra-codec-leef`、`mra-transport-syslog` 与 `mra-connector` 均只依赖本 crate 暴露的类型，
  彼此之间不直接耦合。

## 核心契约（What）
- [`Event`]：来自远端 API 的嵌套 JSON 记录，核心逻辑只读取、从不原地修改；
- [`StreamCursor`]：位置令牌与起始时间二选一，是唯一的续传坐标；
- [`ConfigurationSnapshot`]：Reconciler 持有的整份配置副本，按值比较以检测变更；
- [`Backoff`]：下限 15 秒、上限 600 秒、成功即复位的指数退避；
- [`ConfigStore`] / [`SecretResolver`] / [`EventFormatter`]：核心消费外部能力的全部入口。

## 错误分类（How）
- 所有跨越循环边界的错误都实现 [`Classified`]，以 [`FailureClass`] 区分可重试与永久失败，
  Supervisor 据此决定进入退避还是终止实例。
"#]

mod backoff;
mod config;
mod cursor;
mod error;
mod event;
mod format;
mod store;

pub use backoff::{BACKOFF_CEILING, BACKOFF_FLOOR, Backoff};
pub use config::{
    ConfigurationSnapshot, Credential, DeliveryMode, DeliveryTarget, EventTypes, LeefVersion,
    LogIdentifier, Progress, ProxySettings, TransportProtocol,
};
pub use cursor::StreamCursor;
pub use error::{Classified, FailureClass, SecretError, StoreError, TranslateError};
pub use event::{Event, EventKind, render_value};
pub use format::EventFormatter;
pub use store::{ConfigStore, SecretResolver};
