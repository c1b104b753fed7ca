use async_trait::async_trait;

use crate::config::{ConfigurationSnapshot, Credential, Progress};
use crate::error::{SecretError, StoreError};

/// 持久化配置存储的窄接口。
///
/// # 教案式注释
/// - **契约 (What)**：
///   - `get_by_id`：返回整份配置快照的副本；尚未配置时返回 `Ok(None)`；
///   - `save_progress`：只写入 `stream_position`/`fetch_count`/`fetched_at` 三个字段，
///     其余字段由外部（界面、运维）并发编辑，实现方不得覆盖；
/// - **前置条件**：实现方需满足 `Send + Sync + 'static`，以便在 Reconciler 与 Supervisor
///   两个任务之间共享；
/// - **后置条件**：`save_progress` 成功返回后，下一次 `get_by_id` 可观察到新的进度。
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    async fn get_by_id(&self, entity_id: i64) -> Result<Option<ConfigurationSnapshot>, StoreError>;

    async fn save_progress(&self, entity_id: i64, progress: &Progress) -> Result<(), StoreError>;
}

/// 将配置中的凭据引用解析为实际凭据。
pub trait SecretResolver: Send + Sync + 'static {
    fn resolve(&self, reference: &str) -> Result<Credential, SecretError>;
}
