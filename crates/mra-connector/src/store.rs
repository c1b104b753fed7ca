use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mra_core::{ConfigStore, ConfigurationSnapshot, Progress, StoreError};
use serde::{Deserialize, Serialize};

use crate::settings::SettingsFile;

/// 状态文件内容：实体 id 加进度三元组。
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    entity_id: i64,
    #[serde(flatten)]
    progress: Progress,
}

/// 以 TOML 配置文件加 JSON 状态文件实现的配置存储。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - `get_by_id`：每次调用都重新读取配置文件，运维修改文件即可触发 Reconciler 重启；
///   文件不存在或实体 id 不匹配返回 `Ok(None)`，内容非法返回 [`StoreError::Invalid`]；
/// - `save_progress`：只写状态文件，从不改写运维维护的配置文件。
///
/// ## 逻辑 (How)
/// - 状态文件存在时，其 `fetch_count`/`fetched_at` 覆盖快照，非零的 `stream_position`
///   覆盖配置文件中的初始位置；
/// - 写入先落到同目录临时文件再 `rename`，读方只会看到完整的旧内容或新内容；
/// - 状态文件损坏只记录告警并忽略，从配置文件的初始位置续传。
#[derive(Clone, Debug)]
pub struct FileConfigStore {
    config_path: PathBuf,
    state_path: PathBuf,
}

impl FileConfigStore {
    pub fn new(config_path: impl Into<PathBuf>, state_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            state_path: state_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn read_state(&self, entity_id: i64) -> Result<Option<Progress>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.state_path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Unavailable {
                    detail: format!("{}: {err}", self.state_path.display()),
                });
            }
        };
        match serde_json::from_str::<StateRecord>(&text) {
            Ok(record) if record.entity_id == entity_id => Ok(Some(record.progress)),
            Ok(record) => {
                tracing::warn!(
                    path = %self.state_path.display(),
                    expected = entity_id,
                    found = record.entity_id,
                    "ignoring progress recorded for another entity"
                );
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.state_path.display(),
                    error = %err,
                    "ignoring unreadable progress state"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn get_by_id(&self, entity_id: i64) -> Result<Option<ConfigurationSnapshot>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Unavailable {
                    detail: format!("{}: {err}", self.config_path.display()),
                });
            }
        };
        let settings = SettingsFile::parse(&text, &self.config_path)
            .and_then(|settings| settings.validate().map(|()| settings))
            .map_err(|err| StoreError::Invalid {
                entity_id,
                detail: err.to_string(),
            })?;
        if settings.lookout.entity_id != entity_id {
            return Ok(None);
        }

        let mut snapshot = settings.to_snapshot();
        if let Some(progress) = self.read_state(entity_id).await? {
            let initial = snapshot.stream_position;
            snapshot.apply_progress(&progress);
            if progress.stream_position == 0 {
                snapshot.stream_position = initial;
            }
        }
        Ok(Some(snapshot))
    }

    async fn save_progress(&self, entity_id: i64, progress: &Progress) -> Result<(), StoreError> {
        let persist_error = |err: io::Error| StoreError::Persist {
            entity_id,
            detail: format!("{}: {err}", self.state_path.display()),
        };
        let record = StateRecord {
            entity_id,
            progress: *progress,
        };
        let body = serde_json::to_vec_pretty(&record).map_err(|err| StoreError::Persist {
            entity_id,
            detail: err.to_string(),
        })?;

        let mut staging = self.state_path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, body).await.map_err(persist_error)?;
        tokio::fs::rename(&staging, &self.state_path)
            .await
            .map_err(persist_error)
    }
}
