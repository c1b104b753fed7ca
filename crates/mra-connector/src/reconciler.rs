use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mra_codec_leef::{JsonLineFormatter, LeefTranslator};
use mra_core::{
    Backoff, Classified, ConfigStore, ConfigurationSnapshot, Credential, DeliveryMode,
    EventFormatter, Progress, SecretResolver,
};
use mra_transport_syslog::{LineConnector, SyslogConnector};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::api::{EventSource, MraApiClient};
use crate::error::FetchError;
use crate::forwarder::{CompletionHandler, DeliveryReport, EventForwarder};
use crate::supervisor::{StopOutcome, StreamSupervisor, SupervisorHandle, SupervisorParams};

/// Reconciler 的节奏参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub entity_id: i64,
    /// 尚无配置时的重试间隔。
    pub config_load_sleep: Duration,
    /// 收敛后检查配置变更的间隔。
    pub config_check_sleep: Duration,
    /// 停止 Supervisor 的等待上限。
    pub stop_timeout: Duration,
    /// Supervisor 拉到空页后的等待。
    pub idle_wait: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            entity_id: 1,
            config_load_sleep: Duration::from_secs(30),
            config_check_sleep: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(10),
            idle_wait: Duration::from_secs(30),
        }
    }
}

/// 依据配置快照构造 Supervisor 的外部协作者。
///
/// 生产实现见 [`LiveComponents`]；测试注入内存替身。
pub trait ComponentFactory: Send + Sync + 'static {
    fn event_source(
        &self,
        snapshot: &ConfigurationSnapshot,
        credential: &Credential,
    ) -> Result<Arc<dyn EventSource>, FetchError>;

    fn line_connector(&self, snapshot: &ConfigurationSnapshot) -> Arc<dyn LineConnector>;
}

/// 连接真实 MRA API 与 syslog 目标。
#[derive(Clone, Copy, Debug, Default)]
pub struct LiveComponents;

impl ComponentFactory for LiveComponents {
    fn event_source(
        &self,
        snapshot: &ConfigurationSnapshot,
        credential: &Credential,
    ) -> Result<Arc<dyn EventSource>, FetchError> {
        let client = MraApiClient::new(
            &snapshot.api_domain,
            credential.clone(),
            snapshot.proxy.as_ref(),
        )?;
        Ok(Arc::new(client))
    }

    fn line_connector(&self, snapshot: &ConfigurationSnapshot) -> Arc<dyn LineConnector> {
        Arc::new(SyslogConnector::new(snapshot.target.clone()))
    }
}

/// 按投递模式选择行格式。
pub fn formatter_for(snapshot: &ConfigurationSnapshot) -> Arc<dyn EventFormatter> {
    match snapshot.delivery_mode {
        DeliveryMode::Qradar => Arc::new(LeefTranslator::new(snapshot.leef_version)),
        DeliveryMode::Splunk => Arc::new(JsonLineFormatter::new()),
    }
}

/// 完成通知的接收方：累计进度并只写回进度三元组。
///
/// # 契约 (What)
/// - `fetch_count` 累加本批实际写出的事件数；
/// - 通知携带的位置与已持久化位置不同时才更新位置；
/// - 每次通知都刷新 `fetched_at` 并调用 [`ConfigStore::save_progress`]；
///   写入失败只记录告警，下一批次会带着累计后的进度再次写入。
pub struct ProgressRecorder {
    store: Arc<dyn ConfigStore>,
    entity_id: i64,
    progress: Mutex<Progress>,
}

impl ProgressRecorder {
    pub fn new(store: Arc<dyn ConfigStore>, entity_id: i64, initial: Progress) -> Self {
        Self {
            store,
            entity_id,
            progress: Mutex::new(initial),
        }
    }

    pub fn progress(&self) -> Progress {
        *self.progress.lock()
    }
}

#[async_trait]
impl CompletionHandler for ProgressRecorder {
    async fn on_batch_delivered(&self, report: &DeliveryReport) {
        let updated = {
            let mut progress = self.progress.lock();
            progress.fetch_count += report.delivered.len() as u64;
            if let Some(position) = report.position {
                if position != progress.stream_position {
                    progress.stream_position = position;
                }
            }
            progress.fetched_at = Some(Utc::now());
            *progress
        };

        if report.delivered.is_empty() {
            tracing::debug!(entity_id = self.entity_id, "no new events");
        } else {
            tracing::info!(
                entity_id = self.entity_id,
                delivered = report.delivered.len(),
                skipped = report.skipped,
                stream_position = updated.stream_position,
                fetch_count = updated.fetch_count,
                "forwarded events"
            );
        }

        if let Err(error) = self.store.save_progress(self.entity_id, &updated).await {
            tracing::warn!(
                error.code = error.code(),
                error = %error,
                entity_id = self.entity_id,
                "failed to persist stream progress"
            );
        }
    }
}

struct Applied {
    snapshot: ConfigurationSnapshot,
    credential: Credential,
}

/// 进程内唯一的 Supervisor 管理者。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 配置存储由外部并发编辑，连接器需要在不重启进程的情况下跟随配置变化；
/// - 同一时刻至多一个 Supervisor 存活，避免同一实体被重复拉取。
///
/// ## 逻辑 (How)
/// 1. 启动时以 `config_load_sleep` 为间隔轮询，直到读到配置（读失败同样等待重试）；
/// 2. 首次配置或运行参数变化（忽略进度字段，凭据按解析后的值比较）时：先停止旧
///    Supervisor 并等待其结束，再以持久化进度推导起始游标启动新实例；旧实例停止期间
///    完成的批次会推进进度，因此重启时的进度取自旧实例的记录器而非先前读到的快照；
/// 3. 收敛后以 `config_check_sleep` 为间隔重复第 2 步，直到进程级取消；
/// 4. 退出前以 `stop_timeout` 为上限停止当前 Supervisor。
///
/// ## 注意事项 (Trade-offs)
/// - Supervisor 因永久失败自行结束后，配置未变化时不会被重启，等待运维修正配置；
/// - 协作者构造失败（例如代理地址非法）同样记为已应用，避免在检查间隔内反复报错。
pub struct ConfigReconciler {
    store: Arc<dyn ConfigStore>,
    secrets: Arc<dyn SecretResolver>,
    factory: Arc<dyn ComponentFactory>,
    settings: ReconcilerSettings,
    applied: Option<Applied>,
    active: Option<SupervisorHandle>,
    /// 最近一个 Supervisor 的进度记录器，其内存进度是最新的已投递进度。
    recorder: Option<Arc<ProgressRecorder>>,
}

impl ConfigReconciler {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        secrets: Arc<dyn SecretResolver>,
        factory: Arc<dyn ComponentFactory>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            secrets,
            factory,
            settings,
            applied: None,
            active: None,
            recorder: None,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        if self.await_configuration(&shutdown).await {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.config_check_sleep) => {}
                }
                if !self.await_configuration(&shutdown).await {
                    break;
                }
            }
        }
        self.stop_active().await;
        tracing::info!(entity_id = self.settings.entity_id, "reconciler stopped");
    }

    /// 读取并应用配置；在取得配置前按 `config_load_sleep` 重试，取消时返回 `false`。
    async fn await_configuration(&mut self, shutdown: &CancellationToken) -> bool {
        loop {
            self.reap_finished().await;
            if let Some((snapshot, credential)) = self.load().await {
                if self.has_changed(&snapshot, &credential) {
                    self.restart(snapshot, credential, shutdown).await;
                }
                return true;
            }
            tracing::info!(
                entity_id = self.settings.entity_id,
                retry_secs = self.settings.config_load_sleep.as_secs(),
                "waiting for configuration"
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                _ = tokio::time::sleep(self.settings.config_load_sleep) => {}
            }
        }
    }

    async fn load(&self) -> Option<(ConfigurationSnapshot, Credential)> {
        let entity_id = self.settings.entity_id;
        let snapshot = match self.store.get_by_id(entity_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(
                    error.code = error.code(),
                    error = %error,
                    entity_id,
                    "failed to read configuration"
                );
                return None;
            }
        };
        match self.secrets.resolve(&snapshot.api_key) {
            Ok(credential) => Some((snapshot, credential)),
            Err(error) => {
                tracing::warn!(
                    error.code = error.code(),
                    error = %error,
                    entity_id,
                    "failed to resolve api key"
                );
                None
            }
        }
    }

    fn has_changed(&self, snapshot: &ConfigurationSnapshot, credential: &Credential) -> bool {
        self.applied.as_ref().is_none_or(|applied| {
            !applied.snapshot.same_parameters(snapshot) || applied.credential != *credential
        })
    }

    async fn restart(
        &mut self,
        mut snapshot: ConfigurationSnapshot,
        credential: Credential,
        shutdown: &CancellationToken,
    ) {
        if self.active.is_some() {
            tracing::info!(entity_id = snapshot.entity_id, "configuration changed, restarting stream");
            self.stop_active().await;
        } else {
            tracing::info!(entity_id = snapshot.entity_id, "configuration found, starting stream");
        }

        // 快照读取于旧实例停止之前，停止期间完成的批次已推进进度，以记录器为准。
        if let Some(recorder) = &self.recorder {
            let progress = recorder.progress();
            tracing::debug!(
                entity_id = snapshot.entity_id,
                stream_position = progress.stream_position,
                fetch_count = progress.fetch_count,
                "resuming from delivered progress"
            );
            snapshot.apply_progress(&progress);
        }

        match self.build(&snapshot, &credential) {
            Ok((supervisor, recorder)) => {
                self.active = Some(supervisor.spawn(shutdown));
                self.recorder = Some(recorder);
            }
            Err(error) => tracing::error!(
                error.code = error.code(),
                error = %error,
                entity_id = snapshot.entity_id,
                "cannot start stream with this configuration"
            ),
        }
        self.applied = Some(Applied {
            snapshot,
            credential,
        });
    }

    fn build(
        &self,
        snapshot: &ConfigurationSnapshot,
        credential: &Credential,
    ) -> Result<(StreamSupervisor, Arc<ProgressRecorder>), FetchError> {
        let source = self.factory.event_source(snapshot, credential)?;
        let recorder = Arc::new(ProgressRecorder::new(
            Arc::clone(&self.store),
            snapshot.entity_id,
            snapshot.progress(),
        ));
        let forwarder = EventForwarder::new(
            self.factory.line_connector(snapshot),
            formatter_for(snapshot),
            snapshot.log_identifier.clone(),
            Arc::clone(&recorder) as Arc<dyn CompletionHandler>,
        );
        let supervisor = StreamSupervisor::new(
            source,
            forwarder,
            SupervisorParams {
                entity_name: snapshot.entity_name.clone(),
                cursor: snapshot.start_cursor(),
                event_types: snapshot.event_types,
                idle_wait: self.settings.idle_wait,
                backoff: Backoff::new(),
            },
        );
        Ok((supervisor, recorder))
    }

    async fn reap_finished(&mut self) {
        if !self.active.as_ref().is_some_and(SupervisorHandle::is_finished) {
            return;
        }
        if let Some(handle) = self.active.take() {
            log_outcome(handle.join().await, self.settings.entity_id);
        }
    }

    async fn stop_active(&mut self) {
        if let Some(handle) = self.active.take() {
            let outcome = handle.stop(self.settings.stop_timeout).await;
            log_outcome(outcome, self.settings.entity_id);
        }
    }
}

fn log_outcome(outcome: StopOutcome, entity_id: i64) {
    match outcome {
        StopOutcome::Finished(Ok(cursor)) => {
            tracing::info!(entity_id, cursor = %cursor, "stream supervisor finished");
        }
        StopOutcome::Finished(Err(error)) => tracing::error!(
            error.code = error.code(),
            error = %error,
            entity_id,
            "stream supervisor terminated; waiting for a configuration change"
        ),
        StopOutcome::Failed(detail) => {
            tracing::error!(entity_id, detail = %detail, "stream supervisor task failed");
        }
        StopOutcome::TimedOut => {
            tracing::warn!(entity_id, "stream supervisor was aborted after stop timeout");
        }
    }
}
