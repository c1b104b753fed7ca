//! 单元测试共用的内存替身。

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mra_core::{
    ConfigStore, ConfigurationSnapshot, Credential, DeliveryMode, DeliveryTarget, EventTypes,
    FailureClass, LeefVersion, Progress, SecretError, SecretResolver, StoreError, StreamCursor,
    TransportProtocol,
};
use mra_transport_syslog::{LineConnector, LineSink, TransportError};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::api::{EventPage, EventSource};
use crate::error::FetchError;
use crate::forwarder::{CompletionHandler, DeliveryReport};

#[derive(Clone, Debug, Default)]
pub(crate) struct ChannelRecord {
    pub name: String,
    pub lines: Vec<String>,
    pub closed: bool,
}

/// 记录每个批次通道及其写出行的连接器。
#[derive(Default)]
pub(crate) struct RecordingConnector {
    channels: Arc<Mutex<Vec<ChannelRecord>>>,
    fail_writes: bool,
    line_delay: Option<Duration>,
}

impl RecordingConnector {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// 每写一行先等待 `delay`，用于模拟投递进行中的批次。
    pub fn slow(delay: Duration) -> Self {
        Self {
            line_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn channels(&self) -> Vec<ChannelRecord> {
        self.channels.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.channels
            .lock()
            .iter()
            .flat_map(|channel| channel.lines.clone())
            .collect()
    }
}

struct RecordingSink {
    channels: Arc<Mutex<Vec<ChannelRecord>>>,
    index: usize,
    name: String,
    fail_writes: bool,
    line_delay: Option<Duration>,
}

#[async_trait]
impl LineSink for RecordingSink {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        if let Some(delay) = self.line_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes {
            return Err(TransportError::new(
                "mra.transport.syslog.write_failed",
                "syslog write: broken pipe",
                FailureClass::Transient,
            ));
        }
        self.channels.lock()[self.index].lines.push(line.to_owned());
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        self.channels.lock()[self.index].closed = true;
        Ok(())
    }

    fn client_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl LineConnector for RecordingConnector {
    async fn open(&self, client_name: String) -> Result<Box<dyn LineSink>, TransportError> {
        let index = {
            let mut channels = self.channels.lock();
            channels.push(ChannelRecord {
                name: client_name.clone(),
                ..ChannelRecord::default()
            });
            channels.len() - 1
        };
        Ok(Box::new(RecordingSink {
            channels: Arc::clone(&self.channels),
            index,
            name: client_name,
            fail_writes: self.fail_writes,
            line_delay: self.line_delay,
        }))
    }

    fn describe(&self) -> String {
        "memory://recording".into()
    }
}

/// 收集全部完成通知。
#[derive(Default)]
pub(crate) struct RecordingHandler {
    reports: Mutex<Vec<DeliveryReport>>,
}

impl RecordingHandler {
    pub fn reports(&self) -> Vec<DeliveryReport> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl CompletionHandler for RecordingHandler {
    async fn on_batch_delivered(&self, report: &DeliveryReport) {
        self.reports.lock().push(report.clone());
    }
}

/// 按脚本依次返回结果的事件源；脚本耗尽后一直返回空页。
#[derive(Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<Result<EventPage, FetchError>>>,
    cursors: Mutex<Vec<StreamCursor>>,
    times: Mutex<Vec<Instant>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<EventPage, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cursors(&self) -> Vec<StreamCursor> {
        self.cursors.lock().clone()
    }

    /// 相邻两次拉取之间的间隔（整秒）。
    pub fn gaps_secs(&self) -> Vec<u64> {
        self.times
            .lock()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn fetch_page(
        &self,
        cursor: &StreamCursor,
        _event_types: &EventTypes,
    ) -> Result<EventPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().push(*cursor);
        self.times.lock().push(Instant::now());
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(EventPage::default()))
    }
}

/// 内存配置存储：可随时替换快照，并记录每次进度写入。
#[derive(Default)]
pub(crate) struct MemoryStore {
    snapshot: Mutex<Option<ConfigurationSnapshot>>,
    saved: Mutex<Vec<Progress>>,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn with(snapshot: ConfigurationSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    pub fn replace(&self, snapshot: ConfigurationSnapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    pub fn saved(&self) -> Vec<Progress> {
        self.saved.lock().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_by_id(&self, entity_id: i64) -> Result<Option<ConfigurationSnapshot>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .snapshot
            .lock()
            .clone()
            .filter(|snapshot| snapshot.entity_id == entity_id))
    }

    async fn save_progress(&self, entity_id: i64, progress: &Progress) -> Result<(), StoreError> {
        let mut guard = self.snapshot.lock();
        let Some(snapshot) = guard.as_mut().filter(|s| s.entity_id == entity_id) else {
            return Err(StoreError::Persist {
                entity_id,
                detail: "no such configuration".into(),
            });
        };
        snapshot.apply_progress(progress);
        self.saved.lock().push(*progress);
        Ok(())
    }
}

/// 把引用原样当作凭据。
pub(crate) struct LiteralSecrets;

impl SecretResolver for LiteralSecrets {
    fn resolve(&self, reference: &str) -> Result<Credential, SecretError> {
        if reference.is_empty() {
            return Err(SecretError::Empty {
                reference: reference.to_owned(),
            });
        }
        Ok(Credential::new(reference))
    }
}

pub(crate) fn snapshot() -> ConfigurationSnapshot {
    ConfigurationSnapshot {
        entity_id: 1,
        entity_name: "acme".into(),
        api_domain: "api.lookout.com".into(),
        api_key: "key-1".into(),
        event_types: EventTypes::default(),
        proxy: None,
        target: DeliveryTarget {
            host: "127.0.0.1".into(),
            port: 514,
            protocol: TransportProtocol::Tcp,
        },
        delivery_mode: DeliveryMode::Splunk,
        leef_version: LeefVersion::V2,
        log_identifier: None,
        start_time: None,
        stream_position: 0,
        fetch_count: 0,
        fetched_at: None,
    }
}
