use std::sync::Arc;

use async_trait::async_trait;
use mra_core::{Classified, Event, EventFormatter, LogIdentifier};
use mra_transport_syslog::LineConnector;
use serde_json::Value;
use uuid::Uuid;

use crate::error::DeliveryError;

/// 每个批次通道的诊断名前缀，后接随机令牌。
pub const CLIENT_NAME_PREFIX: &str = "MRAv2SyslogClient";
/// `details.type` 缺失时补齐的值。
pub const UNKNOWN_DETAILS_TYPE: &str = "UNKNOWN";
/// 注入实体名的字段。
pub const ENTITY_NAME_FIELD: &str = "entName";

/// Supervisor 交给 Forwarder 的一页事件。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventBatch {
    pub events: Vec<Event>,
    /// 拉取该页后观察到的流位置，随完成通知原样回传。
    pub position: Option<u64>,
}

/// 一个批次完整送达后的通知内容。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliveryReport {
    /// 实际写出的事件（已补齐字段），不含被丢弃的事件。
    pub delivered: Vec<Event>,
    /// 因缺少必填字段而跳过的事件数。
    pub skipped: usize,
    pub position: Option<u64>,
}

/// 批次完成通知的接收方。
///
/// 每个批次恰好调用一次，且只在全部行写出之后调用。
#[async_trait]
pub trait CompletionHandler: Send + Sync + 'static {
    async fn on_batch_delivered(&self, report: &DeliveryReport);
}

/// 把一批事件补齐、格式化并写到下游控制台。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - 每条事件注入 `entName`，`details.type` 缺失时补 `UNKNOWN`，可选注入一对标识键值；
///   `details` 存在但不是对象时保持原样，不补 `details.type`；
/// - 格式化失败的单条事件被丢弃并记录告警，不影响同批其他事件；
/// - 每个批次新开一条通道，通道名为 `MRAv2SyslogClient-<uuid>`；
/// - 全部行写出并关闭通道后，触发一次 [`CompletionHandler::on_batch_delivered`]。
///
/// ## 逻辑 (How)
/// 1. 先在内存中完成补齐与格式化，得到待写出的行；
/// 2. 有行可写时才建连，逐行写出后 `close`；
/// 3. 任一 IO 失败即放弃整批并返回 [`DeliveryError`]，不触发通知，游标保持不动；
/// 4. 空批次不建连，但仍然通知，以便记录拉取时间。
pub struct EventForwarder {
    connector: Arc<dyn LineConnector>,
    formatter: Arc<dyn EventFormatter>,
    identifier: Option<LogIdentifier>,
    completion: Arc<dyn CompletionHandler>,
}

impl EventForwarder {
    pub fn new(
        connector: Arc<dyn LineConnector>,
        formatter: Arc<dyn EventFormatter>,
        identifier: Option<LogIdentifier>,
        completion: Arc<dyn CompletionHandler>,
    ) -> Self {
        Self {
            connector,
            formatter,
            identifier,
            completion,
        }
    }

    pub fn formatter_name(&self) -> &'static str {
        self.formatter.name()
    }

    pub fn target(&self) -> String {
        self.connector.describe()
    }

    pub async fn deliver(
        &self,
        batch: EventBatch,
        entity_name: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        let EventBatch { events, position } = batch;
        let total = events.len();
        let mut delivered = Vec::with_capacity(total);
        let mut lines = Vec::with_capacity(total);

        for event in events {
            let event = self.enrich(event, entity_name);
            match self.formatter.format(&event) {
                Ok(line) => {
                    lines.push(line);
                    delivered.push(event);
                }
                Err(error) => tracing::warn!(
                    error.code = error.code(),
                    error = %error,
                    event_type = event.event_type().unwrap_or("<missing>"),
                    "dropping event that cannot be formatted"
                ),
            }
        }

        if !lines.is_empty() {
            self.transmit(&lines).await?;
        }

        let report = DeliveryReport {
            skipped: total - delivered.len(),
            delivered,
            position,
        };
        self.completion.on_batch_delivered(&report).await;
        Ok(report)
    }

    async fn transmit(&self, lines: &[String]) -> Result<(), DeliveryError> {
        let client_name = format!("{CLIENT_NAME_PREFIX}-{}", Uuid::new_v4());
        let target = self.connector.describe();
        let mut sink = self
            .connector
            .open(client_name)
            .await
            .map_err(|source| DeliveryError::Connect {
                target: target.clone(),
                source,
            })?;
        tracing::debug!(client = sink.client_name(), target = %target, lines = lines.len(), "channel opened");

        for (index, line) in lines.iter().enumerate() {
            if let Err(source) = sink.send_line(line).await {
                return Err(DeliveryError::Transmit {
                    target,
                    index,
                    source,
                });
            }
        }
        sink.close()
            .await
            .map_err(|source| DeliveryError::Close { target, source })
    }

    fn enrich(&self, mut event: Event, entity_name: &str) -> Event {
        event.insert(ENTITY_NAME_FIELD, entity_name);
        match event.object_mut("details") {
            Some(details) => {
                let kind = details.entry("type").or_insert(Value::Null);
                if kind.is_null() {
                    *kind = Value::from(UNKNOWN_DETAILS_TYPE);
                }
            }
            None => tracing::debug!("`details` is not an object, leaving `details.type` unset"),
        }
        if let Some(identifier) = self.identifier.as_ref().filter(|id| !id.key.is_empty()) {
            event.insert(identifier.key.clone(), identifier.value.clone());
        }
        event
    }
}
