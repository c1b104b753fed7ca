use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::StreamCursor;

/// Reconciler 持有的整份配置快照。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - 除 [`Progress`] 对应的三个字段外，其余字段均由外部拥有，核心只读；
/// - 快照总是整份复制后比较，[`ConfigurationSnapshot::same_parameters`] 判定运行参数是否
///   变化，进度字段不参与比较；
/// - `api_key` 保存的是凭据引用（例如 `env:MRA_API_KEY`），由 [`crate::SecretResolver`] 解析。
///
/// ## 注意事项
/// - `stream_position == 0` 表示尚无位置，续传时回落到 `start_time`；
/// - `start_time` 缺失且无位置时从位置 0 开始。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationSnapshot {
    pub entity_id: i64,
    pub entity_name: String,
    pub api_domain: String,
    pub api_key: String,
    pub event_types: EventTypes,
    pub proxy: Option<ProxySettings>,
    pub target: DeliveryTarget,
    pub delivery_mode: DeliveryMode,
    pub leef_version: LeefVersion,
    pub log_identifier: Option<LogIdentifier>,
    pub start_time: Option<DateTime<Utc>>,
    pub stream_position: u64,
    pub fetch_count: u64,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ConfigurationSnapshot {
    /// 依据持久化进度推导 Supervisor 的起始游标。
    pub fn start_cursor(&self) -> StreamCursor {
        if self.stream_position != 0 {
            return StreamCursor::Position(self.stream_position);
        }
        match self.start_time {
            Some(start) => StreamCursor::StartTime(start),
            None => StreamCursor::Position(0),
        }
    }

    /// 运行参数是否一致（忽略进度字段）。
    pub fn same_parameters(&self, other: &Self) -> bool {
        self.without_progress() == other.without_progress()
    }

    /// 投递完成路径唯一会修改的字段子集。
    pub fn progress(&self) -> Progress {
        Progress {
            stream_position: self.stream_position,
            fetch_count: self.fetch_count,
            fetched_at: self.fetched_at,
        }
    }

    pub fn apply_progress(&mut self, progress: &Progress) {
        self.stream_position = progress.stream_position;
        self.fetch_count = progress.fetch_count;
        self.fetched_at = progress.fetched_at;
    }

    fn without_progress(&self) -> Self {
        let mut copy = self.clone();
        copy.apply_progress(&Progress::default());
        copy
    }
}

/// 投递完成后持久化的进度三元组。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stream_position: u64,
    pub fetch_count: u64,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// 启用的事件类型集合。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypes {
    pub threat: bool,
    pub device: bool,
    pub audit: bool,
}

impl EventTypes {
    /// 远端过滤参数使用的类型名列表；全部关闭时回落到 THREAT + DEVICE。
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.threat {
            names.push("THREAT");
        }
        if self.device {
            names.push("DEVICE");
        }
        if self.audit {
            names.push("AUDIT");
        }
        if names.is_empty() {
            names.extend(["THREAT", "DEVICE"]);
        }
        names
    }

    /// 逗号分隔形式，例如 `THREAT,DEVICE`。
    pub fn to_query(&self) -> String {
        self.names().join(",")
    }
}

impl Default for EventTypes {
    fn default() -> Self {
        Self {
            threat: true,
            device: true,
            audit: false,
        }
    }
}

/// 出站代理设置。
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// 下游控制台的投递目标。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub host: String,
    pub port: u16,
    pub protocol: TransportProtocol,
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        })
    }
}

/// 投递模式：QRadar 接收 LEEF 行，Splunk 接收 JSON 行。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Qradar,
    Splunk,
}

/// LEEF 模式的两代不兼容格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeefVersion {
    /// LEEF 1.0，对应 MRA v1 事件载荷。
    #[serde(rename = "1.0")]
    V1,
    /// LEEF 2.0，对应 MRA v2 事件载荷。
    #[default]
    #[serde(rename = "2.0")]
    V2,
}

/// 注入每条事件的标识键值对，典型用法是 `qradarLogSourceIdentifier`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogIdentifier {
    pub key: String,
    pub value: String,
}

/// 已解析的凭据；`Debug` 输出不泄露明文。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            entity_id: 1,
            entity_name: "acme".into(),
            api_domain: "api.lookout.com".into(),
            api_key: "env:MRA_API_KEY".into(),
            event_types: EventTypes::default(),
            proxy: None,
            target: DeliveryTarget {
                host: "qradar.local".into(),
                port: 514,
                protocol: TransportProtocol::Tcp,
            },
            delivery_mode: DeliveryMode::Qradar,
            leef_version: LeefVersion::V2,
            log_identifier: None,
            start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            stream_position: 0,
            fetch_count: 0,
            fetched_at: None,
        }
    }

    #[test]
    fn start_cursor_prefers_persisted_position() {
        let mut config = snapshot();
        assert!(matches!(config.start_cursor(), StreamCursor::StartTime(_)));

        config.stream_position = 42;
        assert_eq!(config.start_cursor(), StreamCursor::Position(42));

        config.stream_position = 0;
        config.start_time = None;
        assert_eq!(config.start_cursor(), StreamCursor::Position(0));
    }

    #[test]
    fn progress_fields_do_not_count_as_parameter_changes() {
        let base = snapshot();
        let mut progressed = base.clone();
        progressed.apply_progress(&Progress {
            stream_position: 99,
            fetch_count: 10,
            fetched_at: Some(Utc::now()),
        });
        assert!(base.same_parameters(&progressed));

        let mut retargeted = base.clone();
        retargeted.target.port = 6514;
        assert!(!base.same_parameters(&retargeted));
    }

    #[test]
    fn event_type_query_falls_back_when_all_disabled() {
        let all_off = EventTypes {
            threat: false,
            device: false,
            audit: false,
        };
        assert_eq!(all_off.to_query(), "THREAT,DEVICE");
        let with_audit = EventTypes {
            audit: true,
            ..EventTypes::default()
        };
        assert_eq!(with_audit.to_query(), "THREAT,DEVICE,AUDIT");
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let proxy = ProxySettings {
            address: "http://proxy:3128".into(),
            username: Some("svc".into()),
            password: Some("hunter2".into()),
        };
        assert!(!format!("{proxy:?}").contains("hunter2"));
        assert_eq!(format!("{:?}", Credential::new("k")), "Credential(<redacted>)");
    }
}
