//! # settings 模块说明
//!
//! ## 角色定位
//! - 解析连接器的 TOML 配置文件，并转换为核心使用的 [`ConfigurationSnapshot`] 与
//!   [`ReconcilerSettings`]；
//! - 启动时用于快速失败（文件不可读、必填字段缺失），运行期由
//!   [`FileConfigStore`](crate::store::FileConfigStore) 每次检查时重新解析。
//!
//! ## 文件结构
//! ```toml
//! [lookout]
//! entity_name = "acme"
//! api_domain = "api.lookout.com"
//! api_key = "env:MRA_API_KEY"
//!
//! [syslog]
//! host = "qradar.example.com"
//! port = 514
//! forwarder_type = "qradar"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mra_core::{
    ConfigurationSnapshot, DeliveryMode, DeliveryTarget, EventTypes, LeefVersion, LogIdentifier,
    ProxySettings, TransportProtocol,
};
use serde::Deserialize;

use crate::error::SettingsError;
use crate::reconciler::ReconcilerSettings;

pub const DEFAULT_LOG_IDENTIFIER_KEY: &str = "qradarLogSourceIdentifier";
const STATE_FILE_SUFFIX: &str = "state.json";

/// 整份配置文件。
///
/// `start_time` 以带引号的 RFC 3339 字符串书写，例如 `"2024-05-01T00:00:00Z"`。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub lookout: LookoutSection,
    pub syslog: SyslogSection,
    #[serde(default)]
    pub proxy: Option<ProxySection>,
    #[serde(default)]
    pub runner: RunnerSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LookoutSection {
    #[serde(default = "default_entity_id")]
    pub entity_id: i64,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub api_domain: String,
    /// 明文或 `env:VAR` 形式的引用。
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "enabled")]
    pub threat_enabled: bool,
    #[serde(default = "enabled")]
    pub device_enabled: bool,
    #[serde(default)]
    pub audit_enabled: bool,
    #[serde(default)]
    pub stream_position: u64,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyslogSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub forwarder_type: DeliveryMode,
    #[serde(default)]
    pub transport: TransportProtocol,
    #[serde(default)]
    pub leef_version: LeefVersion,
    #[serde(default = "default_identifier_key")]
    pub log_identifier_key: String,
    /// 缺省为实体名。
    #[serde(default)]
    pub log_identifier: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProxySection {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    #[serde(default = "default_load_sleep")]
    pub config_load_sleep_secs: u64,
    #[serde(default = "default_check_sleep")]
    pub config_check_sleep_secs: u64,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
    #[serde(default = "default_idle_wait")]
    pub idle_wait_secs: u64,
    /// 缺省为配置文件旁的 `<config>.state.json`。
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            config_load_sleep_secs: default_load_sleep(),
            config_check_sleep_secs: default_check_sleep(),
            stop_timeout_secs: default_stop_timeout(),
            idle_wait_secs: default_idle_wait(),
            state_file: None,
        }
    }
}

fn default_entity_id() -> i64 {
    1
}

fn enabled() -> bool {
    true
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    514
}

fn default_identifier_key() -> String {
    DEFAULT_LOG_IDENTIFIER_KEY.into()
}

fn default_load_sleep() -> u64 {
    30
}

fn default_check_sleep() -> u64 {
    60
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_idle_wait() -> u64 {
    30
}

impl SettingsFile {
    /// 读取、解析并校验配置文件。
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::parse(&text, path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 解析文本；`origin` 只用于错误信息。
    pub fn parse(text: &str, origin: &Path) -> Result<Self, SettingsError> {
        toml::from_str(text).map_err(|err| SettingsError::Parse {
            path: origin.to_path_buf(),
            detail: err.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("lookout.entity_name", &self.lookout.entity_name),
            ("lookout.api_domain", &self.lookout.api_domain),
            ("lookout.api_key", &self.lookout.api_key),
            ("syslog.host", &self.syslog.host),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SettingsError::MissingField { field: *field });
        }
        if self.syslog.port == 0 {
            return Err(SettingsError::InvalidField {
                field: "syslog.port",
                detail: "port must be between 1 and 65535".into(),
            });
        }
        Ok(())
    }

    pub fn event_types(&self) -> EventTypes {
        EventTypes {
            threat: self.lookout.threat_enabled,
            device: self.lookout.device_enabled,
            audit: self.lookout.audit_enabled,
        }
    }

    /// 转换为 Reconciler 比较与使用的快照；进度字段取文件中的初始值。
    pub fn to_snapshot(&self) -> ConfigurationSnapshot {
        let lookout = &self.lookout;
        let syslog = &self.syslog;
        let proxy = self
            .proxy
            .as_ref()
            .filter(|proxy| !proxy.address.trim().is_empty())
            .map(|proxy| ProxySettings {
                address: proxy.address.trim().to_owned(),
                username: proxy.username.clone().filter(|name| !name.is_empty()),
                password: proxy.password.clone(),
            });
        let log_identifier = (!syslog.log_identifier_key.is_empty()).then(|| LogIdentifier {
            key: syslog.log_identifier_key.clone(),
            value: syslog
                .log_identifier
                .clone()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| lookout.entity_name.clone()),
        });

        ConfigurationSnapshot {
            entity_id: lookout.entity_id,
            entity_name: lookout.entity_name.clone(),
            api_domain: lookout.api_domain.clone(),
            api_key: lookout.api_key.clone(),
            event_types: self.event_types(),
            proxy,
            target: DeliveryTarget {
                host: syslog.host.clone(),
                port: syslog.port,
                protocol: syslog.transport,
            },
            delivery_mode: syslog.forwarder_type,
            leef_version: syslog.leef_version,
            log_identifier,
            start_time: lookout.start_time,
            stream_position: lookout.stream_position,
            fetch_count: 0,
            fetched_at: None,
        }
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        let runner = &self.runner;
        ReconcilerSettings {
            entity_id: self.lookout.entity_id,
            config_load_sleep: Duration::from_secs(runner.config_load_sleep_secs),
            config_check_sleep: Duration::from_secs(runner.config_check_sleep_secs),
            stop_timeout: Duration::from_secs(runner.stop_timeout_secs),
            idle_wait: Duration::from_secs(runner.idle_wait_secs),
        }
    }

    /// 进度状态文件路径；相对路径相对于配置文件所在目录。
    pub fn state_path(&self, config_path: &Path) -> PathBuf {
        match &self.runner.state_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_path
                .parent()
                .map_or_else(|| path.clone(), |dir| dir.join(path)),
            None => {
                let mut name = config_path
                    .file_name()
                    .map(|name| name.to_os_string())
                    .unwrap_or_else(|| "connector".into());
                name.push(".");
                name.push(STATE_FILE_SUFFIX);
                config_path.with_file_name(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[lookout]
entity_name = "acme"
api_domain = "api.lookout.com"
api_key = "env:MRA_API_KEY"

[syslog]
host = "qradar.local"
"#;

    fn parse(text: &str) -> SettingsFile {
        SettingsFile::parse(text, Path::new("connector.toml")).expect("parse settings")
    }

    #[test]
    fn defaults_follow_connector_conventions() {
        let settings = parse(MINIMAL);
        settings.validate().expect("valid");
        let snapshot = settings.to_snapshot();

        assert_eq!(snapshot.entity_id, 1);
        assert_eq!(snapshot.event_types, EventTypes::default());
        assert_eq!(snapshot.target.port, 514);
        assert_eq!(snapshot.target.protocol, TransportProtocol::Tcp);
        assert_eq!(snapshot.delivery_mode, DeliveryMode::Qradar);
        assert_eq!(snapshot.leef_version, LeefVersion::V2);
        assert_eq!(
            snapshot.log_identifier,
            Some(LogIdentifier {
                key: DEFAULT_LOG_IDENTIFIER_KEY.into(),
                value: "acme".into(),
            })
        );
        assert!(snapshot.proxy.is_none());
        assert_eq!(settings.reconciler_settings(), ReconcilerSettings::default());
    }

    #[test]
    fn full_file_maps_every_section() {
        let settings = parse(
            r#"
[lookout]
entity_id = 7
entity_name = "acme"
api_domain = "api.lookout.com"
api_key = "literal-key"
threat_enabled = false
audit_enabled = true
stream_position = 120
start_time = "2024-05-01T00:00:00Z"

[syslog]
host = "splunk.local"
port = 6514
forwarder_type = "splunk"
transport = "udp"
leef_version = "1.0"
log_identifier_key = "source"
log_identifier = "mra-prod"

[proxy]
address = "http://proxy.local:3128"
username = "svc"
password = "secret"

[runner]
config_load_sleep_secs = 5
config_check_sleep_secs = 15
idle_wait_secs = 2
"#,
        );
        let snapshot = settings.to_snapshot();
        assert_eq!(snapshot.entity_id, 7);
        assert_eq!(snapshot.event_types.to_query(), "DEVICE,AUDIT");
        assert_eq!(snapshot.stream_position, 120);
        assert!(snapshot.start_time.is_some());
        assert_eq!(snapshot.target.to_string(), "udp://splunk.local:6514");
        assert_eq!(snapshot.delivery_mode, DeliveryMode::Splunk);
        assert_eq!(snapshot.leef_version, LeefVersion::V1);
        assert_eq!(
            snapshot.log_identifier.as_ref().map(|id| id.value.as_str()),
            Some("mra-prod")
        );
        let proxy = snapshot.proxy.expect("proxy configured");
        assert_eq!(proxy.username.as_deref(), Some("svc"));

        let runner = settings.reconciler_settings();
        assert_eq!(runner.entity_id, 7);
        assert_eq!(runner.config_load_sleep, Duration::from_secs(5));
        assert_eq!(runner.stop_timeout, Duration::from_secs(10));
        assert_eq!(runner.idle_wait, Duration::from_secs(2));
    }

    #[test]
    fn empty_identifier_key_disables_injection() {
        let settings = parse(&MINIMAL.replace(
            "[syslog]\n",
            "[syslog]\nlog_identifier_key = \"\"\n",
        ));
        assert!(settings.to_snapshot().log_identifier.is_none());
    }

    #[test]
    fn missing_mandatory_field_is_reported_by_name() {
        let settings = parse(&MINIMAL.replace("api_domain = \"api.lookout.com\"\n", ""));
        match settings.validate() {
            Err(SettingsError::MissingField { field }) => assert_eq!(field, "lookout.api_domain"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_section_is_a_parse_error() {
        let error = SettingsFile::parse("[lookout]\nentity_name = \"a\"\n", Path::new("c.toml"))
            .expect_err("syslog section is required");
        assert!(matches!(error, SettingsError::Parse { .. }));
    }

    #[test]
    fn state_path_defaults_next_to_config() {
        let settings = parse(MINIMAL);
        assert_eq!(
            settings.state_path(Path::new("/etc/mra/connector.toml")),
            PathBuf::from("/etc/mra/connector.toml.state.json")
        );

        let mut relative = settings.clone();
        relative.runner.state_file = Some(PathBuf::from("progress.json"));
        assert_eq!(
            relative.state_path(Path::new("/etc/mra/connector.toml")),
            PathBuf::from("/etc/mra/progress.json")
        );
    }
}
