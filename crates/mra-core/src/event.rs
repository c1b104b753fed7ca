use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 远端 MRA API 投递的一条事件。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - 内部为 JSON 对象（`serde_json::Map`），字段保持远端原样；
/// - 顶层通常包含 `type`（THREAT/DEVICE/AUDIT…）、变更类型以及按类型区分的嵌套详情；
/// - 通过 [`Event::lookup`] 以点分路径只读访问，数字段落索引数组，例如
///   `threat.classifications.0`。
///
/// ## 逻辑 (How)
/// - 路径查找逐段折叠：对象按键取值，数组按下标取值，其余节点或 `null` 视为缺失；
/// - 需要补齐字段（如 Forwarder 注入 `entName`）时，调用方先克隆再调用
///   [`Event::insert`]，原始事件保持不变。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// 以 JSON 对象构造事件。
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// 从任意 JSON 值构造事件；非对象返回 `None`。
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// 事件类型标签的原始字符串。
    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// 按类型标签分派后的枚举视图。
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type().map(EventKind::parse)
    }

    /// 按点分路径查找节点；缺失、类型不匹配或 `null` 均返回 `None`。
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let root = self.0.get(first)?;
        segments
            .try_fold(root, |node, segment| match node {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                _ => None,
            })
            .filter(|value| !value.is_null())
    }

    /// 查找并渲染为字符串，规则同 [`render_value`]。
    pub fn lookup_str(&self, path: &str) -> Option<Cow<'_, str>> {
        self.lookup(path).and_then(render_value)
    }

    /// 判断路径是否存在非空值。
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// 写入或覆盖一个顶层字段。
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// 取得顶层对象字段的可变引用；字段缺失时创建空对象，字段存在但不是对象时返回 `None`。
    pub fn object_mut(&mut self, key: &str) -> Option<&mut Map<String, Value>> {
        self.0
            .entry(key.to_owned())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
    }

    /// 只读访问全部字段。
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// 将 JSON 叶子节点渲染为线上属性值。
///
/// - 字符串原样输出；数字与布尔值使用 `Display`；
/// - 数组与对象输出紧凑 JSON；
/// - `null` 视为缺失，返回 `None`。
pub fn render_value(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(Cow::Borrowed(text.as_str())),
        Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        Value::Array(_) | Value::Object(_) => Some(Cow::Owned(value.to_string())),
    }
}

/// 事件类型标签的分派视图。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Threat,
    Device,
    Audit,
    /// 未识别的类型标签，保留原文以便写入报文头。
    Other(String),
}

impl EventKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "THREAT" => Self::Threat,
            "DEVICE" => Self::Device,
            "AUDIT" => Self::Audit,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Threat => "THREAT",
            Self::Device => "DEVICE",
            Self::Audit => "AUDIT",
            Self::Other(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Event {
        Event::from_value(json!({
            "type": "THREAT",
            "change_type": "CREATED",
            "threat": {
                "classifications": ["MALWARE", "TROJAN"],
                "severity": 7,
                "resolved": false,
                "note": null,
            },
        }))
        .expect("object")
    }

    #[test]
    fn lookup_walks_objects_and_array_indices() {
        let event = sample();
        assert_eq!(
            event.lookup_str("threat.classifications.0").as_deref(),
            Some("MALWARE")
        );
        assert_eq!(
            event.lookup_str("threat.classifications.1").as_deref(),
            Some("TROJAN")
        );
        assert!(event.lookup("threat.classifications.2").is_none());
        assert!(event.lookup("threat.classifications.first").is_none());
    }

    #[test]
    fn lookup_treats_null_and_scalar_descent_as_absent() {
        let event = sample();
        assert!(event.lookup("threat.note").is_none());
        assert!(event.lookup("change_type.inner").is_none());
        assert!(event.lookup("device.status").is_none());
        assert!(!event.contains(""));
    }

    #[test]
    fn render_value_formats_scalars_and_containers() {
        let event = sample();
        assert_eq!(event.lookup_str("threat.severity").as_deref(), Some("7"));
        assert_eq!(event.lookup_str("threat.resolved").as_deref(), Some("false"));
        assert_eq!(
            event.lookup_str("threat.classifications").as_deref(),
            Some(r#"["MALWARE","TROJAN"]"#)
        );
    }

    #[test]
    fn kind_dispatches_known_tags_and_keeps_unknown() {
        assert_eq!(sample().kind(), Some(EventKind::Threat));
        let other = Event::from_value(json!({ "type": "POLICY" })).expect("object");
        assert_eq!(other.kind(), Some(EventKind::Other("POLICY".into())));
        assert_eq!(Event::default().kind(), None);
        assert!(Event::from_value(json!(["not", "an", "object"])).is_none());
    }

    #[test]
    fn object_mut_creates_missing_and_rejects_scalars() {
        let mut event = sample();
        event
            .object_mut("details")
            .expect("created")
            .insert("type".into(), json!("UNKNOWN"));
        assert_eq!(event.lookup_str("details.type").as_deref(), Some("UNKNOWN"));
        assert!(event.object_mut("change_type").is_none());
    }
}
