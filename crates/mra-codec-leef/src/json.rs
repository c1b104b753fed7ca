use mra_core::{Event, EventFormatter, TranslateError};

/// Splunk 投递模式：整条（已补齐字段的）事件序列化为一行紧凑 JSON。
///
/// 只要求存在 `type` 字段；`serde_json` 的紧凑输出会转义控制字符，因此结果不含换行。
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLineFormatter;

impl JsonLineFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl EventFormatter for JsonLineFormatter {
    fn format(&self, event: &Event) -> Result<String, TranslateError> {
        if event.event_type().is_none() {
            return Err(TranslateError::MissingField { field: "type" });
        }
        serde_json::to_string(event.fields())
            .map_err(|err| TranslateError::Encode {
                detail: err.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
