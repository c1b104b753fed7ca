//! 按事件类型派生类别（`cat`）。
//!
//! # 教案式注释
//!
//! ## 契约 (What)
//! - 默认：类别取类型相关的默认字段（v1 `details.type`，v2 `change_type`）；
//! - THREAT：类别取分类序列的首元素；
//! - DEVICE：激活状态处于 {DELETED, DEACTIVATED, PENDING} 时类别即激活状态；否则若存在
//!   安全状态，类别为 `激活状态_安全状态`（v1 还要求 `updatedDetails` 中列出
//!   `activationStatus`，缺失时回落默认类别）；否则回落默认类别；
//! - AUDIT（仅 v2）：类别取 `audit.type`；
//! - 所选分支的源字段缺失时回落默认规则；默认字段也缺失时类别为空串，且不产出 `cat` 属性。
//!
//! ## 逻辑 (How)
//! - 每个分支只产出一条前置规则，类别值由同一条规则求值得到，保证报文头中的类别与
//!   `cat` 属性一致。

use mra_core::{Event, EventKind};
use serde_json::Value;

use crate::CATEGORY_ATTRIBUTE;
use crate::rule::{JOIN_UNDERSCORE, MappingRule};

/// 激活状态的终态集合，命中时类别不再组合安全状态。
pub const TERMINAL_ACTIVATION_STATES: [&str; 3] = ["DELETED", "DEACTIVATED", "PENDING"];

/// 单一代格式下类别派生所需的字段路径。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryPaths {
    pub default_field: &'static str,
    pub threat_classification: &'static str,
    pub activation_status: &'static str,
    pub security_status: &'static str,
    /// 组合激活/安全状态前必须出现的标记：（列表路径，列表中的条目）。
    pub combine_marker: Option<(&'static str, &'static str)>,
    pub audit_type: Option<&'static str>,
}

pub const MRA_V1_PATHS: CategoryPaths = CategoryPaths {
    default_field: "details.type",
    threat_classification: "details.classifications.0",
    activation_status: "details.activationStatus",
    security_status: "details.securityStatus",
    combine_marker: Some(("updatedDetails", "activationStatus")),
    audit_type: None,
};

pub const MRA_V2_PATHS: CategoryPaths = CategoryPaths {
    default_field: "change_type",
    threat_classification: "threat.classifications.0",
    activation_status: "device.status.activation_status",
    security_status: "device.status.security_status",
    combine_marker: None,
    audit_type: Some("audit.type"),
};

/// 派生结果：类别值与需前置到目录之前的规则。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub value: String,
    pub rules: Vec<MappingRule>,
}

/// 针对一条事件派生类别；从不失败。
pub fn derive(paths: &CategoryPaths, event: &Event) -> Category {
    let preferred = match event.kind() {
        Some(EventKind::Threat) => Some(MappingRule::copy(
            paths.threat_classification,
            CATEGORY_ATTRIBUTE,
        )),
        Some(EventKind::Device) => device_rule(paths, event),
        Some(EventKind::Audit) => paths
            .audit_type
            .map(|path| MappingRule::copy(path, CATEGORY_ATTRIBUTE)),
        Some(EventKind::Other(_)) | None => None,
    };
    let fallback = MappingRule::copy(paths.default_field, CATEGORY_ATTRIBUTE);

    for rule in preferred.into_iter().chain([fallback]) {
        if let Some(value) = rule.evaluate(event) {
            return Category {
                value: value.into_owned(),
                rules: vec![rule],
            };
        }
    }
    Category {
        value: String::new(),
        rules: Vec::new(),
    }
}

fn device_rule(paths: &CategoryPaths, event: &Event) -> Option<MappingRule> {
    let activation = event.lookup_str(paths.activation_status)?;
    if TERMINAL_ACTIVATION_STATES.contains(&activation.as_ref()) {
        return Some(MappingRule::copy(
            paths.activation_status,
            CATEGORY_ATTRIBUTE,
        ));
    }
    if !event.contains(paths.security_status) {
        return None;
    }
    if let Some((list_path, entry)) = paths.combine_marker
        && !marker_present(event, list_path, entry)
    {
        return None;
    }
    Some(MappingRule::combine(
        paths.activation_status,
        paths.security_status,
        CATEGORY_ATTRIBUTE,
        JOIN_UNDERSCORE,
    ))
}

/// 标记可能以字段名列表或以对象键的形式出现。
fn marker_present(event: &Event, list_path: &str, entry: &str) -> bool {
    match event.lookup(list_path) {
        Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(entry)),
        Some(Value::Object(map)) => map.contains_key(entry),
        _ => false,
    }
}
