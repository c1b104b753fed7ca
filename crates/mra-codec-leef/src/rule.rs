use std::borrow::Cow;
use std::fmt;

use mra_core::Event;

/// 具名的二元组合函数。
///
/// 规则目录保持数据化：组合逻辑以函数指针 + 名称表示，而不是内嵌闭包，
/// 因此规则可以 `const` 声明、比较并单独测试。
#[derive(Clone, Copy)]
pub struct Combiner {
    pub name: &'static str,
    pub func: fn(&str, &str) -> String,
}

impl Combiner {
    pub fn apply(&self, left: &str, right: &str) -> String {
        (self.func)(left, right)
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Combiner").field(&self.name).finish()
    }
}

impl PartialEq for Combiner {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Combiner {}

fn join_underscore(left: &str, right: &str) -> String {
    let mut joined = String::with_capacity(left.len() + right.len() + 1);
    joined.push_str(left);
    joined.push('_');
    joined.push_str(right);
    joined
}

/// `left + "_" + right`，用于 DEVICE 事件的激活状态与安全状态组合。
pub const JOIN_UNDERSCORE: Combiner = Combiner {
    name: "join_underscore",
    func: join_underscore,
};

/// 规则的输入来源。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleSource {
    /// 复制单一路径的值。
    Path(&'static str),
    /// 两条路径同时存在时，经组合函数合成一个值。
    Combined {
        left: &'static str,
        right: &'static str,
        combiner: Combiner,
    },
}

/// 一条映射规则：一个或两个源路径 → 一个目标属性。
///
/// # 契约 (What)
/// - 任一源路径缺失时规则不产出属性，也不报错；
/// - 规则按顺序应用，后出现的规则可覆盖先前同名属性。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappingRule {
    pub source: RuleSource,
    pub target: &'static str,
}

impl MappingRule {
    pub const fn copy(path: &'static str, target: &'static str) -> Self {
        Self {
            source: RuleSource::Path(path),
            target,
        }
    }

    pub const fn combine(
        left: &'static str,
        right: &'static str,
        target: &'static str,
        combiner: Combiner,
    ) -> Self {
        Self {
            source: RuleSource::Combined {
                left,
                right,
                combiner,
            },
            target,
        }
    }

    /// 针对一条事件求值。
    pub fn evaluate<'e>(&self, event: &'e Event) -> Option<Cow<'e, str>> {
        match self.source {
            RuleSource::Path(path) => event.lookup_str(path),
            RuleSource::Combined {
                left,
                right,
                combiner,
            } => {
                let left = event.lookup_str(left)?;
                let right = event.lookup_str(right)?;
                Some(Cow::Owned(combiner.apply(&left, &right)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device_event() -> Event {
        Event::from_value(json!({
            "device": { "status": { "activation_status": "ACTIVATED", "security_status": "THREATS_HIGH" } }
        }))
        .expect("object")
    }

    #[test]
    fn copy_rule_reads_single_path() {
        let rule = MappingRule::copy("device.status.activation_status", "activationStatus");
        assert_eq!(rule.evaluate(&device_event()).as_deref(), Some("ACTIVATED"));
    }

    #[test]
    fn combined_rule_requires_both_inputs() {
        let rule = MappingRule::combine(
            "device.status.activation_status",
            "device.status.security_status",
            "cat",
            JOIN_UNDERSCORE,
        );
        assert_eq!(
            rule.evaluate(&device_event()).as_deref(),
            Some("ACTIVATED_THREATS_HIGH")
        );

        let partial = Event::from_value(json!({
            "device": { "status": { "activation_status": "ACTIVATED" } }
        }))
        .expect("object");
        assert_eq!(rule.evaluate(&partial), None);
    }

    #[test]
    fn combiners_compare_by_name() {
        assert_eq!(JOIN_UNDERSCORE, JOIN_UNDERSCORE);
        assert_eq!(format!("{JOIN_UNDERSCORE:?}"), "Combiner(\"join_underscore\")");
    }
}
