use mra_core::Event;

use crate::LEEF_FIELD_SEPARATOR;
use crate::rule::MappingRule;

/// 规则应用后的有序属性表。
///
/// 覆盖已有属性时保留其首次出现的位置，只替换值。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslatedRecord {
    attributes: Vec<(&'static str, String)>,
}

impl TranslatedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依序对事件应用规则。
    pub fn from_rules<'r>(rules: impl IntoIterator<Item = &'r MappingRule>, event: &Event) -> Self {
        let mut record = Self::new();
        for rule in rules {
            if let Some(value) = rule.evaluate(event) {
                record.set(rule.target, value.into_owned());
            }
        }
        record
    }

    pub fn set(&mut self, name: &'static str, value: String) {
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
    }

    /// 以 `key=value` 形式、制表符分隔写出属性段。
    ///
    /// 值中的制表符与换行会破坏分帧，统一替换为空格。
    pub fn write_attributes(&self, out: &mut String) {
        for (index, (key, value)) in self.attributes.iter().enumerate() {
            if index > 0 {
                out.push(LEEF_FIELD_SEPARATOR);
            }
            out.push_str(key);
            out.push('=');
            out.extend(value.chars().map(|ch| match ch {
                '\t' | '\r' | '\n' => ' ',
                other => other,
            }));
        }
    }
}
