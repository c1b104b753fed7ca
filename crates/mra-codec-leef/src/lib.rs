#![doc = r#"
# mra-codec-leef

## 定位
- Event Translator：把一条 MRA 事件映射为一行 LEEF 文本，供 QRadar 通过 syslog 摄取；
- 同时提供 Splunk 投递模式使用的 JSON 行格式化器。

## 核心契约（What）
- [`LeefTranslator::format`]：纯函数，输入一条事件，输出一行不带换行符的 LEEF 文本；
- 两代格式互不兼容：LEEF 1.0（MRA v1 载荷）与 LEEF 2.0（MRA v2 载荷），各自拥有静态映射
  目录与报文头模板，构造时选定；
- 只有事件类型与日志源标识缺失属于致命错误，调用方丢弃该事件。

## 实现策略（How）
- 按事件类型分派派生类别（[`category`] 模块），得到类别值与前置规则；
- 前置规则 + 静态目录（[`catalog`] 模块）依序应用到事件上，缺失的源路径直接跳过；
- 报文头 `<时间> <日志源> LEEF:<版本>|Lookout|<产品>|<产品版本>|<类型>,<类别>|`，
  属性以制表符分隔。
"#]

pub mod catalog;
pub mod category;
mod json;
mod record;
mod rule;
mod translator;

pub use json::JsonLineFormatter;
pub use record::TranslatedRecord;
pub use rule::{Combiner, JOIN_UNDERSCORE, MappingRule, RuleSource};
pub use translator::{LOG_SOURCE_FIELD, LeefTranslator, Schema, TIMESTAMP_FORMAT};

/// LEEF 属性分隔符。
pub const LEEF_FIELD_SEPARATOR: char = '\t';

/// 承载类别的目标属性名。
pub const CATEGORY_ATTRIBUTE: &str = "cat";
