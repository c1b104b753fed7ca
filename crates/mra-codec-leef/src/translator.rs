use std::fmt::Write as _;

use chrono::{Local, NaiveDateTime};
use mra_core::{Event, EventFormatter, LeefVersion, TranslateError};

use crate::catalog::{MRA_V1_CATALOG, MRA_V2_CATALOG};
use crate::category::{self, CategoryPaths, MRA_V1_PATHS, MRA_V2_PATHS};
use crate::record::TranslatedRecord;
use crate::rule::MappingRule;

/// 报文头时间戳格式（本地时间，形如 `Mar 07 14:03:59`）。
pub const TIMESTAMP_FORMAT: &str = "%b %d %H:%M:%S";

/// 日志源标识字段，缺失时整条事件被丢弃。
pub const LOG_SOURCE_FIELD: &str = "qradarLogSourceIdentifier";

const VENDOR: &str = "Lookout";

/// 一代 LEEF 格式的完整描述：报文头模板 + 类别路径 + 静态目录。
#[derive(Debug)]
pub struct Schema {
    pub leef_version: &'static str,
    pub product: &'static str,
    pub product_version: &'static str,
    pub formatter_name: &'static str,
    pub category_paths: CategoryPaths,
    pub catalog: &'static [MappingRule],
}

static SCHEMA_V1: Schema = Schema {
    leef_version: "1.0",
    product: "SIEM Client",
    product_version: "0.2",
    formatter_name: "leef-1.0",
    category_paths: MRA_V1_PATHS,
    catalog: MRA_V1_CATALOG,
};

static SCHEMA_V2: Schema = Schema {
    leef_version: "2.0",
    product: "MRAv2 Client",
    product_version: "2.0",
    formatter_name: "leef-2.0",
    category_paths: MRA_V2_PATHS,
    catalog: MRA_V2_CATALOG,
};

impl Schema {
    pub fn for_version(version: LeefVersion) -> &'static Schema {
        match version {
            LeefVersion::V1 => &SCHEMA_V1,
            LeefVersion::V2 => &SCHEMA_V2,
        }
    }
}

/// LEEF 事件翻译器。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - 构造时选定格式代际，此后无状态，可在多个任务间共享；
/// - [`LeefTranslator::format`] 使用当前本地时间；[`LeefTranslator::format_at`] 接收显式时间，
///   便于测试得到确定输出；
/// - 事件缺少 `type` 或 [`LOG_SOURCE_FIELD`] 时返回 [`TranslateError::MissingField`]，
///   其余字段缺失均静默跳过。
///
/// ## 逻辑 (How)
/// 1. 校验强制字段；
/// 2. 调用 [`category::derive`] 得到类别值与前置规则；
/// 3. 依序应用 `[类别规则] + [静态目录]` 得到 [`TranslatedRecord`]；
/// 4. 拼接报文头与制表符分隔的属性段；报文头中来自事件的字段（日志源、类型、类别）
///    同样清洗换行并转义 `|`。
#[derive(Clone, Copy, Debug)]
pub struct LeefTranslator {
    schema: &'static Schema,
}

impl LeefTranslator {
    pub fn new(version: LeefVersion) -> Self {
        Self {
            schema: Schema::for_version(version),
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// 生成映射后的属性表与类别值，不含报文头。
    pub fn translate(&self, event: &Event) -> (String, TranslatedRecord) {
        let category = category::derive(&self.schema.category_paths, event);
        let record = TranslatedRecord::from_rules(
            category.rules.iter().chain(self.schema.catalog),
            event,
        );
        (category.value, record)
    }

    pub fn format_at(
        &self,
        event: &Event,
        timestamp: &NaiveDateTime,
    ) -> Result<String, TranslateError> {
        let event_type = event
            .event_type()
            .ok_or(TranslateError::MissingField { field: "type" })?;
        let log_source = event
            .lookup_str(LOG_SOURCE_FIELD)
            .ok_or(TranslateError::MissingField {
                field: LOG_SOURCE_FIELD,
            })?;

        let (category, record) = self.translate(event);

        let mut line = String::with_capacity(256);
        // 写入 String 不会失败。
        let _ = write!(line, "{} ", timestamp.format(TIMESTAMP_FORMAT));
        push_header_field(&mut line, &log_source);
        let _ = write!(
            line,
            " LEEF:{}|{}|{}|{}|",
            self.schema.leef_version, VENDOR, self.schema.product, self.schema.product_version,
        );
        push_header_field(&mut line, event_type);
        line.push(',');
        push_header_field(&mut line, &category);
        line.push('|');
        record.write_attributes(&mut line);
        Ok(line)
    }
}

/// 写入来自事件的报文头字段。
///
/// 换行与制表符替换为空格，避免一条事件在换行分帧的通道上被拆成多条记录；
/// `|` 按 LEEF 约定转义为 `\|`。
fn push_header_field(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\t' | '\r' | '\n' => out.push(' '),
            '|' => out.push_str("\\|"),
            other => out.push(other),
        }
    }
}

impl EventFormatter for LeefTranslator {
    fn format(&self, event: &Event) -> Result<String, TranslateError> {
        self.format_at(event, &Local::now().naive_local())
    }

    fn name(&self) -> &'static str {
        self.schema.formatter_name
    }
}
