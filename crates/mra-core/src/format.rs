use crate::error::TranslateError;
use crate::event::Event;

/// 将一条事件转换为一行线上文本的格式化器。
///
/// # 契约 (What)
/// - 纯函数语义：同一事件在同一时刻得到同一行文本，不持有可变状态；
/// - 返回值不含行尾换行符，由传输层负责分帧；
/// - 仅在强制字段缺失时返回 [`TranslateError`]，调用方据此丢弃单条事件。
pub trait EventFormatter: Send + Sync + 'static {
    fn format(&self, event: &Event) -> Result<String, TranslateError>;

    /// 用于日志字段的格式名称，例如 `leef-2.0`。
    fn name(&self) -> &'static str;
}
