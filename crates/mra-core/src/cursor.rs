use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// 事件流的续传坐标。
///
/// # 契约 (What)
/// - `Position`：远端单调递增的位置令牌，`0` 表示从头开始；
/// - `StartTime`：尚无位置时的起始时间；
/// - 二者互斥，任一时刻只有一个生效。一旦拿到带位置的分页，游标切换为 `Position`
///   且此后只前进不后退。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamCursor {
    Position(u64),
    StartTime(DateTime<Utc>),
}

impl StreamCursor {
    /// 当前位置令牌；起始时间模式下返回 `None`。
    pub fn position(&self) -> Option<u64> {
        match self {
            Self::Position(position) => Some(*position),
            Self::StartTime(_) => None,
        }
    }

    /// 推进到 `position`，返回游标是否发生变化。
    ///
    /// - 起始时间模式无条件切换为位置模式；
    /// - 位置模式只接受严格更大的令牌，回退或重复的令牌被忽略。
    pub fn advance_to(&mut self, position: u64) -> bool {
        match self {
            Self::StartTime(_) => {
                *self = Self::Position(position);
                true
            }
            Self::Position(current) if position > *current => {
                *current = position;
                true
            }
            Self::Position(_) => false,
        }
    }
}

impl fmt::Display for StreamCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(position) => write!(f, "position={position}"),
            Self::StartTime(start) => write!(
                f,
                "start_time={}",
                start.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}
