use std::time::Duration;

/// 退避下限：任何一次成功抓取后等待时间复位到该值。
pub const BACKOFF_FLOOR: Duration = Duration::from_secs(15);
/// 退避上限：连续失败时等待时间翻倍但不超过该值。
pub const BACKOFF_CEILING: Duration = Duration::from_secs(600);

/// Stream Supervisor 使用的指数退避状态。
///
/// # 教案式说明
/// - **契约（What）**：
///   - [`Backoff::next_delay`] 返回本次应等待的时长，并把下一次的等待翻倍；
///   - [`Backoff::reset`] 在成功抓取后调用，等待时长回到下限；
///   - **后置条件**：任意时刻 `current()` 都位于 `[floor, ceiling]` 闭区间内。
/// - **实现（How）**：使用饱和乘法翻倍后夹紧到上限，避免极端配置下的溢出。
/// - **注意事项（Trade-offs）**：未引入抖动；单实例 Supervisor 不存在集体重试的“惊群”问题。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
}

impl Backoff {
    /// 使用 15 秒 / 600 秒的默认边界构造。
    pub fn new() -> Self {
        Self::with_bounds(BACKOFF_FLOOR, BACKOFF_CEILING)
    }

    /// 自定义边界；`ceiling` 小于 `floor` 时以 `floor` 为准。
    pub fn with_bounds(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            current: floor,
            floor,
            ceiling,
        }
    }

    /// 下一次失败后将要等待的时长。
    pub fn current(&self) -> Duration {
        self.current
    }

    /// 取出本次等待时长，并将下一次翻倍（封顶）。
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.ceiling)
            .clamp(self.floor, self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
