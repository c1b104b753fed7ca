use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mra_core::{Backoff, Classified, EventTypes, StreamCursor};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{EventPage, EventSource};
use crate::error::SupervisorError;
use crate::forwarder::{EventBatch, EventForwarder};

/// 超时后 `abort` 的任务在该时限内应已退出。
const ABORT_GRACE: Duration = Duration::from_secs(1);

/// Supervisor 生命周期状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    Starting,
    Polling,
    BackingOff,
    Draining,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Polling => "polling",
            Self::BackingOff => "backing_off",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        })
    }
}

/// 单个 Supervisor 实例的启动参数。
#[derive(Clone, Debug)]
pub struct SupervisorParams {
    pub entity_name: String,
    pub cursor: StreamCursor,
    pub event_types: EventTypes,
    /// 拉到空页后下一次拉取前的等待。
    pub idle_wait: Duration,
    pub backoff: Backoff,
}

/// 单实体事件流的拉取循环。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 以固定实体、固定目标与固定起始游标无限拉取事件页，并按页交给 [`EventForwarder`]；
/// - 配置变化时不修改运行中的实例，由 Reconciler 停止旧实例并创建新实例。
///
/// ## 状态机 (What)
/// - `Starting → Polling` 立即发生；
/// - `Polling`：拉取成功则投递、推进内存游标、复位退避；空页在 `Polling` 内等待 `idle_wait`；
/// - 拉取或投递出现可重试失败进入 `BackingOff`，等待当前退避后翻倍（15 秒至 600 秒）再回到
///   `Polling`；
/// - 每个循环边界检查取消信号：已开始的批次投递照常完成（期间状态即为 `Draining`），
///   不再发起新的拉取，随后进入 `Stopped`；
/// - 远端返回比当前更小的位置时游标不后退，通知中携带的也是推进后的位置；
/// - 认证类永久失败不重试，直接以 [`SupervisorError`] 结束本实例。
///
/// ## 注意事项 (Trade-offs)
/// - 投递失败时游标不前进，下一次从同一位置重拉，可能产生重复但不会丢失；
/// - 投递本身不响应取消，以保证完成通知与游标推进的一致性。
pub struct StreamSupervisor {
    source: Arc<dyn EventSource>,
    forwarder: EventForwarder,
    params: SupervisorParams,
    state: watch::Sender<SupervisorState>,
}

impl StreamSupervisor {
    pub fn new(
        source: Arc<dyn EventSource>,
        forwarder: EventForwarder,
        params: SupervisorParams,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self {
            source,
            forwarder,
            params,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// 在新任务中运行，取消令牌派生自 `parent`。
    pub fn spawn(self, parent: &CancellationToken) -> SupervisorHandle {
        let token = parent.child_token();
        let state = self.subscribe();
        let task = tokio::spawn(self.run(token.clone()));
        SupervisorHandle { token, state, task }
    }

    /// 运行直到取消或遇到永久失败；正常停止时返回最终游标。
    pub async fn run(self, shutdown: CancellationToken) -> Result<StreamCursor, SupervisorError> {
        let Self {
            source,
            forwarder,
            params,
            state,
        } = self;
        let SupervisorParams {
            entity_name,
            mut cursor,
            event_types,
            idle_wait,
            mut backoff,
        } = params;

        transition(&state, SupervisorState::Polling);
        tracing::info!(
            entity = %entity_name,
            cursor = %cursor,
            types = %event_types.to_query(),
            target = %forwarder.target(),
            formatter = forwarder.formatter_name(),
            "event stream started"
        );

        let outcome = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }

            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                fetched = source.fetch_page(&cursor, &event_types) => fetched,
            };

            let wait = match fetched {
                Ok(EventPage { events, position }) => {
                    let count = events.len();
                    // 通知携带推进后的游标位置，持久化位置与内存游标保持一致。
                    let mut next = cursor;
                    if let Some(position) = position {
                        next.advance_to(position);
                    }
                    let batch = EventBatch {
                        events,
                        position: next.position(),
                    };
                    let delivery = forwarder.deliver(batch, &entity_name);
                    tokio::pin!(delivery);
                    let delivered = tokio::select! {
                        biased;
                        delivered = &mut delivery => delivered,
                        _ = shutdown.cancelled() => {
                            transition(&state, SupervisorState::Draining);
                            tracing::info!(
                                entity = %entity_name,
                                events = count,
                                "shutdown requested, finishing in-flight batch"
                            );
                            delivery.await
                        }
                    };
                    match delivered {
                        Ok(report) => {
                            cursor = next;
                            backoff.reset();
                            tracing::debug!(
                                fetched = count,
                                delivered = report.delivered.len(),
                                skipped = report.skipped,
                                cursor = %cursor,
                                "batch delivered"
                            );
                            (count == 0).then_some(idle_wait)
                        }
                        Err(error) => {
                            let delay = backoff.next_delay();
                            tracing::warn!(
                                error.code = error.code(),
                                error = %error,
                                cursor = %cursor,
                                delay_secs = delay.as_secs(),
                                "batch delivery failed, backing off"
                            );
                            transition(&state, SupervisorState::BackingOff);
                            Some(delay)
                        }
                    }
                }
                Err(error) if error.is_transient() => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error.code = error.code(),
                        error = %error,
                        delay_secs = delay.as_secs(),
                        "event fetch failed, backing off"
                    );
                    transition(&state, SupervisorState::BackingOff);
                    Some(delay)
                }
                Err(error) => {
                    tracing::error!(
                        error.code = error.code(),
                        error = %error,
                        entity = %entity_name,
                        "event fetch failed permanently, stopping stream"
                    );
                    break Err(SupervisorError::from(error));
                }
            };

            if let Some(delay) = wait {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
                transition(&state, SupervisorState::Polling);
            }
        };

        if outcome.is_ok() {
            transition(&state, SupervisorState::Draining);
        }
        transition(&state, SupervisorState::Stopped);
        tracing::info!(entity = %entity_name, cursor = %cursor, "event stream stopped");
        outcome.map(|()| cursor)
    }
}

fn transition(state: &watch::Sender<SupervisorState>, next: SupervisorState) {
    let previous = state.send_replace(next);
    if previous != next {
        tracing::debug!(from = %previous, to = %next, "supervisor state changed");
    }
}

/// `SupervisorHandle::stop` 的结果。
#[derive(Debug)]
pub enum StopOutcome {
    /// 任务自行结束，附带其返回值。
    Finished(Result<StreamCursor, SupervisorError>),
    /// 任务 panic 或被外部取消。
    Failed(String),
    /// 等待超时，任务已被 `abort`。
    TimedOut,
}

/// 运行中 Supervisor 的控制句柄。
#[derive(Debug)]
pub struct SupervisorHandle {
    token: CancellationToken,
    state: watch::Receiver<SupervisorState>,
    task: JoinHandle<Result<StreamCursor, SupervisorError>>,
}

impl SupervisorHandle {
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 发出取消信号并至多等待 `timeout`；超时则 `abort` 任务并记录告警。
    pub async fn stop(self, timeout: Duration) -> StopOutcome {
        self.token.cancel();
        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => outcome_of(joined),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "supervisor did not stop in time, aborting"
                );
                task.abort();
                let _ = tokio::time::timeout(ABORT_GRACE, task).await;
                StopOutcome::TimedOut
            }
        }
    }

    /// 回收已经自行结束的任务。
    pub async fn join(self) -> StopOutcome {
        outcome_of(self.task.await)
    }
}

fn outcome_of(
    joined: Result<Result<StreamCursor, SupervisorError>, tokio::task::JoinError>,
) -> StopOutcome {
    match joined {
        Ok(result) => StopOutcome::Finished(result),
        Err(error) => StopOutcome::Failed(error.to_string()),
    }
}
