/*!
 * 任务状态轮询器
 *
 * 把原本按任务类型各写一份的轮询逻辑统一为一个可配置组件：
 * 固定间隔顺序查询，直到终态、取消、错误预算或次数预算耗尽。
 * 单个会话内查询严格串行，进度回调按查询完成顺序投递。
 */

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::task::api::TaskApi;
use crate::task::error::{TrackError, TrackResult};
use crate::task::types::{TaskDetail, TaskKind};

/// 轮询参数
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// 次数预算：最多发出多少次状态查询
    pub max_attempts: u32,
    /// 查询间隔，固定不退避
    pub interval: Duration,
    /// 错误预算：允许的最大连续传输层失败次数，成功一次即清零
    pub error_budget: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(5),
            error_budget: 3,
        }
    }
}

/// 非超时路径的轮询结果。取消是预期内的提前退出，不是错误。
#[derive(Debug)]
pub enum PollOutcome {
    Finished(TaskDetail),
    Cancelled,
}

pub type ProgressCallback = Arc<dyn Fn(&TaskDetail) + Send + Sync>;

/// 轮询任务状态直到终态
///
/// 取消信号在三处生效：发起查询前、网络往返结束后、间隔休眠期间。
/// 取消后不再发出任何查询，也不再投递任何进度回调。
/// 错误预算耗尽时合成失败终态返回（保留最近一次任务快照），
/// 不作为异常抛出；只有次数预算耗尽会返回 PollTimeout。
pub async fn poll_until_terminal(
    api: Arc<dyn TaskApi>,
    task_id: &str,
    kind: TaskKind,
    config: &PollConfig,
    on_progress: Option<ProgressCallback>,
    cancel: &CancellationToken,
) -> TrackResult<PollOutcome> {
    let mut attempts: u32 = 0;
    let mut consecutive_errors: u32 = 0;
    let mut last_seen: Option<TaskDetail> = None;

    loop {
        if cancel.is_cancelled() {
            debug!("轮询会话已取消，不再发起查询: {}", task_id);
            return Ok(PollOutcome::Cancelled);
        }

        match api.get_task_status(task_id, kind).await {
            Ok(task) => {
                // 网络往返期间可能已被取消，取消后不对外投递任何更新
                if cancel.is_cancelled() {
                    return Ok(PollOutcome::Cancelled);
                }
                consecutive_errors = 0;
                notify_progress(&on_progress, &task);
                if task.status.is_terminal() {
                    debug!("任务 {} 到达终态: {}", task_id, task.status.as_str());
                    return Ok(PollOutcome::Finished(task));
                }
                last_seen = Some(task);
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    return Ok(PollOutcome::Cancelled);
                }
                consecutive_errors += 1;
                warn!(
                    "查询任务 {} 状态失败（连续第 {} 次）: {}",
                    task_id, consecutive_errors, err
                );
                if consecutive_errors >= config.error_budget {
                    return Ok(PollOutcome::Finished(synthesize_failed(
                        task_id,
                        config.error_budget,
                        last_seen.take(),
                    )));
                }
            }
        }

        attempts += 1;
        if attempts >= config.max_attempts {
            return Err(TrackError::PollTimeout {
                task_id: task_id.to_string(),
            });
        }

        // 休眠本身可被取消中断，而不是休眠结束后才检查
        tokio::select! {
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

/// 进度回调的故障隔离：回调崩溃只记录日志，不中断轮询循环
fn notify_progress(on_progress: &Option<ProgressCallback>, task: &TaskDetail) {
    if let Some(callback) = on_progress {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(task))) {
            warn!("任务 {} 的进度回调执行失败，继续轮询: {:?}", task.task_id, panic);
        }
    }
}

/// 错误预算耗尽时合成失败终态，优先保留最近一次成功查询的快照
fn synthesize_failed(task_id: &str, budget: u32, last_seen: Option<TaskDetail>) -> TaskDetail {
    let mut task = last_seen.unwrap_or_else(|| TaskDetail::pending(task_id));
    task.mark_failed(format!("连续 {} 次查询任务状态失败，已停止轮询", budget));
    task
}
