/*!
 * 任务跟踪状态管理
 *
 * 持有唯一的"当前任务"槽位：同一时刻至多一个轮询会话处于活跃状态。
 * 开始跟踪新任务会在同一把锁内先取消旧会话再换入新会话；过期会话
 * 迟到的更新按任务 ID 匹配丢弃（取消是协作式的，在途请求可能在
 * 新会话启动之后才返回）。槽位的检查与写入始终是同一个同步临界区。
 */

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::task::api::{HttpTaskApi, TaskApi};
use crate::task::error::{TrackError, TrackResult};
use crate::task::poller::{poll_until_terminal, PollConfig, PollOutcome, ProgressCallback};
use crate::task::progress::{self, ProcessingProgress};
use crate::task::types::{TaskDetail, TaskKind, TaskPage, TaskRequest, TaskStatus};

/// 终态通知：成功与失败走同一条通知路径，
/// 后端返回的 FAILED 与错误预算合成的失败不作区分。
#[derive(Debug, Clone, PartialEq)]
pub enum TaskNotification {
    Completed { task_id: String },
    Failed { task_id: String, message: String },
}

pub type ProgressListener = Arc<dyn Fn(&ProcessingProgress) + Send + Sync>;
pub type NotificationListener = Arc<dyn Fn(&TaskNotification) + Send + Sync>;

/// 一个活跃的轮询会话。取消信号是一次性的单调信号：
/// 用户显式取消与新会话取代复用同一机制。
struct ActiveSession {
    task_id: String,
    cancel: CancellationToken,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TrackerState {
    current: Option<TaskDetail>,
    progress: Option<ProcessingProgress>,
    error: Option<String>,
    session: Option<ActiveSession>,
    tasks: Vec<TaskDetail>,
    task_total: u64,
}

struct TrackerInner {
    api: Arc<dyn TaskApi>,
    link_poll: PollConfig,
    ocr_poll: PollConfig,
    state: Mutex<TrackerState>,
    progress_listeners: Mutex<Vec<ProgressListener>>,
    notification_listeners: Mutex<Vec<NotificationListener>>,
}

/// 任务跟踪器（提交网关 + 状态调和器）
#[derive(Clone)]
pub struct TaskTracker {
    inner: Arc<TrackerInner>,
}

impl TaskTracker {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self::with_poll_configs(api, PollConfig::default(), PollConfig::default())
    }

    /// 按任务类型分别配置轮询参数
    pub fn with_poll_configs(
        api: Arc<dyn TaskApi>,
        link_poll: PollConfig,
        ocr_poll: PollConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                api,
                link_poll,
                ocr_poll,
                state: Mutex::new(TrackerState::default()),
                progress_listeners: Mutex::new(Vec::new()),
                notification_listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 按配置构建基于 HTTP 传输的跟踪器
    pub fn from_config(config: &ClientConfig) -> TrackResult<Self> {
        let mut api = HttpTaskApi::new(&config.base_url, config.request_timeout())?;
        if let Some(token) = &config.bearer_token {
            api = api.with_bearer_token(token);
        }
        Ok(Self::with_poll_configs(
            Arc::new(api),
            config.link_poll.to_poll_config(),
            config.ocr_poll.to_poll_config(),
        ))
    }

    /// 注册进度监听器
    pub fn on_progress(&self, listener: ProgressListener) {
        self.inner.progress_listeners.lock().push(listener);
    }

    /// 注册终态通知监听器
    pub fn on_notification(&self, listener: NotificationListener) {
        self.inner.notification_listeners.lock().push(listener);
    }

    /// 提交任务并开始跟踪，返回新任务 ID
    ///
    /// 创建失败时不会启动任何轮询会话；创建成功后在同一把锁内
    /// 取消旧会话、写入 PENDING 占位任务并换入新会话。
    pub async fn start_tracking(&self, request: TaskRequest) -> TrackResult<String> {
        let created = self
            .inner
            .api
            .create_task(&request)
            .await
            .map_err(TrackError::Submission)?;
        let task_id = created.task_id.clone();
        let kind = created.kind;
        info!("任务 {} 已创建（类型 {:?}），开始轮询", task_id, kind);

        let cancel = CancellationToken::new();
        let initial = progress::initial_progress(kind);
        {
            let mut state = self.inner.state.lock();
            if let Some(old) = state.session.take() {
                debug!("取消被取代的轮询会话: {}", old.task_id);
                old.cancel.cancel();
            }
            state.current = Some(TaskDetail::pending(&task_id));
            state.progress = Some(initial.clone());
            state.error = None;
            let handle = self.inner.clone().spawn_session(
                task_id.clone(),
                kind,
                cancel.clone(),
            );
            state.session = Some(ActiveSession {
                task_id: task_id.clone(),
                cancel,
                handle,
            });
        }
        self.inner.emit_progress(&initial);
        Ok(task_id)
    }

    /// 同步取消活跃会话并清空当前任务槽位与错误状态，
    /// 调用返回后即可立刻再次 start_tracking，不会泄漏会话。
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        if let Some(session) = state.session.take() {
            debug!("重置跟踪器，取消会话: {}", session.task_id);
            session.cancel.cancel();
        }
        state.current = None;
        state.progress = None;
        state.error = None;
    }

    /// 当前任务快照
    pub fn current_task(&self) -> Option<TaskDetail> {
        self.inner.state.lock().current.clone()
    }

    pub fn current_progress(&self) -> Option<ProcessingProgress> {
        self.inner.state.lock().progress.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    /// 是否存在活跃的轮询会话
    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().session.is_some()
    }

    /// 当前任务是否尚未到达终态
    pub fn has_active_task(&self) -> bool {
        self.inner
            .state
            .lock()
            .current
            .as_ref()
            .map(|task| !task.status.is_terminal())
            .unwrap_or(false)
    }

    /// 已知任务列表快照（listing 展示用）
    pub fn task_list(&self) -> (Vec<TaskDetail>, u64) {
        let state = self.inner.state.lock();
        (state.tasks.clone(), state.task_total)
    }

    /// 拉取任务列表并缓存
    pub async fn load_task_list(&self, page: u32, size: u32) -> TrackResult<TaskPage> {
        let result = self.inner.api.list_tasks(page, size).await?;
        {
            let mut state = self.inner.state.lock();
            state.tasks = result.tasks.clone();
            state.task_total = result.total;
        }
        Ok(result)
    }

    /// 查询单个任务详情；命中当前任务时同步更新槽位（同样做 ID 守卫）
    pub async fn get_task_detail(&self, task_id: &str, kind: TaskKind) -> TrackResult<TaskDetail> {
        let task = self.inner.api.get_task_status(task_id, kind).await?;
        {
            let mut state = self.inner.state.lock();
            let matches = state
                .current
                .as_ref()
                .map(|current| current.task_id == task_id)
                .unwrap_or(false);
            if matches {
                state.progress = Some(progress::progress_from_task(kind, &task));
                state.current = Some(task.clone());
            }
        }
        Ok(task)
    }

    /// 删除任务；删除的是当前任务时先取消会话并清空槽位
    pub async fn delete_task(&self, task_id: &str) -> TrackResult<()> {
        self.inner.api.delete_task(task_id).await?;
        let mut state = self.inner.state.lock();
        let is_current = state
            .current
            .as_ref()
            .map(|current| current.task_id == task_id)
            .unwrap_or(false);
        if is_current {
            if let Some(session) = state.session.take() {
                session.cancel.cancel();
            }
            state.current = None;
            state.progress = None;
            state.error = None;
        }
        if let Some(index) = state.tasks.iter().position(|task| task.task_id == task_id) {
            state.tasks.remove(index);
            state.task_total = state.task_total.saturating_sub(1);
        }
        info!("任务已删除: {}", task_id);
        Ok(())
    }
}

impl TrackerInner {
    fn poll_config_for(&self, kind: TaskKind) -> PollConfig {
        match kind {
            TaskKind::Video | TaskKind::Webpage => self.link_poll,
            TaskKind::Ocr => self.ocr_poll,
        }
    }

    fn spawn_session(
        self: Arc<Self>,
        task_id: String,
        kind: TaskKind,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let config = self.poll_config_for(kind);
        tokio::spawn(async move {
            let callback: ProgressCallback = {
                let inner = Arc::clone(&self);
                let task_id = task_id.clone();
                Arc::new(move |task: &TaskDetail| inner.apply_progress(&task_id, kind, task))
            };
            let outcome = poll_until_terminal(
                Arc::clone(&self.api),
                &task_id,
                kind,
                &config,
                Some(callback),
                &cancel,
            )
            .await;
            match outcome {
                Ok(PollOutcome::Finished(task)) => self.apply_terminal(&task_id, kind, task),
                Ok(PollOutcome::Cancelled) => {
                    debug!("轮询会话已取消: {}", task_id);
                }
                Err(err) => self.apply_poll_failure(&task_id, kind, err),
            }
        })
    }

    fn session_matches(state: &TrackerState, task_id: &str) -> bool {
        state
            .session
            .as_ref()
            .map(|session| session.task_id == task_id)
            .unwrap_or(false)
    }

    /// 轮询进度落入槽位。ID 守卫与写入在同一临界区内完成，
    /// 被取代会话的迟到更新在这里被丢弃。
    fn apply_progress(&self, task_id: &str, kind: TaskKind, task: &TaskDetail) {
        // 终态快照由 apply_terminal 统一落位并对外投递一次
        if task.status.is_terminal() {
            return;
        }
        let progress = progress::progress_from_task(kind, task);
        {
            let mut state = self.state.lock();
            if !Self::session_matches(&state, task_id) {
                debug!("丢弃过期会话的任务更新: {}", task_id);
                return;
            }
            state.current = Some(task.clone());
            state.progress = Some(progress.clone());
        }
        self.emit_progress(&progress);
    }

    /// 终态落入槽位并解除会话，之后该任务不会再有任何查询
    fn apply_terminal(&self, task_id: &str, kind: TaskKind, task: TaskDetail) {
        let notification = match task.status {
            TaskStatus::Completed => TaskNotification::Completed {
                task_id: task.task_id.clone(),
            },
            TaskStatus::Failed => TaskNotification::Failed {
                task_id: task.task_id.clone(),
                message: task
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "处理失败".to_string()),
            },
            _ => {
                warn!("忽略非终态的终态回报: {}", task_id);
                return;
            }
        };
        let progress = progress::progress_from_task(kind, &task);
        {
            let mut state = self.state.lock();
            if !Self::session_matches(&state, task_id) {
                debug!("丢弃过期会话的终态更新: {}", task_id);
                return;
            }
            state.session = None;
            if task.status == TaskStatus::Failed {
                state.error = task.error_message.clone();
            }
            state.current = Some(task);
            state.progress = Some(progress.clone());
        }
        self.emit_progress(&progress);
        self.emit_notification(&notification);
    }

    /// 轮询以错误收场（目前只有次数预算耗尽的超时）。
    /// 槽位同样要进入失败终态，与预算合成失败、后端 FAILED 形状一致。
    fn apply_poll_failure(&self, task_id: &str, kind: TaskKind, err: TrackError) {
        let message = err.to_string();
        let progress = {
            let mut state = self.state.lock();
            if !Self::session_matches(&state, task_id) {
                return;
            }
            state.session = None;
            let mut task = state
                .current
                .take()
                .filter(|current| current.task_id == task_id)
                .unwrap_or_else(|| TaskDetail::pending(task_id));
            task.mark_failed(message.clone());
            let progress = progress::progress_from_task(kind, &task);
            state.error = Some(message.clone());
            state.current = Some(task);
            state.progress = Some(progress.clone());
            progress
        };
        warn!("任务 {} 轮询失败: {}", task_id, message);
        self.emit_progress(&progress);
        self.emit_notification(&TaskNotification::Failed {
            task_id: task_id.to_string(),
            message,
        });
    }

    fn emit_progress(&self, progress: &ProcessingProgress) {
        let listeners = self.progress_listeners.lock().clone();
        for listener in listeners.iter() {
            listener(progress);
        }
    }

    fn emit_notification(&self, notification: &TaskNotification) {
        let listeners = self.notification_listeners.lock().clone();
        for listener in listeners.iter() {
            listener(notification);
        }
    }
}
