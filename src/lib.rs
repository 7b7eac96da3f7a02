/*!
 * tasktrack - AI 处理任务的客户端跟踪库
 *
 * 负责向后端提交长耗时处理任务（网页摘要、视频转写、OCR 识别），
 * 并以固定间隔轮询任务状态直到终态。核心由三部分组成：
 * - 提交网关：创建任务并拿到任务 ID（tracker::start_tracking 的前半段）
 * - 轮询器：单会话顺序查询，支持协作式取消、错误预算与次数预算（poller）
 * - 状态调和器：唯一的"当前任务"槽位，按任务 ID 丢弃过期会话的更新（tracker）
 */

pub mod config;
pub mod task;
pub mod utils;

pub use config::{ClientConfig, PollSettings};
pub use task::api::{HttpTaskApi, TaskApi};
pub use task::error::{ApiError, ApiResult, TrackError, TrackResult};
pub use task::poller::{poll_until_terminal, PollConfig, PollOutcome, ProgressCallback};
pub use task::progress::{ProcessingProgress, ProgressStatus};
pub use task::tracker::{NotificationListener, ProgressListener, TaskNotification, TaskTracker};
pub use task::types::{
    LinkProcessRequest, OcrOptions, OcrUploadRequest, TaskCreated, TaskDetail, TaskKind, TaskPage,
    TaskRequest, TaskStatus,
};
