/*!
 * 任务跟踪错误处理
 *
 * 传输层可重试错误不会作为异常逃出轮询器（由错误预算消化），
 * 取消与业务 FAILED 也不是错误：前者是 PollOutcome::Cancelled，
 * 后者是 TaskDetail 的正常终态返回值。
 */

use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;
pub type TrackResult<T> = Result<T, TrackError>;

/// 后端传输层错误（每次状态查询可能发生，计入错误预算）
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("后端返回错误状态 {code}: {message}")]
    Status { code: u16, message: String },

    #[error("响应解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("无效的服务地址: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

impl ApiError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        ApiError::Status {
            code,
            message: message.into(),
        }
    }
}

/// 跟踪层错误
#[derive(Debug, Error)]
pub enum TrackError {
    /// 任务创建本身失败，未产生任务 ID，也不会启动轮询会话
    #[error("任务创建失败: {0}")]
    Submission(#[source] ApiError),

    /// 轮询次数预算耗尽仍未到达终态
    #[error("任务轮询超时: {task_id}")]
    PollTimeout { task_id: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}
