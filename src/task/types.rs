/*!
 * 任务跟踪相关的类型定义
 *
 * 与后端 JSON 协议保持 camelCase 一致。任务状态单向流转：
 * PENDING -> PROCESSING -> COMPLETED / FAILED，终态后不再变化。
 */

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务状态（后端枚举）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// 是否已到达终态（终态后不会再发起任何查询）
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

/// 任务类型，决定提交端点、状态端点与进度步骤表
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Video,
    Webpage,
    Ocr,
}

/// 任务详情（后端每次状态查询都返回完整结构，包括 PENDING/PROCESSING 阶段）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// 结果载荷，仅终态 COMPLETED 时有意义，内容对本库不透明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// 仅 status == FAILED 时存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskDetail {
    /// 构造刚提交、尚未被后端查询过的占位任务
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            url: None,
            video_title: None,
            video_description: None,
            video_duration: None,
            file_name: None,
            file_size: None,
            result_json: None,
            transcription_text: None,
            summary: None,
            error_message: None,
            created_at: Some(Utc::now()),
            updated_at: None,
            completed_at: None,
        }
    }

    /// 置为失败终态。completedAt 只在首次进入终态时写入一次。
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Some(Utc::now());
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }
}

/// 任务创建响应（提交网关的返回值）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(alias = "linkType")]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 任务列表分页响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    pub tasks: Vec<TaskDetail>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

/// 链接处理请求（视频转写 / 网页摘要，具体类型由后端分析决定）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkProcessRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl LinkProcessRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            language: None,
            custom_prompt: None,
        }
    }
}

/// OCR 管线选择开关，对本库不透明，原样透传给后端
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OcrOptions {
    pub use_pypdf2: bool,
    pub use_docling: bool,
    pub use_gemini: bool,
    pub use_vision_ocr: bool,
    pub force_ocr: bool,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_model: Option<String>,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            use_pypdf2: true,
            use_docling: true,
            use_gemini: true,
            use_vision_ocr: false,
            force_ocr: false,
            language: "auto".to_string(),
            gemini_model: None,
        }
    }
}

/// OCR 上传请求，文件字节对本库不透明，以 multipart 透传
#[derive(Debug, Clone)]
pub struct OcrUploadRequest {
    pub file_name: String,
    pub content: Bytes,
    pub options: OcrOptions,
}

impl OcrUploadRequest {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            options: OcrOptions::default(),
        }
    }
}

/// 提交网关接受的任务请求
#[derive(Debug, Clone)]
pub enum TaskRequest {
    Link(LinkProcessRequest),
    OcrUpload(OcrUploadRequest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_names_and_terminal() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        let status: TaskStatus = serde_json::from_str("\"PROCESSING\"").unwrap();
        assert_eq!(status, TaskStatus::Processing);

        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_mark_failed_sets_completed_at_once() {
        let mut task = TaskDetail::pending("t-1");
        task.mark_failed("第一次失败");
        let first = task.completed_at;
        assert!(first.is_some());
        assert_eq!(task.status, TaskStatus::Failed);

        // 终态之后 completedAt 不再变化
        task.mark_failed("第二次失败");
        assert_eq!(task.completed_at, first);
    }

    #[test]
    fn test_task_created_accepts_link_type_alias() {
        let created: TaskCreated = serde_json::from_str(
            r#"{"taskId":"t-9","status":"PENDING","linkType":"VIDEO"}"#,
        )
        .unwrap();
        assert_eq!(created.kind, TaskKind::Video);
    }
}
