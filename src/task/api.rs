/*!
 * 任务后端 API 客户端
 *
 * TaskApi 是轮询器与调和器依赖的唯一传输层接口；HttpTaskApi 是
 * 基于 reqwest 的默认实现。后端按管线划分路由命名空间，因此
 * 状态查询需要携带任务类型来选择端点。
 */

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::task::error::{ApiError, ApiResult};
use crate::task::types::{
    OcrUploadRequest, TaskCreated, TaskDetail, TaskKind, TaskPage, TaskRequest, TaskStatus,
};

/// 传输层接口，每个方法以非 2xx 响应返回可区分的错误
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// 创建任务，成功时返回任务 ID 与初始状态
    async fn create_task(&self, request: &TaskRequest) -> ApiResult<TaskCreated>;

    /// 查询任务状态，任意阶段都返回完整的任务结构
    async fn get_task_status(&self, task_id: &str, kind: TaskKind) -> ApiResult<TaskDetail>;

    async fn delete_task(&self, task_id: &str) -> ApiResult<()>;

    async fn list_tasks(&self, page: u32, size: u32) -> ApiResult<TaskPage>;
}

/// OCR 上传/状态响应的线格式与统一任务结构字段不同，单独映射
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrTaskResponse {
    task_id: String,
    status: TaskStatus,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<OcrTaskResponse> for TaskDetail {
    fn from(response: OcrTaskResponse) -> Self {
        let failed = response.status == TaskStatus::Failed;
        let mut task = TaskDetail::pending(response.task_id);
        task.status = response.status;
        task.file_name = response.file_name;
        task.file_size = response.file_size;
        task.result_json = response
            .result
            .as_ref()
            .and_then(|value| serde_json::to_string(value).ok());
        task.error_message = if failed { response.message } else { None };
        task.created_at = response.created_at;
        task.completed_at = response.completed_at;
        task
    }
}

/// 基于 reqwest 的后端客户端
pub struct HttpTaskApi {
    base_url: Url,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: Url::parse(base_url)?,
            bearer_token: None,
            client,
        })
    }

    /// 设置随每个请求注入的 Bearer 凭证
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn parse_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), message));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn expect_success(&self, response: reqwest::Response) -> ApiResult<()> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), message));
        }
        Ok(())
    }

    fn ocr_form(request: &OcrUploadRequest) -> multipart::Form {
        let options = &request.options;
        let part = multipart::Part::bytes(request.content.to_vec())
            .file_name(request.file_name.clone());
        let mut form = multipart::Form::new()
            .part("file", part)
            .text("usePypdf2", options.use_pypdf2.to_string())
            .text("useDocling", options.use_docling.to_string())
            .text("useGemini", options.use_gemini.to_string())
            .text("useVisionOcr", options.use_vision_ocr.to_string())
            .text("forceOcr", options.force_ocr.to_string())
            .text("language", options.language.clone());
        if let Some(model) = &options.gemini_model {
            form = form.text("geminiModel", model.clone());
        }
        form
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn create_task(&self, request: &TaskRequest) -> ApiResult<TaskCreated> {
        match request {
            TaskRequest::Link(link) => {
                debug!("创建链接处理任务: {}", link.url);
                let url = self.endpoint("/api/link-processing/process")?;
                let response = self
                    .request(reqwest::Method::POST, url)
                    .json(link)
                    .send()
                    .await?;
                self.parse_json(response).await
            }
            TaskRequest::OcrUpload(upload) => {
                debug!("上传 OCR 文件: {}", upload.file_name);
                let url = self.endpoint("/api/ocr/upload")?;
                let response = self
                    .request(reqwest::Method::POST, url)
                    .multipart(Self::ocr_form(upload))
                    .send()
                    .await?;
                let ocr: OcrTaskResponse = self.parse_json(response).await?;
                Ok(TaskCreated {
                    task_id: ocr.task_id,
                    status: ocr.status,
                    kind: TaskKind::Ocr,
                    message: ocr.message,
                })
            }
        }
    }

    async fn get_task_status(&self, task_id: &str, kind: TaskKind) -> ApiResult<TaskDetail> {
        match kind {
            TaskKind::Video | TaskKind::Webpage => {
                let url = self.endpoint(&format!("/api/link-processing/task/{}", task_id))?;
                let response = self.request(reqwest::Method::GET, url).send().await?;
                self.parse_json(response).await
            }
            TaskKind::Ocr => {
                let url = self.endpoint(&format!("/api/ocr/tasks/{}/status", task_id))?;
                let response = self.request(reqwest::Method::GET, url).send().await?;
                let ocr: OcrTaskResponse = self.parse_json(response).await?;
                Ok(ocr.into())
            }
        }
    }

    async fn delete_task(&self, task_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&format!("/api/link-processing/task/{}", task_id))?;
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        self.expect_success(response).await
    }

    async fn list_tasks(&self, page: u32, size: u32) -> ApiResult<TaskPage> {
        let url = self.endpoint("/api/link-processing/tasks")?;
        let response = self
            .request(reqwest::Method::GET, url)
            .query(&[("page", page), ("size", size)])
            .send()
            .await?;
        self.parse_json(response).await
    }
}
