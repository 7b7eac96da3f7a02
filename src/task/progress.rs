/*!
 * 处理进度推导
 *
 * 每种任务类型对应一张固定的步骤表，进度完全由任务状态推导，
 * 步骤载荷对轮询器不透明，只供展示层消费。
 */

use serde::Serialize;

use crate::task::types::{TaskDetail, TaskKind, TaskStatus};

/// 处理步骤定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStep {
    pub name: &'static str,
    pub description: &'static str,
}

const VIDEO_STEPS: &[ProcessingStep] = &[
    ProcessingStep { name: "analyze", description: "分析链接类型" },
    ProcessingStep { name: "download", description: "下载视频和提取元数据" },
    ProcessingStep { name: "transcribe", description: "语音转写处理" },
    ProcessingStep { name: "summarize", description: "AI总结生成" },
];

const WEBPAGE_STEPS: &[ProcessingStep] = &[
    ProcessingStep { name: "analyze", description: "分析链接类型" },
    ProcessingStep { name: "extract", description: "提取网页内容" },
    ProcessingStep { name: "summarize", description: "AI摘要生成" },
];

const OCR_STEPS: &[ProcessingStep] = &[
    ProcessingStep { name: "upload", description: "上传文件" },
    ProcessingStep { name: "recognize", description: "文字识别处理" },
    ProcessingStep { name: "assemble", description: "整理识别结果" },
];

/// 进度展示状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Active,
    Success,
    Error,
    Wait,
}

/// 供展示层消费的进度载荷
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingProgress {
    pub current_step: u32,
    pub total_steps: u32,
    pub step_name: String,
    pub step_description: String,
    pub percentage: u8,
    pub status: ProgressStatus,
}

pub fn steps_for(kind: TaskKind) -> &'static [ProcessingStep] {
    match kind {
        TaskKind::Video => VIDEO_STEPS,
        TaskKind::Webpage => WEBPAGE_STEPS,
        TaskKind::Ocr => OCR_STEPS,
    }
}

fn build(kind: TaskKind, current_step: u32, step_name: &str, description: &str, status: ProgressStatus) -> ProcessingProgress {
    let steps = steps_for(kind);
    let total_steps = steps.len() as u32;
    let percentage = if total_steps == 0 {
        0
    } else {
        ((current_step * 100) / total_steps).min(100) as u8
    };
    ProcessingProgress {
        current_step,
        total_steps,
        step_name: step_name.to_string(),
        step_description: description.to_string(),
        percentage,
        status,
    }
}

/// 任务刚提交时的初始进度（0%，第一个步骤）
pub fn initial_progress(kind: TaskKind) -> ProcessingProgress {
    let first = steps_for(kind)[0];
    build(kind, 0, first.name, "开始处理...", ProgressStatus::Active)
}

/// 由任务状态推导展示进度
pub fn progress_from_task(kind: TaskKind, task: &TaskDetail) -> ProcessingProgress {
    let steps = steps_for(kind);
    match task.status {
        TaskStatus::Pending => {
            let first = steps[0];
            build(kind, 0, first.name, "等待处理...", ProgressStatus::Wait)
        }
        TaskStatus::Processing => {
            // 后端不细分内部阶段，统一视为第二步进行中
            let step = steps[1.min(steps.len() - 1)];
            build(kind, 1, step.name, step.description, ProgressStatus::Active)
        }
        TaskStatus::Completed => build(
            kind,
            steps.len() as u32,
            "completed",
            "处理完成",
            ProgressStatus::Success,
        ),
        TaskStatus::Failed => {
            let message = task.error_message.as_deref().unwrap_or("处理失败");
            build(kind, 0, "error", message, ProgressStatus::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_progress_is_zero_percent() {
        let progress = initial_progress(TaskKind::Video);
        assert_eq!(progress.percentage, 0);
        assert_eq!(progress.current_step, 0);
        assert_eq!(progress.total_steps, 4);
        assert_eq!(progress.step_name, "analyze");
        assert_eq!(progress.status, ProgressStatus::Active);
    }

    #[test]
    fn test_progress_follows_task_status() {
        let mut task = TaskDetail::pending("t-1");

        let pending = progress_from_task(TaskKind::Webpage, &task);
        assert_eq!(pending.status, ProgressStatus::Wait);
        assert_eq!(pending.percentage, 0);

        task.status = TaskStatus::Processing;
        let processing = progress_from_task(TaskKind::Webpage, &task);
        assert_eq!(processing.step_name, "extract");
        assert_eq!(processing.current_step, 1);
        assert_eq!(processing.percentage, 33);

        task.status = TaskStatus::Completed;
        let completed = progress_from_task(TaskKind::Webpage, &task);
        assert_eq!(completed.percentage, 100);
        assert_eq!(completed.status, ProgressStatus::Success);
    }

    #[test]
    fn test_failed_task_carries_error_message() {
        let mut task = TaskDetail::pending("t-2");
        task.mark_failed("识别服务不可用");
        let progress = progress_from_task(TaskKind::Ocr, &task);
        assert_eq!(progress.status, ProgressStatus::Error);
        assert_eq!(progress.step_description, "识别服务不可用");
        assert_eq!(progress.percentage, 0);
    }
}
