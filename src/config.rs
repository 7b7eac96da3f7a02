/*!
 * 客户端配置
 *
 * 所有字段带默认值，可从 JSON 反序列化；轮询参数按任务类型区分：
 * 链接处理沿用 60 次 / 5 秒，OCR 沿用 3 秒间隔的较快节奏。
 */

use std::time::Duration;

use serde::Deserialize;

use crate::task::poller::PollConfig;

/// 单类任务的轮询设置
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub error_budget: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_ms: 5000,
            error_budget: 3,
        }
    }
}

impl PollSettings {
    pub fn to_poll_config(self) -> PollConfig {
        PollConfig {
            max_attempts: self.max_attempts,
            interval: Duration::from_millis(self.interval_ms),
            error_budget: self.error_budget,
        }
    }
}

fn default_ocr_poll() -> PollSettings {
    PollSettings {
        max_attempts: 100,
        interval_ms: 3000,
        error_budget: 3,
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 客户端整体配置
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub link_poll: PollSettings,
    #[serde(default = "default_ocr_poll")]
    pub ocr_poll: PollSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bearer_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            link_poll: PollSettings::default(),
            ocr_poll: default_ocr_poll(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_per_kind_cadence() {
        let config = ClientConfig::default();
        assert_eq!(config.link_poll.interval_ms, 5000);
        assert_eq!(config.link_poll.max_attempts, 60);
        assert_eq!(config.ocr_poll.interval_ms, 3000);
        assert_eq!(config.ocr_poll.error_budget, 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"baseUrl":"https://api.example.com","linkPoll":{"maxAttempts":10}}"#)
                .unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.link_poll.max_attempts, 10);
        // 未给出的字段回落到默认值
        assert_eq!(config.link_poll.interval_ms, 5000);
        assert_eq!(config.ocr_poll.interval_ms, 3000);
        assert_eq!(config.request_timeout_secs, 30);
    }
}
