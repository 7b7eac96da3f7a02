// 日志系统模块

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
/// 支持通过 RUST_LOG 环境变量控制日志级别，默认为 info
pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("日志系统初始化失败")
}
