/*!
 * 任务跟踪模块
 *
 * 提交 -> 轮询 -> 状态调和的单向数据流，所有对外可见状态由 tracker 持有。
 */

pub mod api;
pub mod error;
pub mod poller;
pub mod progress;
pub mod tracker;
pub mod types;
