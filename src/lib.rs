//! Tandem - 观察者 / 搬运机器人双智能体任务编排
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、任务阶段与事件、按配置组装的任务入口
//! - **world**: 世界状态与地点目录
//! - **prompt**: JSON prompt 模板与渲染
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Scripted）
//! - **devices**: 搬运机器人驱动、障碍物感知、语音输出（HTTP / 远程命令 / 模拟）
//! - **orchestration**: 相关性过滤、对接、移动、命令解析、双规划器协调、Step Loop
//! - **observability**: 日志初始化

pub mod config;
pub mod core;
pub mod devices;
pub mod llm;
pub mod observability;
pub mod orchestration;
pub mod prompt;
pub mod world;

pub use crate::core::{TaskOutcome, TaskPhase, TaskReport};
