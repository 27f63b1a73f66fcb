//! 错误类型：设备层与任务层
//!
//! 设备调用（驱动 / 感知 / 语音）统一返回 DeviceError；Docking / Motion 层将其降级为 bool，
//! 只有位姿查询失败等致命错误才以 TaskError 的形式终止整次任务。

use thiserror::Error;

/// 外部设备（搬运机器人驱动、障碍物感知、语音输出）调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Device timeout: {0}")]
    Timeout(String),

    /// 目录中没有该地点（或没有对应的驱动 ID）
    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    /// 世界状态里没有可前往的障碍物坐标
    #[error("No obstacle recorded in world state")]
    MissingObstacle,
}

/// 任务运行期间的错误；PoseUnavailable 为致命错误，其余发生在启动阶段
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Carrier pose unavailable: {0}")]
    PoseUnavailable(#[source] DeviceError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Prompt error: {0}")]
    Prompt(String),
}
