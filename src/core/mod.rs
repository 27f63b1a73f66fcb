//! 核心层：错误类型、任务状态与按配置组装的任务入口

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::{DeviceError, TaskError};
pub use orchestrator::{create_devices, run_configured_task};
pub use state::{TaskEvent, TaskOutcome, TaskPhase, TaskReport};
