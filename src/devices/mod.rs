//! 外部设备：搬运机器人驱动、障碍物感知、观察者语音
//!
//! 编排层只依赖这里的 trait；具体实现（HTTP 桥接 / 远程脚本 / 模拟器）在启动时按配置注入。

pub mod driver;
pub mod http;
pub mod perception;
pub mod remote;
pub mod sim;
pub mod speech;

pub use driver::CarrierDriver;
pub use http::HttpCarrierDriver;
pub use perception::{
    parse_scan_output, ObstacleReport, ObstacleScan, ObstacleSensor, RemoteObstacleSensor,
    NO_OBSTACLE_SENTINEL,
};
pub use remote::{shell_quote, CommandOutput, RemoteCommand};
pub use sim::{DriverCall, DriverOp, RecordingSpeech, ScriptedSensor, SimulatedCarrier};
pub use speech::{RemoteSpeech, SilentSpeech, SpeechOutput};
