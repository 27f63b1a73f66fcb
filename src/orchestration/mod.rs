//! 编排层：相关性过滤、对接、移动、命令解析、双规划器协调与 Step Loop

pub mod coordinator;
pub mod docking;
pub mod interpreter;
pub mod loop_;
pub mod metrics;
pub mod motion;
pub mod planner;
pub mod relevance;

pub use coordinator::{Coordinator, CoordinatorSettings, Devices, Dispatch, DEFAULT_ARRIVAL_MESSAGE};
pub use docking::{DockingController, ShelfIds};
pub use interpreter::{is_speak_at_goal, CarrierCommand, ObserverCommand};
pub use loop_::{LoopSettings, TaskRunner, MAX_STEPS};
pub use metrics::{NoopMetrics, RunSummary, StepMetrics, StepRecord, TimingMetrics, UsageSnapshot};
pub use motion::{approach_pose, Motion, DEFAULT_APPROACH_DISTANCE};
pub use planner::{Planner, FALLBACK_ACTION};
pub use relevance::{ObstacleFilter, Relevance, DEFAULT_RELEVANCE_THRESHOLD};
