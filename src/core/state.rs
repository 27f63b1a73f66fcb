//! 任务状态：阶段、最终结果与过程事件
//!
//! 对外契约只有 TaskOutcome { success }；TaskPhase 与 TaskEvent 用于日志、测试与可选的前端展示。

use serde::Serialize;

use crate::world::WorldState;

/// Step Loop 的终止阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Succeeded,
    FailedMaxSteps,
    FailedException,
}

/// 一次任务运行的对外结果
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub success: bool,
}

impl From<TaskPhase> for TaskOutcome {
    fn from(phase: TaskPhase) -> Self {
        Self {
            success: phase == TaskPhase::Succeeded,
        }
    }
}

/// 任务结束时的完整报告：阶段 + 最终世界状态（WorldState 随报告一起交还调用方后即丢弃）
#[derive(Debug)]
pub struct TaskReport {
    pub phase: TaskPhase,
    pub world: WorldState,
}

impl TaskReport {
    pub fn outcome(&self) -> TaskOutcome {
        self.phase.into()
    }
}

/// 单步过程事件（可序列化为 JSON 供前端或测试消费）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// 开始第 step 步
    StepStarted { step: usize, max_steps: usize },
    /// 观察者规划器给出的原始提议
    Proposal { step: usize, text: String },
    /// 搬运机器人规划器的回复（仅在委派时出现）
    CarrierReply { step: usize, text: String },
    /// 本步结束：是否成功 + 结束时的世界状态快照
    StepFinished {
        step: usize,
        succeeded: bool,
        world: WorldState,
    },
    /// 任务进入终止阶段
    Finished { phase: TaskPhase },
}
