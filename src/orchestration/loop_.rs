//! Step Loop：规划 → 解析 → 执行 → 核对，直到成功或步数耗尽
//!
//! 严格串行：上一步的所有副作用完成后才开始下一步。命令失败只记入历史并推进步数，
//! 由下一步的规划器看到失败后重新决策；只有位姿读取失败会立即终止任务。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::{TaskError, TaskEvent, TaskPhase, TaskReport};
use crate::orchestration::{Coordinator, NoopMetrics, ObserverCommand, StepMetrics};
use crate::world::{Agent, LocationCatalog, WorldState};

/// 最大步数
pub const MAX_STEPS: usize = 30;

/// 循环参数
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_steps: usize,
    pub observer_start: String,
    pub carrier_start: String,
    pub home_location: String,
    pub step_pause: Duration,
    pub failure_pause: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_steps: MAX_STEPS,
            observer_start: "kitchen".to_string(),
            carrier_start: "entrance".to_string(),
            home_location: "entrance".to_string(),
            step_pause: Duration::from_millis(500),
            failure_pause: Duration::from_secs(1),
        }
    }
}

/// 一次任务运行所需的全部协作者
pub struct TaskRunner<'a> {
    coordinator: &'a Coordinator,
    catalog: Arc<LocationCatalog>,
    settings: LoopSettings,
    event_tx: Option<&'a UnboundedSender<TaskEvent>>,
}

fn send_event(tx: &Option<&UnboundedSender<TaskEvent>>, ev: TaskEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

impl<'a> TaskRunner<'a> {
    pub fn new(coordinator: &'a Coordinator, catalog: Arc<LocationCatalog>, settings: LoopSettings) -> Self {
        Self {
            coordinator,
            catalog,
            settings,
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<TaskEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 不计量运行
    pub async fn run(&self) -> TaskReport {
        self.run_with_metrics(&mut NoopMetrics).await
    }

    pub async fn run_with_metrics(&self, metrics: &mut dyn StepMetrics) -> TaskReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("task", run_id = %run_id);
        self.run_inner(metrics).instrument(span).await
    }

    async fn run_inner(&self, metrics: &mut dyn StepMetrics) -> TaskReport {
        let settings = &self.settings;
        let coordinator = self.coordinator;
        let zone = coordinator.settings().obstacle_zone.clone();
        let mut world = WorldState::new(
            settings.observer_start.as_str(),
            settings.carrier_start.as_str(),
            self.catalog.clone(),
        );

        tracing::info!(max_steps = settings.max_steps, "task started");
        metrics.task_started(coordinator.usage());

        let phase = loop {
            if world.step >= settings.max_steps {
                tracing::warn!(max_steps = settings.max_steps, "step limit reached without completing the task");
                break TaskPhase::FailedMaxSteps;
            }
            let step = world.step;
            send_event(
                &self.event_tx,
                TaskEvent::StepStarted {
                    step,
                    max_steps: settings.max_steps,
                },
            );
            metrics.step_started(step, coordinator.usage());

            match coordinator.driver().pose().await {
                Ok(pose) => world.carrier_pose = Some(pose),
                Err(e) => {
                    let err = TaskError::PoseUnavailable(e);
                    tracing::error!(step, error = %err, "aborting task");
                    break TaskPhase::FailedException;
                }
            }
            tracing::info!(step, "world state:\n{}", world);

            let proposal = coordinator.propose(&world).await;
            send_event(
                &self.event_tx,
                TaskEvent::Proposal {
                    step,
                    text: proposal.clone(),
                },
            );
            world.record(Agent::Observer, proposal.as_str());

            let command = ObserverCommand::parse(&proposal);
            let dispatch = coordinator.execute(&command, &mut world).await;
            if let Some(reply) = dispatch.carrier_reply.clone() {
                send_event(&self.event_tx, TaskEvent::CarrierReply { step, text: reply });
            }
            world.reconcile(&zone);

            if !dispatch.succeeded {
                let message = format!("Action '{}' failed; replanning.", proposal);
                tracing::warn!(step, "{}", message);
                world.record(Agent::System, message);
            }
            metrics.step_finished(step, dispatch.succeeded, coordinator.usage());
            send_event(
                &self.event_tx,
                TaskEvent::StepFinished {
                    step,
                    succeeded: dispatch.succeeded,
                    world: world.clone(),
                },
            );

            if !dispatch.succeeded {
                world.step += 1;
                tokio::time::sleep(settings.failure_pause).await;
                continue;
            }

            if world.goal_reached(command == ObserverCommand::SpeakAtGoal) {
                tracing::info!(step, "task complete");
                coordinator.cleanup(&settings.home_location, &mut world).await;
                world.reconcile(&zone);
                break TaskPhase::Succeeded;
            }

            world.step += 1;
            tokio::time::sleep(settings.step_pause).await;
        };

        tracing::info!(phase = ?phase, steps = world.step, "task finished");
        metrics.task_finished(phase, coordinator.usage());
        send_event(&self.event_tx, TaskEvent::Finished { phase });
        TaskReport { phase, world }
    }
}
