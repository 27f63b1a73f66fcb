//! 双规划器协调与命令分派
//!
//! 每步：观察者规划器必被调用一次；仅当提议无法直接执行时再调用搬运机器人规划器。
//! 观察者提议（SPEAK at 除外）会以分离任务转给语音输出，其结果不影响本步成败。

use std::sync::Arc;
use std::time::Duration;

use crate::devices::{CarrierDriver, ObstacleScan, ObstacleSensor, SpeechOutput};
use crate::orchestration::{
    is_speak_at_goal, CarrierCommand, DockingController, Motion, ObserverCommand, ObstacleFilter,
    Planner, Relevance, ShelfIds, DEFAULT_APPROACH_DISTANCE, DEFAULT_RELEVANCE_THRESHOLD,
};
use crate::world::{Agent, DockedWith, WorldState};

/// 到达目标时搬运机器人的播报
pub const DEFAULT_ARRIVAL_MESSAGE: &str = "We have arrived at the destination.";

/// 注入的外部设备；生命周期与一次任务运行一致
#[derive(Clone)]
pub struct Devices {
    pub driver: Arc<dyn CarrierDriver>,
    pub sensor: Arc<dyn ObstacleSensor>,
    pub speech: Arc<dyn SpeechOutput>,
}

/// 协调器参数（地名、货架、阈值与等待时长）
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub shelves: ShelfIds,
    pub obstacle_zone: String,
    pub at_obstacle: String,
    pub arrival_message: String,
    pub relevance_threshold: f64,
    pub approach_distance: f64,
    pub settle: Duration,
    pub wait: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            shelves: ShelfIds::default(),
            obstacle_zone: "obstacle_zone".to_string(),
            at_obstacle: "at_obstacle".to_string(),
            arrival_message: DEFAULT_ARRIVAL_MESSAGE.to_string(),
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            approach_distance: DEFAULT_APPROACH_DISTANCE,
            settle: Duration::from_secs(1),
            wait: Duration::from_secs(1),
        }
    }
}

/// 一次分派的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub succeeded: bool,
    /// 委派时搬运机器人规划器的原始回复
    pub carrier_reply: Option<String>,
}

impl Dispatch {
    fn direct(succeeded: bool) -> Self {
        Self {
            succeeded,
            carrier_reply: None,
        }
    }
}

pub struct Coordinator {
    observer: Planner,
    carrier: Planner,
    devices: Devices,
    docking: DockingController,
    motion: Motion,
    filter: ObstacleFilter,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        observer: Planner,
        carrier: Planner,
        devices: Devices,
        settings: CoordinatorSettings,
    ) -> Self {
        let docking = DockingController::new(
            devices.driver.clone(),
            settings.shelves.clone(),
            settings.settle,
        );
        let motion = Motion::new(
            devices.driver.clone(),
            settings.approach_distance,
            settings.settle,
        );
        let filter = ObstacleFilter::new(settings.relevance_threshold);
        Self {
            observer,
            carrier,
            devices,
            docking,
            motion,
            filter,
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn driver(&self) -> &Arc<dyn CarrierDriver> {
        &self.devices.driver
    }

    /// 累计 token 用量与请求数；两个规划器共用同一客户端时只计一次
    pub fn usage(&self) -> (u64, u64, u64, u64) {
        let observer = self.observer.llm();
        let carrier = self.carrier.llm();
        let (p, c, t) = observer.token_usage();
        let requests = observer.request_count();
        if Arc::ptr_eq(observer, carrier) {
            return (p, c, t, requests);
        }
        let (p2, c2, t2) = carrier.token_usage();
        (p + p2, c + c2, t + t2, requests + carrier.request_count())
    }

    /// 查询观察者规划器，并把提议转给语音输出（SPEAK at 除外）
    pub async fn propose(&self, world: &WorldState) -> String {
        let proposal = self.observer.propose(world, None).await;
        tracing::info!(step = world.step, proposal = %proposal, "observer proposal");

        if is_speak_at_goal(&proposal) {
            tracing::debug!("skipping speech relay for SPEAK action");
        } else {
            let speech = self.devices.speech.clone();
            let text = proposal.clone();
            tokio::spawn(async move {
                if let Err(e) = speech.speak(&text).await {
                    tracing::warn!(error = %e, "speech relay failed");
                }
            });
        }
        proposal
    }

    /// 执行观察者命令；Delegate 时查询搬运机器人规划器并执行其命令
    pub async fn execute(&self, command: &ObserverCommand, world: &mut WorldState) -> Dispatch {
        match command {
            ObserverCommand::CarryTo(location) => Dispatch::direct(self.carry_to(location, world).await),
            ObserverCommand::SummonTo(location) => {
                let ok = self.motion.move_to_location(location, world).await;
                if ok {
                    world.move_carrier(location.as_str());
                }
                Dispatch::direct(ok)
            }
            ObserverCommand::Undock => Dispatch::direct(self.docking.undock(world).await),
            ObserverCommand::SpeakAtGoal => {
                if let Err(e) = self.devices.driver.speak(&self.settings.arrival_message).await {
                    tracing::warn!(error = %e, "carrier speech failed");
                }
                Dispatch::direct(true)
            }
            ObserverCommand::Delegate(text) => {
                let reply = self.carrier.propose(world, Some(text)).await;
                let carrier_command = CarrierCommand::parse(&reply);
                tracing::info!(reply = %reply, command = %carrier_command, "carrier reply");
                world.record(Agent::Carrier, reply.as_str());
                let succeeded = self.execute_carrier(&carrier_command, world).await;
                Dispatch {
                    succeeded,
                    carrier_reply: Some(reply),
                }
            }
        }
    }

    async fn carry_to(&self, location: &str, world: &mut WorldState) -> bool {
        world.target_location = Some(location.to_string());

        if world.docked_with != DockedWith::Observer {
            tracing::info!("not docked with the observer yet, docking first");
            let shelf = self.settings.shelves.observer.clone();
            return self.docking.dock(&shelf, world).await;
        }

        tracing::info!(destination = location, "docked with observer, scanning for obstacles before moving");
        match self.devices.sensor.scan().await {
            ObstacleScan::Detected(report) => {
                tracing::info!(id = %report.id, "obstacle candidate detected");
                if self.filter.assess(&report, location, world) == Relevance::Relevant {
                    tracing::info!("relevant obstacle recorded, replanning before moving");
                    return true;
                }
                tracing::info!("obstacle is off the route, moving on");
            }
            ObstacleScan::Clear => tracing::info!("route is clear"),
            ObstacleScan::Malformed(reason) => {
                tracing::warn!(reason = %reason, "perception output malformed, assuming no obstacle");
            }
        }

        let ok = self.motion.move_to_location(location, world).await;
        if ok {
            world.move_together(location);
        }
        ok
    }

    async fn execute_carrier(&self, command: &CarrierCommand, world: &mut WorldState) -> bool {
        match command {
            CarrierCommand::MoveToObstacle => {
                let ok = self.motion.move_to_obstacle(world).await;
                world.move_carrier(self.settings.at_obstacle.as_str());
                ok
            }
            CarrierCommand::MoveObstacleToZone => {
                let zone = self.settings.obstacle_zone.clone();
                let ok = self
                    .motion
                    .move_obstacle_to_zone(&zone, &self.docking, world)
                    .await;
                world.move_carrier(zone);
                ok
            }
            CarrierCommand::Dock => self.dock_for_task(world).await,
            CarrierCommand::Undock => self.docking.undock(world).await,
            CarrierCommand::Wait => {
                tokio::time::sleep(self.settings.wait).await;
                true
            }
            CarrierCommand::Unrecognized(text) => {
                tracing::debug!(text = %text, "unrecognized carrier reply, no action");
                true
            }
        }
    }

    /// 有未清除的障碍物时对接障碍物货架，否则对接观察者货架
    async fn dock_for_task(&self, world: &mut WorldState) -> bool {
        let shelves = &self.settings.shelves;
        if world.uncleared_obstacle().is_some() {
            tracing::info!(shelf = %shelves.obstacle, "docking with the obstacle shelf");
            if !self.motion.move_to_obstacle(world).await {
                return false;
            }
            world.move_carrier(self.settings.at_obstacle.as_str());
            self.docking.dock(&shelves.obstacle, world).await
        } else {
            let observer_location = world.observer_location.clone();
            tracing::info!(shelf = %shelves.observer, location = %observer_location, "docking with the observer shelf");
            if !self.motion.move_to_location(&observer_location, world).await {
                return false;
            }
            world.move_carrier(observer_location);
            self.docking.dock(&shelves.observer, world).await
        }
    }

    /// 任务成功后的收尾：送回当前货架、回到 home；失败只记录
    pub async fn cleanup(&self, home: &str, world: &mut WorldState) {
        if world.docked_with != DockedWith::None {
            tracing::info!("returning docked shelf home");
            self.docking.put_away(world).await;
        }
        tracing::info!(home, "sending carrier home");
        if self.motion.move_to_location(home, world).await {
            world.move_carrier(home);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{DriverOp, ObstacleReport, RecordingSpeech, ScriptedSensor, SimulatedCarrier};
    use crate::llm::ScriptedLlmClient;
    use crate::prompt::PromptTemplate;
    use crate::world::{LocationCatalog, Obstacle, Point, Pose};

    struct Fixture {
        sim: Arc<SimulatedCarrier>,
        sensor: Arc<ScriptedSensor>,
        speech: Arc<RecordingSpeech>,
        coordinator: Coordinator,
    }

    fn catalog() -> Arc<LocationCatalog> {
        let catalog = LocationCatalog::new()
            .with_location("entrance", "home", Some(Point::new(0.0, 0.0)))
            .unwrap()
            .with_location("kitchen", "L02", Some(Point::new(3.11, 0.13)))
            .unwrap()
            .with_location("refrigerator_front", "L01", Some(Point::new(5.736, -0.039)))
            .unwrap()
            .with_location("obstacle_zone", "L05", None)
            .unwrap();
        Arc::new(catalog)
    }

    fn fixture(observer: &[&str], carrier: &[&str], scans: Vec<ObstacleScan>) -> Fixture {
        let sim = Arc::new(SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0)));
        let sensor = Arc::new(ScriptedSensor::new(scans));
        let speech = Arc::new(RecordingSpeech::new());
        let devices = Devices {
            driver: sim.clone(),
            sensor: sensor.clone(),
            speech: speech.clone(),
        };
        let settings = CoordinatorSettings {
            settle: Duration::ZERO,
            wait: Duration::ZERO,
            ..CoordinatorSettings::default()
        };
        let observer = Planner::new(
            "observer",
            Arc::new(ScriptedLlmClient::new(observer.iter().copied())),
            PromptTemplate::default(),
        );
        let carrier = Planner::new(
            "carrier",
            Arc::new(ScriptedLlmClient::new(carrier.iter().copied())),
            PromptTemplate::default(),
        );
        Fixture {
            sim,
            sensor,
            speech,
            coordinator: Coordinator::new(observer, carrier, devices, settings),
        }
    }

    fn world() -> WorldState {
        WorldState::new("kitchen", "entrance", catalog())
    }

    #[tokio::test]
    async fn test_carry_to_docks_first_when_undocked() {
        let f = fixture(&[], &[], vec![]);
        f.sim.script_dock(Some("S02"));
        let mut w = world();
        let cmd = ObserverCommand::CarryTo("refrigerator_front".into());
        let d = f.coordinator.execute(&cmd, &mut w).await;
        assert!(d.succeeded);
        assert_eq!(w.target_location.as_deref(), Some("refrigerator_front"));
        assert_eq!(w.docked_with, DockedWith::Observer);
        assert_eq!(f.sim.count(DriverOp::MoveToLocation), 0);
        assert_eq!(f.sensor.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_carry_to_relevant_obstacle_does_not_move() {
        let report = ObstacleReport {
            id: "S03".into(),
            coords: Point::new(5.0, 0.0),
        };
        let f = fixture(&[], &[], vec![ObstacleScan::Detected(report)]);
        let mut w = world();
        w.set_docked(DockedWith::Observer);
        let d = f
            .coordinator
            .execute(&ObserverCommand::CarryTo("refrigerator_front".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert_eq!(f.sim.count(DriverOp::MoveToLocation), 0);
        assert_eq!(w.observer_location, "kitchen");
        assert_eq!(w.obstacle.as_ref().map(|o| o.id.as_str()), Some("S03"));
    }

    #[tokio::test]
    async fn test_carry_to_moves_together_when_clear() {
        let f = fixture(&[], &[], vec![ObstacleScan::Malformed("garbage".into())]);
        let mut w = world();
        w.set_docked(DockedWith::Observer);
        let d = f
            .coordinator
            .execute(&ObserverCommand::CarryTo("refrigerator_front".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert!(w.obstacle.is_none());
        assert_eq!(w.observer_location, "refrigerator_front");
        assert_eq!(w.carrier_location, "refrigerator_front");
    }

    #[tokio::test]
    async fn test_carry_to_moves_past_distant_obstacle() {
        let report = ObstacleReport {
            id: "S03".into(),
            coords: Point::new(1.0, 0.0),
        };
        let f = fixture(&[], &[], vec![ObstacleScan::Detected(report)]);
        let mut w = world();
        w.set_docked(DockedWith::Observer);
        let d = f
            .coordinator
            .execute(&ObserverCommand::CarryTo("refrigerator_front".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert_eq!(f.sensor.scan_count(), 1);
        assert_eq!(f.sim.count(DriverOp::MoveToLocation), 1);
        assert_eq!(w.observer_location, "refrigerator_front");
        assert_eq!(w.carrier_location, "refrigerator_front");
        assert_eq!(w.target_location.as_deref(), Some("refrigerator_front"));
        assert!(w.obstacle.is_none());
    }

    #[tokio::test]
    async fn test_summon_moves_carrier_only() {
        let f = fixture(&[], &[], vec![]);
        let mut w = world();
        let d = f
            .coordinator
            .execute(&ObserverCommand::SummonTo("kitchen".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert_eq!(w.carrier_location, "kitchen");
        assert_eq!(w.observer_location, "kitchen");

        let d = f
            .coordinator
            .execute(&ObserverCommand::SummonTo("garage".into()), &mut w)
            .await;
        assert!(!d.succeeded);
        assert_eq!(w.carrier_location, "kitchen");
    }

    #[tokio::test]
    async fn test_speak_at_goal_uses_carrier_speaker() {
        let f = fixture(&[], &[], vec![]);
        f.sim.fail_on(DriverOp::Speak);
        let mut w = world();
        let d = f.coordinator.execute(&ObserverCommand::SpeakAtGoal, &mut w).await;
        assert!(d.succeeded);
        assert_eq!(f.sim.count(DriverOp::Speak), 1);
    }

    #[tokio::test]
    async fn test_delegate_dock_prefers_uncleared_obstacle() {
        let f = fixture(&[], &["- DOCK"], vec![]);
        f.sim.script_dock(Some("S03"));
        let mut w = world();
        w.obstacle = Some(Obstacle::new("S03", Point::new(4.0, 0.0)));
        let d = f
            .coordinator
            .execute(&ObserverCommand::Delegate("clear the way".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert_eq!(d.carrier_reply.as_deref(), Some("- DOCK"));
        assert_eq!(w.carrier_location, "at_obstacle");
        assert_eq!(w.docked_with, DockedWith::Obstacle);
        assert_eq!(f.sim.count(DriverOp::MoveToPose), 1);
        assert_eq!(f.sim.count(DriverOp::Rotate), 0);
        assert_eq!(w.history().last().map(|h| h.agent), Some(Agent::Carrier));
    }

    #[tokio::test]
    async fn test_delegate_dock_with_cleared_obstacle_targets_observer() {
        let f = fixture(&[], &["DOCK"], vec![]);
        f.sim.script_dock(Some("S02"));
        let mut w = world();
        let mut cleared = Obstacle::new("S03", Point::new(4.0, 0.0));
        cleared.cleared = true;
        w.obstacle = Some(cleared);
        let d = f
            .coordinator
            .execute(&ObserverCommand::Delegate("dock".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert_eq!(w.docked_with, DockedWith::Observer);
        assert_eq!(w.carrier_location, "kitchen");
        assert_eq!(f.sim.count(DriverOp::MoveToPose), 0);
    }

    #[tokio::test]
    async fn test_delegate_dock_navigation_failure_skips_dock() {
        let f = fixture(&[], &["DOCK"], vec![]);
        f.sim.fail_on(DriverOp::MoveToLocation);
        let mut w = world();
        let d = f
            .coordinator
            .execute(&ObserverCommand::Delegate("dock".into()), &mut w)
            .await;
        assert!(!d.succeeded);
        assert_eq!(f.sim.count(DriverOp::Dock), 0);
        assert_eq!(w.carrier_location, "entrance");
    }

    #[tokio::test]
    async fn test_unrecognized_carrier_reply_is_success() {
        let f = fixture(&[], &["I am not sure"], vec![]);
        let mut w = world();
        let d = f
            .coordinator
            .execute(&ObserverCommand::Delegate("hmm".into()), &mut w)
            .await;
        assert!(d.succeeded);
        assert!(f.sim.calls().is_empty());
    }

    #[tokio::test]
    async fn test_speech_relay_skips_speak_actions() {
        let f = fixture(&["CALL Kachaka to kitchen", "SPEAK at kitchen"], &[], vec![]);
        let w = world();
        assert_eq!(f.coordinator.propose(&w).await, "CALL Kachaka to kitchen");
        assert_eq!(f.coordinator.propose(&w).await, "SPEAK at kitchen");
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.speech.spoken(), vec!["CALL Kachaka to kitchen".to_string()]);
    }

    #[tokio::test]
    async fn test_shared_llm_usage_counted_once() {
        let llm: Arc<dyn crate::llm::LlmClient> = Arc::new(ScriptedLlmClient::new(["WAIT"]));
        let devices = Devices {
            driver: Arc::new(SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))),
            sensor: Arc::new(ScriptedSensor::new(vec![])),
            speech: Arc::new(RecordingSpeech::new()),
        };
        let coordinator = Coordinator::new(
            Planner::new("observer", llm.clone(), PromptTemplate::default()),
            Planner::new("carrier", llm, PromptTemplate::default()),
            devices,
            CoordinatorSettings::default(),
        );
        coordinator.propose(&world()).await;
        assert_eq!(coordinator.usage().3, 1);
    }
}
