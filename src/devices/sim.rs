//! 模拟设备：离线演练与测试用
//!
//! SimulatedCarrier 记录每次驱动调用，可注入失败、预置对接结果；
//! 未预置时按「当前位置下的货架」决定 dock() 挂载哪个货架：同地点的货架优先，
//! 其次取半径内最近的货架，距离相同按货架 id 排序。

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::DeviceError;
use crate::devices::{CarrierDriver, ObstacleScan, ObstacleSensor, SpeechOutput};
use crate::world::{Point, Pose};

/// 驱动操作类型（用于计数与失败注入）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Pose,
    MoveToLocation,
    MoveToPose,
    Rotate,
    Dock,
    Undock,
    ReturnShelf,
    DockedShelfId,
    Speak,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DriverCall {
    pub op: DriverOp,
    pub detail: String,
}

#[derive(Debug, Clone)]
struct SimShelf {
    location_id: Option<String>,
    point: Option<Point>,
}

#[derive(Debug, Default)]
struct SimState {
    pose: Option<Pose>,
    location_id: Option<String>,
    docked: Option<String>,
    shelves: BTreeMap<String, SimShelf>,
    location_poses: HashMap<String, Point>,
    scripted_docks: VecDeque<Option<String>>,
    failing: HashSet<DriverOp>,
    calls: Vec<DriverCall>,
}

/// 货架与位姿的匹配半径（米）
const SHELF_REACH: f64 = 1.0;

#[derive(Debug, Default)]
pub struct SimulatedCarrier {
    state: Mutex<SimState>,
}

impl SimulatedCarrier {
    pub fn new(pose: Pose) -> Self {
        let sim = Self::default();
        if let Ok(mut s) = sim.state.lock() {
            s.pose = Some(pose);
        }
        sim
    }

    fn with_state(self, f: impl FnOnce(&mut SimState)) -> Self {
        if let Ok(mut s) = self.state.lock() {
            f(&mut s);
        }
        self
    }

    /// 地点 ID 对应的位姿：移动到该地点后更新 pose
    pub fn with_location_pose(self, location_id: &str, point: Point) -> Self {
        self.with_state(|s| {
            s.location_poses.insert(location_id.to_string(), point);
        })
    }

    /// 放置货架：位于某地点 ID，或位于某世界坐标附近
    pub fn with_shelf(self, shelf_id: &str, location_id: Option<&str>, point: Option<Point>) -> Self {
        self.with_state(|s| {
            s.shelves.insert(
                shelf_id.to_string(),
                SimShelf {
                    location_id: location_id.map(String::from),
                    point,
                },
            );
        })
    }

    pub fn with_location(self, location_id: &str) -> Self {
        self.with_state(|s| s.location_id = Some(location_id.to_string()))
    }

    pub fn with_docked(self, shelf_id: &str) -> Self {
        self.with_state(|s| s.docked = Some(shelf_id.to_string()))
    }

    /// 预置下一次 dock() 实际挂载的货架（None 表示什么都没挂上）
    pub fn script_dock(&self, shelf_id: Option<&str>) {
        if let Ok(mut s) = self.state.lock() {
            s.scripted_docks.push_back(shelf_id.map(String::from));
        }
    }

    pub fn fail_on(&self, op: DriverOp) {
        if let Ok(mut s) = self.state.lock() {
            s.failing.insert(op);
        }
    }

    pub fn recover(&self, op: DriverOp) {
        if let Ok(mut s) = self.state.lock() {
            s.failing.remove(&op);
        }
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn count(&self, op: DriverOp) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn docked(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.docked.clone())
    }

    fn begin(&self, op: DriverOp, detail: String) -> Result<std::sync::MutexGuard<'_, SimState>, DeviceError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| DeviceError::Transport("simulator state poisoned".to_string()))?;
        s.calls.push(DriverCall { op, detail });
        if s.failing.contains(&op) {
            return Err(DeviceError::Rejected(format!("{:?} failed (injected)", op)));
        }
        Ok(s)
    }
}

impl SimState {
    fn shelf_under_carrier(&self) -> Option<String> {
        self.shelves
            .iter()
            .filter(|(id, _)| self.docked.as_deref() != Some(id.as_str()))
            .filter_map(|(id, shelf)| {
                if shelf.location_id.is_some() && shelf.location_id == self.location_id {
                    return Some((0.0, id));
                }
                match (shelf.point, self.pose) {
                    (Some(p), Some(pose)) => {
                        let d = p.distance_to(&pose.position());
                        (d <= SHELF_REACH).then_some((d, id))
                    }
                    _ => None,
                }
            })
            .min_by(|(da, ia), (db, ib)| da.total_cmp(db).then_with(|| ia.cmp(ib)))
            .map(|(_, id)| id.clone())
    }
}

#[async_trait]
impl CarrierDriver for SimulatedCarrier {
    async fn pose(&self) -> Result<Pose, DeviceError> {
        let s = self.begin(DriverOp::Pose, String::new())?;
        Ok(s.pose.unwrap_or(Pose::new(0.0, 0.0, 0.0)))
    }

    async fn move_to_location(&self, location_id: &str) -> Result<(), DeviceError> {
        let mut s = self.begin(DriverOp::MoveToLocation, location_id.to_string())?;
        s.location_id = Some(location_id.to_string());
        if let Some(p) = s.location_poses.get(location_id).copied() {
            let heading = s.pose.map_or(0.0, |pose| pose.heading);
            s.pose = Some(Pose::new(p.x, p.y, heading));
        }
        Ok(())
    }

    async fn move_to_pose(&self, x: f64, y: f64, heading: f64) -> Result<(), DeviceError> {
        let mut s = self.begin(DriverOp::MoveToPose, format!("{x:.3},{y:.3},{heading:.3}"))?;
        s.location_id = None;
        s.pose = Some(Pose::new(x, y, heading));
        Ok(())
    }

    async fn rotate_in_place(&self, angle: f64) -> Result<(), DeviceError> {
        let mut s = self.begin(DriverOp::Rotate, format!("{angle:.3}"))?;
        if let Some(pose) = s.pose.as_mut() {
            pose.heading += angle;
        }
        Ok(())
    }

    async fn dock(&self) -> Result<(), DeviceError> {
        let mut s = self.begin(DriverOp::Dock, String::new())?;
        let attached = match s.scripted_docks.pop_front() {
            Some(scripted) => scripted,
            None => s.shelf_under_carrier(),
        };
        s.docked = attached;
        Ok(())
    }

    async fn undock(&self) -> Result<(), DeviceError> {
        let mut s = self.begin(DriverOp::Undock, String::new())?;
        if let Some(id) = s.docked.take() {
            let location_id = s.location_id.clone();
            let point = s.pose.map(|p| p.position());
            s.shelves.insert(id, SimShelf { location_id, point });
        }
        Ok(())
    }

    async fn return_shelf_home(&self) -> Result<(), DeviceError> {
        let mut s = self.begin(DriverOp::ReturnShelf, String::new())?;
        if let Some(id) = s.docked.take() {
            s.shelves.remove(&id);
        }
        Ok(())
    }

    async fn docked_shelf_id(&self) -> Result<Option<String>, DeviceError> {
        let s = self.begin(DriverOp::DockedShelfId, String::new())?;
        Ok(s.docked.clone())
    }

    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        let _s = self.begin(DriverOp::Speak, text.to_string())?;
        tracing::info!(text, "carrier speaks");
        Ok(())
    }
}

/// 预置扫描结果的感知器；脚本耗尽后一律 Clear
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    scans: Mutex<VecDeque<ObstacleScan>>,
    count: Mutex<usize>,
}

impl ScriptedSensor {
    pub fn new(scans: Vec<ObstacleScan>) -> Self {
        Self {
            scans: Mutex::new(scans.into()),
            count: Mutex::new(0),
        }
    }

    pub fn scan_count(&self) -> usize {
        self.count.lock().map(|c| *c).unwrap_or_default()
    }
}

#[async_trait]
impl ObstacleSensor for ScriptedSensor {
    async fn scan(&self) -> ObstacleScan {
        if let Ok(mut c) = self.count.lock() {
            *c += 1;
        }
        self.scans
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(ObstacleScan::Clear)
    }
}

/// 记录所有播报文本的语音输出，可配置为始终失败
#[derive(Debug, Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    failing: bool,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SpeechOutput for RecordingSpeech {
    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        if let Ok(mut s) = self.spoken.lock() {
            s.push(text.to_string());
        }
        if self.failing {
            Err(DeviceError::Transport("speech host unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dock_attaches_shelf_at_location() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))
            .with_shelf("S02", Some("L02"), None);
        sim.move_to_location("L02").await.unwrap();
        sim.dock().await.unwrap();
        assert_eq!(sim.docked_shelf_id().await.unwrap().as_deref(), Some("S02"));
    }

    #[tokio::test]
    async fn test_dock_attaches_shelf_near_pose() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))
            .with_shelf("S03", None, Some(Point::new(2.0, 0.0)));
        sim.move_to_pose(1.4, 0.0, 0.0).await.unwrap();
        sim.dock().await.unwrap();
        assert_eq!(sim.docked().as_deref(), Some("S03"));
    }

    #[tokio::test]
    async fn test_dock_prefers_nearest_shelf() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))
            .with_shelf("S01", None, Some(Point::new(0.9, 0.0)))
            .with_shelf("S09", None, Some(Point::new(0.3, 0.0)));
        sim.dock().await.unwrap();
        assert_eq!(sim.docked().as_deref(), Some("S09"));
    }

    #[tokio::test]
    async fn test_dock_prefers_shelf_at_location() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))
            .with_location_pose("L02", Point::new(3.0, 0.0))
            .with_shelf("S03", None, Some(Point::new(3.1, 0.0)))
            .with_shelf("S02", Some("L02"), None);
        sim.move_to_location("L02").await.unwrap();
        sim.dock().await.unwrap();
        assert_eq!(sim.docked().as_deref(), Some("S02"));
    }

    #[tokio::test]
    async fn test_equidistant_shelves_resolve_by_id() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))
            .with_shelf("S05", None, Some(Point::new(0.5, 0.0)))
            .with_shelf("S04", None, Some(Point::new(-0.5, 0.0)));
        sim.dock().await.unwrap();
        assert_eq!(sim.docked().as_deref(), Some("S04"));
    }

    #[tokio::test]
    async fn test_scripted_dock_wins() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0))
            .with_shelf("S02", Some("L02"), None)
            .with_location("L02");
        sim.script_dock(Some("S03"));
        sim.dock().await.unwrap();
        assert_eq!(sim.docked().as_deref(), Some("S03"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 0.0));
        sim.fail_on(DriverOp::Undock);
        assert!(sim.undock().await.is_err());
        assert_eq!(sim.count(DriverOp::Undock), 1);
        sim.recover(DriverOp::Undock);
        assert!(sim.undock().await.is_ok());
    }

    #[tokio::test]
    async fn test_move_updates_pose_from_location_table() {
        let sim = SimulatedCarrier::new(Pose::new(0.0, 0.0, 1.0))
            .with_location_pose("L02", Point::new(3.11, 0.13));
        sim.move_to_location("L02").await.unwrap();
        let pose = sim.pose().await.unwrap();
        assert_eq!(pose.position(), Point::new(3.11, 0.13));
        assert_eq!(pose.heading, 1.0);
    }

    #[tokio::test]
    async fn test_scripted_sensor_defaults_to_clear() {
        let sensor = ScriptedSensor::new(vec![ObstacleScan::Malformed("x".into())]);
        assert!(matches!(sensor.scan().await, ObstacleScan::Malformed(_)));
        assert_eq!(sensor.scan().await, ObstacleScan::Clear);
        assert_eq!(sensor.scan_count(), 2);
    }
}
