//! 世界状态：编排器对环境的全部信念
//!
//! 每次任务运行新建一个 WorldState，由 Step Loop 独占持有，结束后丢弃。
//! 停靠状态只能通过 set_docked / clear_docked_shelf 修改，reconcile 在每步结束时恢复不变量：
//! observer_is_docked == (docked_with == Observer)，且与观察者停靠时两者位置一致。

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::world::{LocationCatalog, Point};

/// 当前挂在搬运机器人上的货架
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DockedWith {
    #[default]
    None,
    Observer,
    Obstacle,
}

impl fmt::Display for DockedWith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DockedWith::None => "none",
            DockedWith::Observer => "observer",
            DockedWith::Obstacle => "obstacle",
        };
        f.write_str(s)
    }
}

/// 搬运机器人位姿（每步从驱动刷新，不持久化）
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// 与任务相关的障碍物；一旦记录便不删除，只会被标记 cleared
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Obstacle {
    pub id: String,
    pub coords: Point,
    pub cleared: bool,
    pub location: Option<String>,
}

impl Obstacle {
    pub fn new(id: impl Into<String>, coords: Point) -> Self {
        Self {
            id: id.into(),
            coords,
            cleared: false,
            location: None,
        }
    }
}

/// 历史记录的发言方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Agent {
    Observer,
    Carrier,
    System,
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Agent::Observer => "Observer",
            Agent::Carrier => "Carrier",
            Agent::System => "System",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub agent: Agent,
    pub action: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorldState {
    pub observer_location: String,
    pub carrier_location: String,
    pub carrier_pose: Option<Pose>,
    pub docked_with: DockedWith,
    pub observer_is_docked: bool,
    pub obstacle: Option<Obstacle>,
    pub target_location: Option<String>,
    pub step: usize,
    history: Vec<HistoryEntry>,
    #[serde(skip)]
    catalog: Arc<LocationCatalog>,
}

impl WorldState {
    pub fn new(
        observer_location: impl Into<String>,
        carrier_location: impl Into<String>,
        catalog: Arc<LocationCatalog>,
    ) -> Self {
        Self {
            observer_location: observer_location.into(),
            carrier_location: carrier_location.into(),
            carrier_pose: None,
            docked_with: DockedWith::None,
            observer_is_docked: false,
            obstacle: None,
            target_location: None,
            step: 0,
            history: Vec::new(),
            catalog,
        }
    }

    pub fn catalog(&self) -> &LocationCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// 追加历史（只增不删）
    pub fn record(&mut self, agent: Agent, action: impl Into<String>) {
        self.history.push(HistoryEntry {
            agent,
            action: action.into(),
        });
    }

    /// 原子地切换停靠状态，并同步 observer_is_docked
    pub fn set_docked(&mut self, docked: DockedWith) {
        self.docked_with = docked;
        self.observer_is_docked = docked == DockedWith::Observer;
    }

    /// 货架送回原位后只清空 docked_with；observer_is_docked 留给 reconcile
    pub fn clear_docked_shelf(&mut self) {
        self.docked_with = DockedWith::None;
    }

    /// 搬运机器人单独移动
    pub fn move_carrier(&mut self, location: impl Into<String>) {
        self.carrier_location = location.into();
    }

    /// 搬运机器人带着观察者一起移动
    pub fn move_together(&mut self, location: impl Into<String>) {
        let location = location.into();
        self.observer_location = location.clone();
        self.carrier_location = location;
    }

    /// 仍未清除的障碍物（cleared 严格为 false）
    pub fn uncleared_obstacle(&self) -> Option<&Obstacle> {
        self.obstacle.as_ref().filter(|o| !o.cleared)
    }

    pub fn mark_obstacle_cleared(&mut self) {
        if let Some(obstacle) = self.obstacle.as_mut() {
            obstacle.cleared = true;
        }
    }

    /// 每步结束时恢复派生字段；obstacle_zone 为障碍物待避区的地名
    pub fn reconcile(&mut self, obstacle_zone: &str) {
        match self.docked_with {
            DockedWith::Observer => {
                self.observer_is_docked = true;
                self.observer_location = self.carrier_location.clone();
            }
            DockedWith::Obstacle => {
                self.observer_is_docked = false;
                let carrier_location = self.carrier_location.clone();
                if let Some(obstacle) = self.obstacle.as_mut() {
                    if carrier_location == obstacle_zone && !obstacle.cleared {
                        tracing::info!("obstacle shelf reached the holding zone, marking cleared");
                        obstacle.cleared = true;
                    }
                    obstacle.location = Some(carrier_location);
                }
            }
            DockedWith::None => {
                self.observer_is_docked = false;
            }
        }
    }

    /// 任务完成判定：已设目标、观察者在目标处、障碍物不存在或已清除、且本步观察者在目标处发言
    pub fn goal_reached(&self, spoke_at_goal: bool) -> bool {
        let Some(target) = self.target_location.as_deref() else {
            return false;
        };
        let observer_at_goal = self.observer_location == target;
        let obstacle_cleared = self.obstacle.as_ref().map_or(true, |o| o.cleared);
        observer_at_goal && obstacle_cleared && spoke_at_goal
    }

    /// 供 prompt 使用的世界状态摘要（不含 history / step）
    pub fn prompt_summary(&self) -> String {
        let pose = self
            .carrier_pose
            .map(|p| format!("(x={:.2}, y={:.2}, heading={:.2})", p.x, p.y, p.heading))
            .unwrap_or_else(|| "unknown".to_string());
        let obstacle = self
            .obstacle
            .as_ref()
            .map(|o| {
                format!(
                    "{{id: {}, x: {:.2}, y: {:.2}, cleared: {}, location: {}}}",
                    o.id,
                    o.coords.x,
                    o.coords.y,
                    o.cleared,
                    o.location.as_deref().unwrap_or("unknown")
                )
            })
            .unwrap_or_else(|| "none".to_string());
        let locations: Vec<&str> = self.catalog.names().collect();
        format!(
            "observer_location: {}, carrier_location: {}, carrier_pose: {}, docked_with: {}, \
             observer_is_docked: {}, obstacle: {}, target_location: {}, locations: [{}]",
            self.observer_location,
            self.carrier_location,
            pose,
            self.docked_with,
            self.observer_is_docked,
            obstacle,
            self.target_location.as_deref().unwrap_or("none"),
            locations.join(", ")
        )
    }
}

/// 人类可读的多行展示（每步打印一次）
impl fmt::Display for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pose = self
            .carrier_pose
            .map(|p| format!("(x={:.2}, y={:.2}, θ={:.2})", p.x, p.y, p.heading))
            .unwrap_or_else(|| "N/A".to_string());
        writeln!(f, "  - Observer location: {}", self.observer_location)?;
        writeln!(f, "  - Carrier location: {} {}", self.carrier_location, pose)?;
        write!(f, "  - Docked with: {}", self.docked_with)?;
        if let Some(o) = &self.obstacle {
            write!(
                f,
                "\n  - Obstacle: id={}, coords=(x={:.2}, y={:.2}), cleared={}",
                o.id, o.coords.x, o.coords.y, o.cleared
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldState {
        let catalog = LocationCatalog::new()
            .with_location("kitchen", "L02", Some(Point::new(3.11, 0.13)))
            .unwrap()
            .with_location("entrance", "home", Some(Point::new(0.0, 0.0)))
            .unwrap();
        WorldState::new("kitchen", "entrance", Arc::new(catalog))
    }

    #[test]
    fn test_goal_reached_at_kitchen() {
        let mut w = world();
        w.target_location = Some("kitchen".to_string());
        assert!(w.goal_reached(true));
        assert!(!w.goal_reached(false));
    }

    #[test]
    fn test_goal_requires_target() {
        let w = world();
        assert!(!w.goal_reached(true));
    }

    #[test]
    fn test_goal_blocked_by_uncleared_obstacle() {
        let mut w = world();
        w.target_location = Some("kitchen".to_string());
        w.obstacle = Some(Obstacle::new("S03", Point::new(3.0, 0.0)));
        assert!(!w.goal_reached(true));
        w.mark_obstacle_cleared();
        assert!(w.goal_reached(true));
    }

    #[test]
    fn test_set_docked_keeps_flag_in_sync() {
        let mut w = world();
        w.set_docked(DockedWith::Observer);
        assert!(w.observer_is_docked);
        w.set_docked(DockedWith::Obstacle);
        assert!(!w.observer_is_docked);
        w.set_docked(DockedWith::None);
        assert!(!w.observer_is_docked);
    }

    #[test]
    fn test_reconcile_drags_observer_along() {
        let mut w = world();
        w.set_docked(DockedWith::Observer);
        w.move_carrier("living_room");
        w.reconcile("obstacle_zone");
        assert_eq!(w.observer_location, "living_room");
        assert!(w.observer_is_docked);
    }

    #[test]
    fn test_reconcile_after_put_away_restores_flag() {
        let mut w = world();
        w.set_docked(DockedWith::Observer);
        w.clear_docked_shelf();
        assert!(w.observer_is_docked);
        w.reconcile("obstacle_zone");
        assert!(!w.observer_is_docked);
    }

    #[test]
    fn test_reconcile_clears_obstacle_in_zone() {
        let mut w = world();
        w.obstacle = Some(Obstacle::new("S03", Point::new(3.0, 0.0)));
        w.set_docked(DockedWith::Obstacle);
        w.move_carrier("obstacle_zone");
        w.reconcile("obstacle_zone");
        let o = w.obstacle.as_ref().unwrap();
        assert!(o.cleared);
        assert_eq!(o.location.as_deref(), Some("obstacle_zone"));
        assert!(w.uncleared_obstacle().is_none());
    }

    #[test]
    fn test_history_is_append_only() {
        let mut w = world();
        w.record(Agent::Observer, "WAIT");
        w.record(Agent::System, "failed");
        assert_eq!(w.history().len(), 2);
        assert_eq!(w.history()[1].agent, Agent::System);
    }

    #[test]
    fn test_prompt_summary_excludes_history() {
        let mut w = world();
        w.record(Agent::Observer, "SECRET HISTORY");
        w.carrier_pose = Some(Pose::new(1.0, 2.0, 0.5));
        let s = w.prompt_summary();
        assert!(s.contains("observer_location: kitchen"));
        assert!(s.contains("docked_with: none"));
        assert!(s.contains("carrier_pose: (x=1.00, y=2.00, heading=0.50)"));
        assert!(!s.contains("SECRET HISTORY"));
    }

    #[test]
    fn test_display_lists_obstacle() {
        let mut w = world();
        w.obstacle = Some(Obstacle::new("S03", Point::new(1.5, -0.25)));
        let text = w.to_string();
        assert!(text.contains("Observer location: kitchen"));
        assert!(text.contains("Carrier location: entrance N/A"));
        assert!(text.contains("id=S03, coords=(x=1.50, y=-0.25), cleared=false"));
    }
}
