//! 障碍物相关性过滤：只有离目标地点足够近的障碍物才写入世界状态
//!
//! 判定为严格小于阈值；目标地点无坐标或坐标非法时一律视为无关（不阻塞任务）。

use crate::devices::ObstacleReport;
use crate::world::{Obstacle, WorldState};

/// 默认相关距离阈值（米）
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Relevant,
    Irrelevant,
}

#[derive(Debug, Clone)]
pub struct ObstacleFilter {
    threshold: f64,
}

impl Default for ObstacleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_RELEVANCE_THRESHOLD)
    }
}

impl ObstacleFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// 判定相关性；相关时覆盖写入 world.obstacle，其余情况不修改世界状态
    pub fn assess(&self, report: &ObstacleReport, target: &str, world: &mut WorldState) -> Relevance {
        if let Some(known) = world.obstacle.as_ref() {
            if known.cleared && known.id == report.id {
                tracing::debug!(id = %report.id, "obstacle already cleared, ignoring report");
                return Relevance::Irrelevant;
            }
        }

        let Some(dest) = world.catalog().coords(target) else {
            tracing::warn!(destination = target, "no coordinates for target location, treating obstacle as irrelevant");
            return Relevance::Irrelevant;
        };
        if !report.coords.is_finite() || !dest.is_finite() {
            tracing::warn!(destination = target, id = %report.id, "non-finite coordinates in obstacle report");
            return Relevance::Irrelevant;
        }

        let distance = dest.distance_to(&report.coords);
        tracing::info!(
            destination = target,
            id = %report.id,
            distance = %format!("{distance:.2}"),
            threshold = self.threshold,
            "obstacle distance to target"
        );

        if distance < self.threshold {
            world.obstacle = Some(Obstacle::new(report.id.clone(), report.coords));
            Relevance::Relevant
        } else {
            Relevance::Irrelevant
        }
    }
}
