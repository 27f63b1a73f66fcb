//! 移动：按符号地名导航、接近障碍物、把障碍物货架运到待避区
//!
//! 驱动错误在此层转为 false 并记录 warn，不向上传播。

use std::sync::Arc;
use std::time::Duration;

use crate::core::DeviceError;
use crate::devices::CarrierDriver;
use crate::orchestration::DockingController;
use crate::world::{Point, WorldState};

/// 停在障碍物前方的距离（米）
pub const DEFAULT_APPROACH_DISTANCE: f64 = 0.6;

pub struct Motion {
    driver: Arc<dyn CarrierDriver>,
    approach_distance: f64,
    settle: Duration,
}

impl Motion {
    pub fn new(driver: Arc<dyn CarrierDriver>, approach_distance: f64, settle: Duration) -> Self {
        Self {
            driver,
            approach_distance,
            settle,
        }
    }

    /// 按符号地名移动；地名不在目录中时直接失败
    pub async fn move_to_location(&self, name: &str, world: &WorldState) -> bool {
        let Some(location_id) = world.catalog().driver_id(name) else {
            let err = DeviceError::UnknownLocation(name.to_string());
            tracing::warn!(error = %err, "cannot navigate");
            return false;
        };
        tracing::info!(location = name, id = location_id, "moving carrier");
        match self.driver.move_to_location(location_id).await {
            Ok(()) => {
                tracing::info!(location = name, "arrived");
                true
            }
            Err(e) => {
                tracing::warn!(location = name, error = %e, "move failed");
                false
            }
        }
    }

    /// 朝障碍物方向行驶，停在其前方 approach_distance 处
    pub async fn move_to_obstacle(&self, world: &WorldState) -> bool {
        let Some(obstacle) = world.obstacle.as_ref() else {
            tracing::warn!(error = %DeviceError::MissingObstacle, "cannot approach obstacle");
            return false;
        };
        let target = obstacle.coords;
        tracing::info!(x = target.x, y = target.y, "approaching obstacle");

        let pose = match self.driver.pose().await {
            Ok(pose) => pose,
            Err(e) => {
                tracing::warn!(error = %e, "pose unavailable while approaching obstacle");
                return false;
            }
        };
        let (x, y, heading) = approach_pose(pose.position(), target, self.approach_distance);
        match self.driver.move_to_pose(x, y, heading).await {
            Ok(()) => {
                tracing::info!("reached approach pose");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "approach move failed");
                false
            }
        }
    }

    /// 带着障碍物货架去待避区，稍候后就地卸下并标记已清除
    pub async fn move_obstacle_to_zone(
        &self,
        zone: &str,
        docking: &DockingController,
        world: &mut WorldState,
    ) -> bool {
        tracing::info!(zone, "clearing obstacle");
        if !self.move_to_location(zone, world).await {
            return false;
        }
        tokio::time::sleep(self.settle).await;
        if !docking.undock(world).await {
            tracing::warn!("undock at the holding zone failed");
            return false;
        }
        world.mark_obstacle_cleared();
        tracing::info!("obstacle cleared");
        true
    }
}

/// 由当前位置与障碍物坐标计算接近位姿 (x, y, heading)
pub fn approach_pose(from: Point, obstacle: Point, distance: f64) -> (f64, f64, f64) {
    let heading = (obstacle.y - from.y).atan2(obstacle.x - from.x);
    (
        obstacle.x - distance * heading.cos(),
        obstacle.y - distance * heading.sin(),
        heading,
    )
}
