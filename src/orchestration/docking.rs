//! 对接控制：挂载 / 卸下货架，并按实际结果核验
//!
//! 驱动的 dock() 只能挂载车身下方的货架，可能与意图不符。核验失败时本次命令报失败，
//! 但世界状态仍按实际挂载的货架更新，避免后续逻辑相信一次并未发生的对接。
//! 所有驱动错误在此层转为 false，不做重试。

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use crate::devices::CarrierDriver;
use crate::world::{DockedWith, WorldState};

/// 两类货架的驱动 ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfIds {
    pub observer: String,
    pub obstacle: String,
}

impl Default for ShelfIds {
    fn default() -> Self {
        Self {
            observer: "S02".to_string(),
            obstacle: "S03".to_string(),
        }
    }
}

impl ShelfIds {
    /// 货架 ID → 语义角色；未知 ID 为 None
    pub fn role_of(&self, shelf_id: &str) -> DockedWith {
        if shelf_id == self.observer {
            DockedWith::Observer
        } else if shelf_id == self.obstacle {
            DockedWith::Obstacle
        } else {
            DockedWith::None
        }
    }
}

pub struct DockingController {
    driver: Arc<dyn CarrierDriver>,
    shelves: ShelfIds,
    settle: Duration,
}

impl DockingController {
    pub fn new(driver: Arc<dyn CarrierDriver>, shelves: ShelfIds, settle: Duration) -> Self {
        Self {
            driver,
            shelves,
            settle,
        }
    }

    /// 对接指定货架并核验；返回意图是否达成
    pub async fn dock(&self, target_shelf: &str, world: &mut WorldState) -> bool {
        tracing::info!(shelf = target_shelf, "docking sequence start");

        if target_shelf == self.shelves.observer {
            tracing::info!("rotating 180 degrees to face the observer shelf");
            if let Err(e) = self.driver.rotate_in_place(PI).await {
                tracing::warn!(error = %e, "rotation before docking failed");
                world.set_docked(DockedWith::None);
                return false;
            }
        }

        if let Err(e) = self.driver.dock().await {
            tracing::warn!(shelf = target_shelf, error = %e, "dock command failed");
            world.set_docked(DockedWith::None);
            return false;
        }

        // 等待机载状态稳定后再读取实际挂载的货架
        tokio::time::sleep(self.settle).await;

        let actual = match self.driver.docked_shelf_id().await {
            Ok(actual) => actual,
            Err(e) => {
                tracing::warn!(error = %e, "could not read docked shelf id");
                world.set_docked(DockedWith::None);
                return false;
            }
        };

        let actual_role = actual
            .as_deref()
            .map_or(DockedWith::None, |id| self.shelves.role_of(id));
        world.set_docked(actual_role);

        if actual.as_deref() == Some(target_shelf) {
            tracing::info!(shelf = target_shelf, docked_with = %actual_role, "dock verified");
            true
        } else {
            tracing::warn!(
                expected = target_shelf,
                actual = actual.as_deref().unwrap_or("<none>"),
                docked_with = %actual_role,
                "docked with an unexpected shelf, world state reflects the actual shelf"
            );
            false
        }
    }

    /// 卸下货架；未挂载时直接成功且不调用驱动
    pub async fn undock(&self, world: &mut WorldState) -> bool {
        if world.docked_with == DockedWith::None {
            tracing::info!("already undocked, skipping");
            return true;
        }
        match self.driver.undock().await {
            Ok(()) => {
                world.set_docked(DockedWith::None);
                true
            }
            Err(e) => {
                // 与 dock 不同：失败时保留原状态
                tracing::warn!(error = %e, "undock failed");
                false
            }
        }
    }

    /// 把当前货架送回原位；成功时只清空 docked_with
    pub async fn put_away(&self, world: &mut WorldState) -> bool {
        match self.driver.return_shelf_home().await {
            Ok(()) => {
                world.clear_docked_shelf();
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "returning shelf home failed");
                false
            }
        }
    }
}
