//! 搬运机器人驱动接口
//!
//! 编排器只通过该 trait 操作机器人；实例在任务开始时注入，生命周期与一次任务运行一致。
//! 驱动的 dock() 没有货架参数，只会与「当前车身下方」的货架对接，因此对接结果需要由上层核验。

use async_trait::async_trait;

use crate::core::DeviceError;
use crate::world::Pose;

#[async_trait]
pub trait CarrierDriver: Send + Sync {
    async fn pose(&self) -> Result<Pose, DeviceError>;

    /// 按驱动地点 ID 移动（非符号地名）
    async fn move_to_location(&self, location_id: &str) -> Result<(), DeviceError>;

    async fn move_to_pose(&self, x: f64, y: f64, heading: f64) -> Result<(), DeviceError>;

    /// 原地旋转（弧度）
    async fn rotate_in_place(&self, angle: f64) -> Result<(), DeviceError>;

    async fn dock(&self) -> Result<(), DeviceError>;

    async fn undock(&self) -> Result<(), DeviceError>;

    /// 把当前挂载的货架送回其原位
    async fn return_shelf_home(&self) -> Result<(), DeviceError>;

    /// 当前实际挂载的货架 ID；未挂载时为 None
    async fn docked_shelf_id(&self) -> Result<Option<String>, DeviceError>;

    /// 机器人自身扬声器播报
    async fn speak(&self, text: &str) -> Result<(), DeviceError>;
}
