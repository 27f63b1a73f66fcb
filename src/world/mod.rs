//! 世界模型：任务运行期间的状态与只读地点目录

pub mod catalog;
pub mod state;

pub use catalog::{LocationCatalog, LocationEntry, Point};
pub use state::{Agent, DockedWith, HistoryEntry, Obstacle, Pose, WorldState};
