//! 地点目录：符号地名 ↔ 驱动地点 ID（双射）+ 可选世界坐标
//!
//! 任务开始时构建一次，运行期间只读，由 WorldState 通过 Arc 共享。

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::TaskError;

/// 世界坐标系中的二维点（米）
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 单个地点：驱动使用的地点 ID 与（若已测量）世界坐标
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationEntry {
    pub driver_id: String,
    pub coords: Option<Point>,
}

#[derive(Clone, Debug, Default)]
pub struct LocationCatalog {
    entries: BTreeMap<String, LocationEntry>,
    by_driver_id: HashMap<String, String>,
}

impl LocationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记地点；地名或驱动 ID 重复都会破坏双射，返回 Config 错误
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        driver_id: impl Into<String>,
        coords: Option<Point>,
    ) -> Result<(), TaskError> {
        let name = name.into();
        let driver_id = driver_id.into();
        if self.entries.contains_key(&name) {
            return Err(TaskError::Config(format!("duplicate location name '{name}'")));
        }
        if let Some(existing) = self.by_driver_id.get(&driver_id) {
            return Err(TaskError::Config(format!(
                "driver id '{driver_id}' is mapped to both '{existing}' and '{name}'"
            )));
        }
        self.by_driver_id.insert(driver_id.clone(), name.clone());
        self.entries.insert(name, LocationEntry { driver_id, coords });
        Ok(())
    }

    /// 链式构建，便于测试与默认目录
    pub fn with_location(
        mut self,
        name: &str,
        driver_id: &str,
        coords: Option<Point>,
    ) -> Result<Self, TaskError> {
        self.insert(name, driver_id, coords)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&LocationEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn driver_id(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.driver_id.as_str())
    }

    pub fn name_for_driver_id(&self, driver_id: &str) -> Option<&str> {
        self.by_driver_id.get(driver_id).map(String::as_str)
    }

    pub fn coords(&self, name: &str) -> Option<Point> {
        self.entries.get(name).and_then(|e| e.coords)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
