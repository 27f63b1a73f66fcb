//! HTTP 桥接驱动：以 JSON 请求调用搬运机器人桥接服务
//!
//! 查询：GET /pose、GET /moving_shelf_id；命令：POST /move_to_location、/move_to_pose、
//! /rotate_in_place、/dock_shelf、/undock_shelf、/return_shelf、/speak。
//! 命令响应为 `{"success": bool, "error": "..."}`，success=false 视为 Rejected。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::DeviceError;
use crate::devices::CarrierDriver;
use crate::world::Pose;

#[derive(Debug, Deserialize)]
struct CommandReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoseReply {
    x: f64,
    y: f64,
    theta: f64,
}

#[derive(Debug, Deserialize)]
struct ShelfReply {
    #[serde(default)]
    shelf_id: Option<String>,
}

pub struct HttpCarrierDriver {
    client: Client,
    base_url: String,
}

fn map_reqwest(path: &str, e: reqwest::Error) -> DeviceError {
    if e.is_timeout() {
        DeviceError::Timeout(path.to_string())
    } else {
        DeviceError::Transport(format!("{}: {}", path, e))
    }
}

impl HttpCarrierDriver {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn query<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, DeviceError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| map_reqwest(path, e))?;
        if !resp.status().is_success() {
            return Err(DeviceError::Rejected(format!("{} -> HTTP {}", path, resp.status())));
        }
        resp.json::<T>().await.map_err(|e| map_reqwest(path, e))
    }

    async fn command(&self, path: &str, body: Value) -> Result<(), DeviceError> {
        tracing::debug!(path, body = %body, "carrier command");
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest(path, e))?;
        if !resp.status().is_success() {
            return Err(DeviceError::Rejected(format!("{} -> HTTP {}", path, resp.status())));
        }
        let reply: CommandReply = resp.json().await.map_err(|e| map_reqwest(path, e))?;
        if reply.success {
            Ok(())
        } else {
            Err(DeviceError::Rejected(format!(
                "{}: {}",
                path,
                reply.error.unwrap_or_else(|| "unspecified error".to_string())
            )))
        }
    }
}

#[async_trait]
impl CarrierDriver for HttpCarrierDriver {
    async fn pose(&self) -> Result<Pose, DeviceError> {
        let p: PoseReply = self.query("pose").await?;
        Ok(Pose::new(p.x, p.y, p.theta))
    }

    async fn move_to_location(&self, location_id: &str) -> Result<(), DeviceError> {
        self.command("move_to_location", json!({ "location_id": location_id }))
            .await
    }

    async fn move_to_pose(&self, x: f64, y: f64, heading: f64) -> Result<(), DeviceError> {
        self.command("move_to_pose", json!({ "x": x, "y": y, "yaw": heading }))
            .await
    }

    async fn rotate_in_place(&self, angle: f64) -> Result<(), DeviceError> {
        self.command("rotate_in_place", json!({ "angle": angle })).await
    }

    async fn dock(&self) -> Result<(), DeviceError> {
        self.command("dock_shelf", json!({})).await
    }

    async fn undock(&self) -> Result<(), DeviceError> {
        self.command("undock_shelf", json!({})).await
    }

    async fn return_shelf_home(&self) -> Result<(), DeviceError> {
        self.command("return_shelf", json!({})).await
    }

    async fn docked_shelf_id(&self) -> Result<Option<String>, DeviceError> {
        let reply: ShelfReply = self.query("moving_shelf_id").await?;
        Ok(reply.shelf_id.filter(|id| !id.is_empty()))
    }

    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        self.command("speak", json!({ "text": text })).await
    }
}
