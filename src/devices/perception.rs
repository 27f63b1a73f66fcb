//! 障碍物感知：远程脚本输出 NO_OBSTACLE 或 JSON 世界坐标
//!
//! 三种结果必须区分：无障碍、检测到障碍、输出异常。输出异常按「无障碍」处理但需告警。

use async_trait::async_trait;
use serde_json::Value;

use crate::devices::RemoteCommand;
use crate::world::Point;

/// 远程脚本在无障碍时输出的哨兵值
pub const NO_OBSTACLE_SENTINEL: &str = "NO_OBSTACLE";

/// 感知服务报告的候选障碍物
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleReport {
    pub id: String,
    pub coords: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObstacleScan {
    Clear,
    Detected(ObstacleReport),
    /// 输出无法解析或通道出错；原因用于日志
    Malformed(String),
}

#[async_trait]
pub trait ObstacleSensor: Send + Sync {
    async fn scan(&self) -> ObstacleScan;
}

/// 解析脚本输出：stdout 优先，stderr 只在出错时作为原因
pub fn parse_scan_output(stdout: &str, stderr: &str, obstacle_id: &str) -> ObstacleScan {
    let stdout = stdout.trim();
    if stdout == NO_OBSTACLE_SENTINEL {
        if !stderr.is_empty() {
            tracing::debug!(log = %stderr, "perception script log");
        }
        return ObstacleScan::Clear;
    }

    match serde_json::from_str::<Value>(stdout) {
        Ok(value) => {
            let x = value.get("x_world").and_then(Value::as_f64);
            let y = value.get("y_world").and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => ObstacleScan::Detected(ObstacleReport {
                    id: obstacle_id.to_string(),
                    coords: Point::new(x, y),
                }),
                _ => ObstacleScan::Malformed(format!(
                    "coordinate keys x_world/y_world missing in {}",
                    stdout
                )),
            }
        }
        Err(_) if !stderr.is_empty() => {
            ObstacleScan::Malformed(format!("perception script error: {}", stderr))
        }
        Err(_) => ObstacleScan::Malformed(format!("unexpected perception output: '{}'", stdout)),
    }
}

/// 通过远程命令执行感知脚本
pub struct RemoteObstacleSensor {
    command: RemoteCommand,
    obstacle_id: String,
}

impl RemoteObstacleSensor {
    pub fn new(command: RemoteCommand, obstacle_id: impl Into<String>) -> Self {
        Self {
            command,
            obstacle_id: obstacle_id.into(),
        }
    }
}

#[async_trait]
impl ObstacleSensor for RemoteObstacleSensor {
    async fn scan(&self) -> ObstacleScan {
        match self.command.run().await {
            Ok(out) => parse_scan_output(&out.stdout, &out.stderr, &self.obstacle_id),
            Err(e) => ObstacleScan::Malformed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_clear_even_with_logs() {
        assert_eq!(
            parse_scan_output("NO_OBSTACLE\n", "initialising camera...", "S03"),
            ObstacleScan::Clear
        );
    }

    #[test]
    fn test_coordinates_detected() {
        let scan = parse_scan_output(r#"{"x_world": 3.2, "y_world": -0.4}"#, "", "S03");
        assert_eq!(
            scan,
            ObstacleScan::Detected(ObstacleReport {
                id: "S03".to_string(),
                coords: Point::new(3.2, -0.4),
            })
        );
    }

    #[test]
    fn test_missing_keys_is_malformed() {
        let scan = parse_scan_output(r#"{"x": 1.0}"#, "", "S03");
        assert!(matches!(scan, ObstacleScan::Malformed(reason) if reason.contains("x_world")));
    }

    #[test]
    fn test_garbage_is_malformed_not_clear() {
        let scan = parse_scan_output("", "Traceback: camera offline", "S03");
        assert!(matches!(scan, ObstacleScan::Malformed(reason) if reason.contains("camera offline")));
        let scan = parse_scan_output("???", "", "S03");
        assert!(matches!(scan, ObstacleScan::Malformed(_)));
    }

    #[tokio::test]
    async fn test_remote_sensor_runs_script() {
        let cmd = RemoteCommand::new(
            "sh",
            vec!["-c".into(), r#"echo '{"x_world": 1.0, "y_world": 2.0}'"#.into()],
            5,
        );
        let sensor = RemoteObstacleSensor::new(cmd, "S03");
        assert!(matches!(sensor.scan().await, ObstacleScan::Detected(_)));
    }

    #[tokio::test]
    async fn test_remote_sensor_channel_failure_is_malformed() {
        let cmd = RemoteCommand::new("definitely-not-a-real-binary-xyz", vec![], 5);
        let sensor = RemoteObstacleSensor::new(cmd, "S03");
        assert!(matches!(sensor.scan().await, ObstacleScan::Malformed(_)));
    }
}
