//! Token 使用日志
//!
//! 每次带 usage 的成功响应追加一行：`[2025-01-01 12:00:00] Prompt: 10, Completion: 5, Total: 15`。

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_line(timestamp: &str, prompt: u64, completion: u64) -> String {
        format!(
            "[{}] Prompt: {}, Completion: {}, Total: {}\n",
            timestamp,
            prompt,
            completion,
            prompt + completion
        )
    }

    /// 追加一行；写失败只记日志，不影响规划结果
    pub async fn append(&self, prompt: u64, completion: u64) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let line = Self::format_line(&timestamp, prompt, completion);
        if let Err(e) = self.write_line(&line).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append token usage");
        }
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
