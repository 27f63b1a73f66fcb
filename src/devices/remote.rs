//! 远程命令通道：通过本地程序（通常是 ssh）在感知 / 语音主机上执行脚本
//!
//! 带超时与 tracing 审计；stdout 为数据，stderr 视为日志。

use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::core::DeviceError;

/// 单次执行结果
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// 预配置的远程命令：program + 固定参数 + 超时
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

/// POSIX 单引号转义，供经由 ssh 远端 shell 解析的参数使用
pub fn shell_quote(raw: &str) -> String {
    if !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,".contains(c))
    {
        return raw.to_string();
    }
    format!("'{}'", raw.replace('\'', r"'\''"))
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// 以固定参数执行
    pub async fn run(&self) -> Result<CommandOutput, DeviceError> {
        self.run_with(&self.args).await
    }

    /// 把参数中的 `{text}` 替换为转义后的文本；没有占位符时追加到末尾
    pub async fn run_with_text(&self, text: &str) -> Result<CommandOutput, DeviceError> {
        let quoted = shell_quote(text);
        let mut replaced = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                if a.contains("{text}") {
                    replaced = true;
                    a.replace("{text}", &quoted)
                } else {
                    a.clone()
                }
            })
            .collect();
        if !replaced {
            args.push(quoted);
        }
        self.run_with(&args).await
    }

    async fn run_with(&self, args: &[String]) -> Result<CommandOutput, DeviceError> {
        if self.program.trim().is_empty() {
            return Err(DeviceError::Rejected("no remote program configured".to_string()));
        }
        let start = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                DeviceError::Timeout(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DeviceError::Transport(format!("{}: {}", self.program, e)))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            success: output.status.success(),
        };
        tracing::info!(
            program = %self.program,
            ok = result.success,
            duration_ms = start.elapsed().as_millis() as u64,
            "remote command"
        );
        Ok(result)
    }
}
