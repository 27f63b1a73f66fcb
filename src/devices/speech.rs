//! 观察者语音输出
//!
//! 由 Coordinator 以 fire-and-forget 方式调用：无顺序保证，失败只记日志。

use async_trait::async_trait;

use crate::core::DeviceError;
use crate::devices::RemoteCommand;

#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), DeviceError>;
}

/// 在语音主机上执行播报脚本
pub struct RemoteSpeech {
    command: RemoteCommand,
}

impl RemoteSpeech {
    pub fn new(command: RemoteCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl SpeechOutput for RemoteSpeech {
    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        let out = self.command.run_with_text(text).await?;
        if out.success {
            Ok(())
        } else {
            Err(DeviceError::Rejected(if out.stderr.is_empty() {
                "speech script exited with failure".to_string()
            } else {
                out.stderr
            }))
        }
    }
}

/// 语音关闭时使用：只写日志
#[derive(Debug, Default)]
pub struct SilentSpeech;

#[async_trait]
impl SpeechOutput for SilentSpeech {
    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        tracing::info!(text, "speech disabled, not relaying");
        Ok(())
    }
}
