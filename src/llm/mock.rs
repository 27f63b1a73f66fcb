//! Scripted LLM 客户端（用于测试与离线演练，无需 API）
//!
//! 按顺序弹出预置回复；脚本耗尽后固定回复 WAIT。也可注入一次性的传输失败。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

/// 脚本耗尽后的默认回复
pub const SCRIPT_EXHAUSTED_REPLY: &str = "WAIT";

/// 单条脚本：正常回复或模拟的服务错误
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Failure(String),
}

#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
    requests: AtomicU64,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|s| ScriptedReply::Text(s.into()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn from_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// 已收到的 prompt（按请求顺序），供测试断言
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt);
        }

        let next = self
            .replies
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front();
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(reason)) => Err(reason),
            None => Ok(SCRIPT_EXHAUSTED_REPLY.to_string()),
        }
    }

    fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_wait() {
        let llm = ScriptedLlmClient::new(["CALL Kachaka to kitchen", "SPEAK at kitchen"]);
        let msgs = [Message::user("prompt")];
        assert_eq!(llm.complete(&msgs).await.unwrap(), "CALL Kachaka to kitchen");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "SPEAK at kitchen");
        assert_eq!(llm.complete(&msgs).await.unwrap(), SCRIPT_EXHAUSTED_REPLY);
        assert_eq!(llm.request_count(), 3);
        assert_eq!(llm.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let llm = ScriptedLlmClient::from_replies(vec![ScriptedReply::Failure(
            "connection reset".to_string(),
        )]);
        let err = llm.complete(&[Message::user("x")]).await.unwrap_err();
        assert_eq!(err, "connection reset");
    }
}
