//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Scripted）

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;
pub mod usage_log;

pub use message::{Message, Role};
pub use mock::{ScriptedLlmClient, ScriptedReply};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;
pub use usage_log::UsageLog;
