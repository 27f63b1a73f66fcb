//! Planner：渲染模板并向 LLM 发起单次查询
//!
//! 不重试；任何服务错误或空回复都降级为 WAIT，不会中断任务。

use std::sync::Arc;

use crate::llm::{LlmClient, Message};
use crate::prompt::PromptTemplate;
use crate::world::WorldState;

/// 规划器失败时的降级指令
pub const FALLBACK_ACTION: &str = "WAIT";

pub struct Planner {
    name: &'static str,
    llm: Arc<dyn LlmClient>,
    template: PromptTemplate,
}

impl Planner {
    pub fn new(name: &'static str, llm: Arc<dyn LlmClient>, template: PromptTemplate) -> Self {
        Self {
            name,
            llm,
            template,
        }
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 查询下一步动作；observer_action 为观察者的原始提议（仅搬运机器人规划器使用）
    pub async fn propose(&self, world: &WorldState, observer_action: Option<&str>) -> String {
        let prompt = self.template.render(world, observer_action);
        tracing::debug!(planner = self.name, prompt_len = prompt.len(), "querying planner");

        match self.llm.complete(&[Message::user(prompt)]).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!(planner = self.name, "empty planner reply, falling back to WAIT");
                FALLBACK_ACTION.to_string()
            }
            Err(e) => {
                tracing::warn!(planner = self.name, error = %e, "planner query failed, falling back to WAIT");
                FALLBACK_ACTION.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedLlmClient, ScriptedReply};
    use crate::world::LocationCatalog;

    fn world() -> WorldState {
        WorldState::new("kitchen", "entrance", Arc::new(LocationCatalog::new()))
    }

    fn template() -> PromptTemplate {
        PromptTemplate::from_json_str(r#"{"instruction": "Observer said: {observer_action}"}"#).unwrap()
    }

    #[tokio::test]
    async fn test_reply_is_trimmed() {
        let llm = Arc::new(ScriptedLlmClient::new(["  CALL Kachaka to kitchen \n"]));
        let planner = Planner::new("observer", llm, template());
        assert_eq!(planner.propose(&world(), None).await, "CALL Kachaka to kitchen");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_wait() {
        let llm = Arc::new(ScriptedLlmClient::from_replies(vec![
            ScriptedReply::Failure("timeout".into()),
            ScriptedReply::Text("   ".into()),
        ]));
        let planner = Planner::new("observer", llm, template());
        assert_eq!(planner.propose(&world(), None).await, FALLBACK_ACTION);
        assert_eq!(planner.propose(&world(), None).await, FALLBACK_ACTION);
    }

    #[tokio::test]
    async fn test_observer_action_reaches_prompt() {
        let llm = Arc::new(ScriptedLlmClient::new(["DOCK"]));
        let planner = Planner::new("carrier", llm.clone(), template());
        planner.propose(&world(), Some("clear the path")).await;
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Observer said: clear the path"));
    }
}
