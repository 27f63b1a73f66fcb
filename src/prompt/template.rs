//! Prompt 模板：JSON 文件 → 规划器输入文本
//!
//! 模板字段：role、world_overview.goal、rules、instruction、output_format。
//! instruction 中的占位符 {history}、{world_state}、{observer_action} 在渲染时替换。

use std::path::Path;

use serde::Deserialize;

use crate::core::TaskError;
use crate::world::WorldState;

/// 没有观察者提议时 {observer_action} 的替换文本
pub const NO_OBSERVER_ACTION: &str = "(no prior proposal from the observer)";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldOverview {
    #[serde(default)]
    pub goal: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 输出格式：带说明的条目列表，或纯文本行
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputFormat {
    Described(Vec<FormatItem>),
    Plain(Vec<String>),
}

impl OutputFormat {
    fn lines(&self) -> Vec<String> {
        match self {
            OutputFormat::Described(items) => items
                .iter()
                .map(|i| {
                    format!(
                        "- {}: {}",
                        i.name.as_deref().unwrap_or("N/A"),
                        i.description.as_deref().unwrap_or("N/A")
                    )
                })
                .collect(),
            OutputFormat::Plain(lines) => lines.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub world_overview: WorldOverview,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
}

impl PromptTemplate {
    pub fn from_json_str(raw: &str) -> Result<Self, TaskError> {
        serde_json::from_str(raw).map_err(|e| TaskError::Prompt(format!("invalid template: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, TaskError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TaskError::Prompt(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
            .map_err(|e| TaskError::Prompt(format!("{}: {}", path.display(), e)))
    }

    /// 组装完整 prompt；observer_action 仅在搬运机器人规划时提供
    pub fn render(&self, world: &WorldState, observer_action: Option<&str>) -> String {
        let mut parts = Vec::with_capacity(5);

        parts.push(format!(
            "== Role ==\n{}",
            self.role.as_deref().unwrap_or("(role not set)")
        ));
        parts.push(format!(
            "== World overview ==\nGoal: {}",
            self.world_overview.goal.as_deref().unwrap_or("(goal not set)")
        ));
        parts.push(format!("== Rules ==\n{}", self.rules.join("\n")));

        let history = world
            .history()
            .iter()
            .map(|h| format!("- {}: {}", h.agent, h.action))
            .collect::<Vec<_>>()
            .join("\n");
        let instruction = self
            .instruction
            .as_deref()
            .unwrap_or("(no instruction)")
            .replace("{history}", &history)
            .replace("{world_state}", &world.prompt_summary())
            .replace("{observer_action}", observer_action.unwrap_or(NO_OBSERVER_ACTION));
        parts.push(instruction);

        if let Some(format) = &self.output_format {
            let lines = format.lines();
            if !lines.is_empty() {
                parts.push(format!(
                    "\nAnswer in the following format:\n{}",
                    lines.join("\n")
                ));
            }
        }

        parts.join("\n\n")
    }
}
