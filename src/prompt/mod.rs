//! Prompt 模板加载与渲染

pub mod template;

pub use template::{FormatItem, OutputFormat, PromptTemplate, WorldOverview, NO_OBSERVER_ACTION};
