//! Tandem - 观察者 / 搬运机器人双智能体任务编排
//!
//! 入口：初始化日志、加载配置、运行一次任务，并以 JSON 输出 {"success": bool}。
//! 用法：tandem [config.toml]

use std::path::PathBuf;

use anyhow::Context;
use tandem::config::load_config;
use tandem::core::run_configured_task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tandem::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let report = run_configured_task(&cfg, None)
        .await
        .context("Failed to start task")?;

    tracing::info!(phase = ?report.phase, steps = report.world.step, "run finished");
    println!(
        "{}",
        serde_json::to_string(&report.outcome()).context("Failed to encode outcome")?
    );
    Ok(())
}
