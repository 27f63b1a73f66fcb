//! 任务编排入口：按配置组装协作者并运行一次任务
//!
//! 负责：选择 LLM 后端、创建设备（HTTP / 模拟）、加载 prompt 模板、选择计量方式，
//! 然后把它们注入 Coordinator 与 TaskRunner。没有进程级单例，所有协作者随一次任务运行创建与释放。

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::{TaskError, TaskEvent, TaskReport};
use crate::devices::{
    CarrierDriver, HttpCarrierDriver, ObstacleSensor, RemoteCommand, RemoteObstacleSensor,
    RemoteSpeech, ScriptedSensor, SilentSpeech, SimulatedCarrier, SpeechOutput,
};
use crate::llm::{LlmClient, OpenAiClient, ScriptedLlmClient, UsageLog};
use crate::orchestration::{Coordinator, Devices, Planner, TaskRunner, TimingMetrics};
use crate::prompt::PromptTemplate;
use crate::world::{LocationCatalog, Pose};

const BUILTIN_OBSERVER_PROMPT: &str = include_str!("../../config/prompts/observer.json");
const BUILTIN_CARRIER_PROMPT: &str = include_str!("../../config/prompts/carrier.json");

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Scripted）
pub(crate) fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();

    match api_key {
        Some(key) if provider != "mock" => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            let mut client = OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(&key))
                .with_temperature(cfg.llm.temperature);
            if !cfg.llm.usage_log.is_empty() {
                client = client.with_usage_log(UsageLog::new(&cfg.llm.usage_log));
            }
            Arc::new(client)
        }
        _ => {
            tracing::warn!("No API key set or provider is mock, using scripted LLM (always WAIT)");
            Arc::new(ScriptedLlmClient::new(Vec::<String>::new()))
        }
    }
}

/// 创建设备；sim 后端以目录坐标初始化模拟器，并把观察者货架放在观察者起点
pub fn create_devices(cfg: &AppConfig, catalog: &LocationCatalog) -> Devices {
    let driver: Arc<dyn CarrierDriver> = match cfg.carrier.backend.to_lowercase().as_str() {
        "http" => {
            tracing::info!(endpoint = %cfg.carrier.endpoint, "Using HTTP carrier driver");
            Arc::new(HttpCarrierDriver::new(
                &cfg.carrier.endpoint,
                cfg.carrier.request_timeout_secs,
            ))
        }
        other => {
            if other != "sim" {
                tracing::warn!(backend = other, "unknown carrier backend, using simulator");
            }
            Arc::new(simulated_carrier(cfg, catalog))
        }
    };

    let sensor: Arc<dyn ObstacleSensor> = match &cfg.perception.program {
        Some(program) => Arc::new(RemoteObstacleSensor::new(
            RemoteCommand::new(
                program.as_str(),
                cfg.perception.args.clone(),
                cfg.perception.timeout_secs,
            ),
            cfg.shelves.obstacle.as_str(),
        )),
        None => {
            tracing::info!("no perception program configured, route is always clear");
            Arc::new(ScriptedSensor::new(Vec::new()))
        }
    };

    let speech: Arc<dyn SpeechOutput> = match (&cfg.speech.program, cfg.speech.enabled) {
        (Some(program), true) => Arc::new(RemoteSpeech::new(RemoteCommand::new(
            program.as_str(),
            cfg.speech.args.clone(),
            cfg.speech.timeout_secs,
        ))),
        _ => Arc::new(SilentSpeech),
    };

    Devices {
        driver,
        sensor,
        speech,
    }
}

fn simulated_carrier(cfg: &AppConfig, catalog: &LocationCatalog) -> SimulatedCarrier {
    let start = catalog
        .coords(&cfg.world.carrier_start)
        .map_or(Pose::new(0.0, 0.0, 0.0), |p| Pose::new(p.x, p.y, 0.0));
    let mut sim = SimulatedCarrier::new(start);
    for name in catalog.names() {
        if let (Some(id), Some(point)) = (catalog.driver_id(name), catalog.coords(name)) {
            sim = sim.with_location_pose(id, point);
        }
    }
    if let Some(id) = catalog.driver_id(&cfg.world.carrier_start) {
        sim = sim.with_location(id);
    }
    if let Some(id) = catalog.driver_id(&cfg.world.observer_start) {
        sim = sim.with_shelf(&cfg.shelves.observer, Some(id), None);
    }
    sim
}

/// 依次尝试 path、../path；都不存在时使用内置模板
fn load_template(path: &Path, builtin: &str) -> Result<PromptTemplate, TaskError> {
    let candidates = [path.to_path_buf(), Path::new("..").join(path)];
    match candidates.iter().find(|p| p.exists()) {
        Some(found) => PromptTemplate::load(found),
        None => {
            tracing::warn!(path = %path.display(), "prompt template not found, using built-in template");
            PromptTemplate::from_json_str(builtin)
        }
    }
}

/// 按配置组装所有协作者并运行一次任务
pub async fn run_configured_task(
    cfg: &AppConfig,
    event_tx: Option<&UnboundedSender<TaskEvent>>,
) -> Result<TaskReport, TaskError> {
    let catalog = Arc::new(cfg.location_catalog()?);
    let observer_template = load_template(&cfg.prompts.observer, BUILTIN_OBSERVER_PROMPT)?;
    let carrier_template = load_template(&cfg.prompts.carrier, BUILTIN_CARRIER_PROMPT)?;

    let llm = create_llm_from_config(cfg);
    let coordinator = Coordinator::new(
        Planner::new("observer", llm.clone(), observer_template),
        Planner::new("carrier", llm, carrier_template),
        create_devices(cfg, &catalog),
        cfg.coordinator_settings(),
    );

    let mut runner = TaskRunner::new(&coordinator, catalog, cfg.loop_settings());
    if let Some(tx) = event_tx {
        runner = runner.with_event_tx(tx);
    }

    let report = if cfg.metrics.enabled {
        let mut metrics = TimingMetrics::new();
        runner.run_with_metrics(&mut metrics).await
    } else {
        runner.run().await
    };
    Ok(report)
}
