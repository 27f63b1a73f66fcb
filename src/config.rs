//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TANDEM__*` 覆盖（双下划线表示嵌套，如 `TANDEM__APP__MAX_STEPS=10`）。
//! 所有字段都有默认值，空配置即可运行（模拟设备 + Scripted LLM）。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::TaskError;
use crate::orchestration::{
    CoordinatorSettings, LoopSettings, ShelfIds, DEFAULT_APPROACH_DISTANCE,
    DEFAULT_ARRIVAL_MESSAGE, DEFAULT_RELEVANCE_THRESHOLD, MAX_STEPS,
};
use crate::world::{LocationCatalog, Point};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub world: WorldSection,
    pub shelves: ShelvesSection,
    pub carrier: CarrierSection,
    pub timing: TimingSection,
    pub perception: PerceptionSection,
    pub speech: SpeechSection,
    pub prompts: PromptsSection,
    pub metrics: MetricsSection,
}

/// [app] 段：步数上限与收尾时的 home 地点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    pub max_steps: usize,
    pub home_location: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_steps: MAX_STEPS,
            home_location: "entrance".to_string(),
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock；openai 还需要 OPENAI_API_KEY
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    /// token 用量日志路径；空字符串表示不写
    pub usage_log: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            base_url: None,
            temperature: 1.0,
            usage_log: "token_usage.log".to_string(),
        }
    }
}

/// 单个地点：驱动 ID + 可选坐标
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub id: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl LocationConfig {
    fn new(id: &str, coords: Option<(f64, f64)>) -> Self {
        Self {
            id: id.to_string(),
            x: coords.map(|c| c.0),
            y: coords.map(|c| c.1),
        }
    }

    fn point(&self) -> Option<Point> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        }
    }
}

/// [world] 段：起始位置、特殊地名与地点目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub observer_start: String,
    pub carrier_start: String,
    pub obstacle_zone: String,
    pub at_obstacle: String,
    pub locations: BTreeMap<String, LocationConfig>,
}

fn default_locations() -> BTreeMap<String, LocationConfig> {
    [
        ("entrance", LocationConfig::new("home", Some((0.0, 0.0)))),
        ("refrigerator_front", LocationConfig::new("L01", Some((5.736, -0.039)))),
        ("kitchen", LocationConfig::new("L02", Some((3.11, 0.13)))),
        ("living_room", LocationConfig::new("L03", Some((1.739, -0.222)))),
        ("safe_zone", LocationConfig::new("L04", None)),
        ("obstacle_zone", LocationConfig::new("L05", None)),
        ("observer_shelf_home", LocationConfig::new("S02_home", None)),
        ("obstacle_shelf_home", LocationConfig::new("S03_home", None)),
    ]
    .into_iter()
    .map(|(name, loc)| (name.to_string(), loc))
    .collect()
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            observer_start: "kitchen".to_string(),
            carrier_start: "entrance".to_string(),
            obstacle_zone: "obstacle_zone".to_string(),
            at_obstacle: "at_obstacle".to_string(),
            locations: default_locations(),
        }
    }
}

/// [shelves] 段：观察者货架与障碍物货架的驱动 ID
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShelvesSection {
    pub observer: String,
    pub obstacle: String,
}

impl Default for ShelvesSection {
    fn default() -> Self {
        let ids = ShelfIds::default();
        Self {
            observer: ids.observer,
            obstacle: ids.obstacle,
        }
    }
}

/// [carrier] 段：驱动后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CarrierSection {
    /// http / sim
    pub backend: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub approach_distance: f64,
}

impl Default for CarrierSection {
    fn default() -> Self {
        Self {
            backend: "sim".to_string(),
            endpoint: "http://127.0.0.1:26400".to_string(),
            request_timeout_secs: 60,
            approach_distance: DEFAULT_APPROACH_DISTANCE,
        }
    }
}

/// [timing] 段（毫秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub settle_ms: u64,
    pub wait_ms: u64,
    pub step_pause_ms: u64,
    pub failure_pause_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            wait_ms: 1000,
            step_pause_ms: 500,
            failure_pause_ms: 1000,
        }
    }
}

/// [perception] 段：障碍物感知脚本；未配置 program 时视为始终无障碍
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerceptionSection {
    pub relevance_threshold: f64,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for PerceptionSection {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            program: None,
            args: Vec::new(),
            timeout_secs: 60,
        }
    }
}

/// [speech] 段：观察者播报脚本与到达提示语
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub enabled: bool,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub arrival_message: String,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: false,
            program: None,
            args: Vec::new(),
            timeout_secs: 10,
            arrival_message: DEFAULT_ARRIVAL_MESSAGE.to_string(),
        }
    }
}

/// [prompts] 段：两个规划器的模板路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    pub observer: PathBuf,
    pub carrier: PathBuf,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            observer: PathBuf::from("config/prompts/observer.json"),
            carrier: PathBuf::from("config/prompts/carrier.json"),
        }
    }
}

/// [metrics] 段：是否启用耗时 / token 计量
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
}

impl AppConfig {
    /// 由 [world.locations] 构建地点目录；驱动 ID 重复时报错
    pub fn location_catalog(&self) -> Result<LocationCatalog, TaskError> {
        let mut catalog = LocationCatalog::new();
        for (name, loc) in &self.world.locations {
            catalog.insert(name.as_str(), loc.id.as_str(), loc.point())?;
        }
        for required in [&self.world.observer_start, &self.world.carrier_start, &self.app.home_location] {
            if !catalog.contains(required) {
                return Err(TaskError::Config(format!(
                    "location '{required}' is not in [world.locations]"
                )));
            }
        }
        Ok(catalog)
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            shelves: ShelfIds {
                observer: self.shelves.observer.clone(),
                obstacle: self.shelves.obstacle.clone(),
            },
            obstacle_zone: self.world.obstacle_zone.clone(),
            at_obstacle: self.world.at_obstacle.clone(),
            arrival_message: self.speech.arrival_message.clone(),
            relevance_threshold: self.perception.relevance_threshold,
            approach_distance: self.carrier.approach_distance,
            settle: Duration::from_millis(self.timing.settle_ms),
            wait: Duration::from_millis(self.timing.wait_ms),
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_steps: self.app.max_steps,
            observer_start: self.world.observer_start.clone(),
            carrier_start: self.world.carrier_start.clone(),
            home_location: self.app.home_location.clone(),
            step_pause: Duration::from_millis(self.timing.step_pause_ms),
            failure_pause: Duration::from_millis(self.timing.failure_pause_ms),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TANDEM__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TANDEM__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TANDEM")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
