//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__SCHEDULER__INTERVAL_SECS=30`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub ledger: LedgerSection,
    pub llm: LlmSection,
    pub scheduler: SchedulerSection,
    pub monitor: MonitorSection,
    pub service: ServiceSection,
}

/// [app] 段：应用名、启动时注册的种子 Agent
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default)]
    pub seed_agents: Vec<SeedAgent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAgent {
    pub owner: String,
    pub goal: String,
}

/// [ledger] 段：commit actor 身份、调用超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    /// 代表所有者写入结果与记忆的受信身份
    #[serde(default = "default_commit_actor")]
    pub commit_actor: String,
    #[serde(default = "default_ledger_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_commit_actor() -> String {
    "hive-committer".to_string()
}

fn default_ledger_call_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    5_000
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            commit_actor: default_commit_actor(),
            call_timeout_secs: default_ledger_call_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// [llm] 段：后端选择、提示词与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；最终由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    /// 单次推理调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            system_prompt: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// 时长类配置的上限：十年
pub const MAX_INTERVAL_SECS: u64 = 10 * 365 * 24 * 3600;
pub const MAX_STALE_AFTER_HOURS: i64 = 10 * 365 * 24;

/// [scheduler] 段：调和循环节奏、分页、限流
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_scheduler_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// 单次 tick 最多扫描的 Agent 数
    #[serde(default = "default_scheduler_max_scan")]
    pub max_scan: usize,
    /// 两次执行之间的最小间隔（秒）
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
    /// 拼入上下文的最近记忆条数
    #[serde(default = "default_context_memories")]
    pub context_memories: usize,
    /// 执行记忆中保留的结果字符数
    #[serde(default = "default_memory_preview_chars")]
    pub memory_preview_chars: usize,
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,
}

fn default_scheduler_interval() -> u64 {
    60
}

fn default_page_size() -> usize {
    100
}

fn default_scheduler_max_scan() -> usize {
    10_000
}

fn default_min_interval() -> u64 {
    3600
}

fn default_context_memories() -> usize {
    5
}

fn default_memory_preview_chars() -> usize {
    200
}

fn default_max_concurrent_agents() -> usize {
    4
}

impl SchedulerSection {
    /// 最小执行间隔，截断到 MAX_INTERVAL_SECS
    pub fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_interval_secs.min(MAX_INTERVAL_SECS) as i64)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_scheduler_interval(),
            page_size: default_page_size(),
            max_scan: default_scheduler_max_scan(),
            min_interval_secs: default_min_interval(),
            context_memories: default_context_memories(),
            memory_preview_chars: default_memory_preview_chars(),
            max_concurrent_agents: default_max_concurrent_agents(),
        }
    }
}

/// 监控历史后端
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// 仅内存
    #[default]
    Memory,
    Json,
    Sqlite,
}

/// [monitor] 段：采样节奏、扫描上限、健康阈值、历史存储
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_monitor_max_scan")]
    pub max_scan: usize,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// 激活且执行过的 Agent 超过该小时数未执行则告警
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: i64,
    #[serde(default = "default_high_volume_threshold")]
    pub high_volume_threshold: u64,
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: usize,
    #[serde(default)]
    pub history_backend: HistoryBackend,
    pub history_path: Option<PathBuf>,
}

fn default_monitor_interval() -> u64 {
    30
}

fn default_monitor_max_scan() -> usize {
    1000
}

fn default_history_cap() -> usize {
    1000
}

fn default_stale_after_hours() -> i64 {
    6
}

fn default_high_volume_threshold() -> u64 {
    1000
}

fn default_memory_threshold() -> usize {
    100
}

impl MonitorSection {
    /// 判定 Stale 的空闲时长，截断到 [0, MAX_STALE_AFTER_HOURS]
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours.clamp(0, MAX_STALE_AFTER_HOURS))
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
            page_size: default_page_size(),
            max_scan: default_monitor_max_scan(),
            history_cap: default_history_cap(),
            stale_after_hours: default_stale_after_hours(),
            high_volume_threshold: default_high_volume_threshold(),
            memory_threshold: default_memory_threshold(),
            history_backend: HistoryBackend::default(),
            history_path: None,
        }
    }
}

/// [service] 段：对外接口的分页上限
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: usize,
}

fn default_max_page_limit() -> usize {
    100
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            max_page_limit: default_max_page_limit(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
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
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    let cfg: AppConfig = c.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

impl AppConfig {
    /// 拒绝超出可表示范围的时长配置
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.scheduler.min_interval_secs > MAX_INTERVAL_SECS {
            return Err(config::ConfigError::Message(format!(
                "scheduler.min_interval_secs must be at most {}",
                MAX_INTERVAL_SECS
            )));
        }
        if !(0..=MAX_STALE_AFTER_HOURS).contains(&self.monitor.stale_after_hours) {
            return Err(config::ConfigError::Message(format!(
                "monitor.stale_after_hours must be within 0..={}",
                MAX_STALE_AFTER_HOURS
            )));
        }
        Ok(())
    }
}
