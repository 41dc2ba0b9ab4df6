//! 运行时上下文：进程启动时按配置构建一次，之后以引用传递（无全局单例）

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::Identity;
use crate::config::{AppConfig, HistoryBackend, SeedAgent};
use crate::core::{Clock, HiveError, SystemClock};
use crate::ledger::{InMemoryLedger, LedgerGateway, RetryConfig, RetryingLedger};
use crate::llm::{create_llm_from_config, ReasoningGateway};
use crate::monitor::{HealthSampler, JsonFileHistoryStore, MonitorHistory, SqliteHistoryStore};
use crate::scheduler::Reconciler;
use crate::service::AgentService;

pub struct HiveContext {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn LedgerGateway>,
    reasoning: Arc<ReasoningGateway>,
    history: Arc<MonitorHistory>,
}

impl HiveContext {
    pub fn build(config: AppConfig) -> Result<Self, HiveError> {
        Self::build_with_clock(config, Arc::new(SystemClock))
    }

    pub fn build_with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, HiveError> {
        let commit_actor = Identity::new(config.ledger.commit_actor.clone());
        if commit_actor.is_zero() {
            return Err(HiveError::InvalidArgument("ledger.commit_actor must not be empty".into()));
        }

        let base: Arc<dyn LedgerGateway> = Arc::new(InMemoryLedger::new(commit_actor, Arc::clone(&clock)));
        let ledger: Arc<dyn LedgerGateway> =
            Arc::new(RetryingLedger::new(base, RetryConfig::from_section(&config.ledger)));

        let llm = create_llm_from_config(&config.llm);
        let mut reasoning =
            ReasoningGateway::new(llm, Duration::from_secs(config.llm.request_timeout_secs.max(1)));
        if let Some(prompt) = config.llm.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            reasoning = reasoning.with_system_prompt(prompt);
        }

        let history = Arc::new(build_history(&config)?);

        Ok(Self {
            config,
            clock,
            ledger,
            reasoning: Arc::new(reasoning),
            history,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn ledger(&self) -> Arc<dyn LedgerGateway> {
        Arc::clone(&self.ledger)
    }

    pub fn history(&self) -> Arc<MonitorHistory> {
        Arc::clone(&self.history)
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.ledger(),
            Arc::clone(&self.reasoning),
            self.clock(),
            Identity::new(self.config.ledger.commit_actor.clone()),
            self.config.scheduler.clone(),
        )
    }

    pub fn sampler(&self) -> HealthSampler {
        HealthSampler::new(self.ledger(), self.clock(), self.history(), self.config.monitor.clone())
    }

    pub fn service(&self) -> AgentService {
        AgentService::new(self.ledger(), &self.config.service)
    }

    /// 注册配置中的种子 Agent；单个失败只记日志
    pub async fn seed_agents(&self) -> usize {
        let service = self.service();
        let mut created = 0;
        for SeedAgent { owner, goal } in &self.config.app.seed_agents {
            match service.create_agent(&Identity::new(owner.clone()), goal).await {
                Ok(agent) => {
                    created += 1;
                    tracing::info!(agent_id = %agent.id, owner = %owner, "Seed agent registered");
                }
                Err(e) => tracing::warn!(owner = %owner, "Seed agent rejected: {}", e),
            }
        }
        created
    }
}

fn build_history(config: &AppConfig) -> Result<MonitorHistory, HiveError> {
    let monitor = &config.monitor;
    match monitor.history_backend {
        HistoryBackend::Memory => Ok(MonitorHistory::new(monitor.history_cap)),
        HistoryBackend::Json => {
            let path = history_path(monitor.history_path.as_ref(), "data/monitor_history.json")?;
            MonitorHistory::with_store(monitor.history_cap, Arc::new(JsonFileHistoryStore::new(path)))
        }
        HistoryBackend::Sqlite => {
            let path = history_path(monitor.history_path.as_ref(), "data/monitor_history.db")?;
            let store = SqliteHistoryStore::open(&path)?;
            MonitorHistory::with_store(monitor.history_cap, Arc::new(store))
        }
    }
}

fn history_path(configured: Option<&PathBuf>, default: &str) -> Result<PathBuf, HiveError> {
    let path = configured.cloned().unwrap_or_else(|| PathBuf::from(default));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}
