//! 调和循环：发现 Agent → 到期判断 → 推理 → 提交结果与执行记忆
//!
//! 单个 Agent 的失败只影响它自己：记录日志后留到下一个 tick，不会中断同一 tick 内的其它 Agent。
//! 同一 Agent 的读、生成、提交、写记忆严格按程序顺序执行；不同 Agent 之间并发且无顺序保证。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::agent::{execution_key, execution_memory_value, AgentId, Identity};
use crate::config::SchedulerSection;
use crate::core::{Clock, HiveError, PeriodicTask};
use crate::ledger::LedgerGateway;
use crate::llm::ReasoningGateway;
use crate::scheduler::context::build_context_prompt;

/// 失败发生在哪一步
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Read,
    Generate,
    Commit,
}

/// 单个 Agent 在一次 tick 中的结果
#[derive(Clone, Debug)]
pub enum AgentOutcome {
    Inactive,
    NotDue,
    Committed {
        execution_count: u64,
    },
    /// 结果已提交，但执行记忆写入失败；提交不回滚
    CommittedWithoutMemory {
        execution_count: u64,
        error: HiveError,
    },
    Failed {
        stage: FailureStage,
        error: HiveError,
    },
}

/// 一次 tick 的汇总（同时作为调度器的可观测状态保存）
#[derive(Clone, Debug, Default, Serialize)]
pub struct TickReport {
    pub tick_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub discovered: usize,
    pub inactive: usize,
    pub not_due: usize,
    pub committed: usize,
    pub committed_without_memory: usize,
    pub read_failed: usize,
    pub generation_failed: usize,
    pub commit_failed: usize,
    /// 分页发现中途失败的原因（已发现的 Agent 仍会处理）
    pub discovery_error: Option<String>,
}

impl TickReport {
    fn record(&mut self, outcome: &AgentOutcome) {
        match outcome {
            AgentOutcome::Inactive => self.inactive += 1,
            AgentOutcome::NotDue => self.not_due += 1,
            AgentOutcome::Committed { .. } => self.committed += 1,
            AgentOutcome::CommittedWithoutMemory { .. } => self.committed_without_memory += 1,
            AgentOutcome::Failed { stage, .. } => match stage {
                FailureStage::Read => self.read_failed += 1,
                FailureStage::Generate => self.generation_failed += 1,
                FailureStage::Commit => self.commit_failed += 1,
            },
        }
    }

    pub fn failed(&self) -> usize {
        self.read_failed + self.generation_failed + self.commit_failed
    }
}

pub struct Reconciler {
    ledger: Arc<dyn LedgerGateway>,
    reasoning: Arc<ReasoningGateway>,
    clock: Arc<dyn Clock>,
    commit_actor: Identity,
    settings: SchedulerSection,
    last_report: RwLock<Option<TickReport>>,
    ticks: std::sync::atomic::AtomicU64,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        reasoning: Arc<ReasoningGateway>,
        clock: Arc<dyn Clock>,
        commit_actor: Identity,
        settings: SchedulerSection,
    ) -> Self {
        Self {
            ledger,
            reasoning,
            clock,
            commit_actor,
            settings,
            last_report: RwLock::new(None),
            ticks: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn min_interval(&self) -> Duration {
        self.settings.min_interval()
    }

    pub async fn last_report(&self) -> Option<TickReport> {
        self.last_report.read().await.clone()
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// 执行一轮调和
    pub async fn run_tick(&self) -> TickReport {
        let tick_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let mut report = TickReport {
            tick_id: tick_id.clone(),
            started_at: Some(self.clock.now()),
            ..TickReport::default()
        };

        let (ids, discovery_error) = self.discover().await;
        if let Some(err) = &discovery_error {
            tracing::error!(tick = %tick_id, "Agent discovery stopped early: {}", err);
        }
        report.discovered = ids.len();
        report.discovery_error = discovery_error.map(|e| e.to_string());

        let concurrency = self.settings.max_concurrent_agents.max(1);
        let outcomes: Vec<(AgentId, AgentOutcome)> = stream::iter(ids)
            .map(|id| async move { (id, self.reconcile_agent(id).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (_, outcome) in &outcomes {
            report.record(outcome);
        }
        report.finished_at = Some(self.clock.now());
        let (prompt_tokens, completion_tokens, _) = self.reasoning.token_usage();

        tracing::info!(
            tick = %tick_id,
            discovered = report.discovered,
            committed = report.committed + report.committed_without_memory,
            skipped_inactive = report.inactive,
            skipped_not_due = report.not_due,
            failed = report.failed(),
            prompt_tokens,
            completion_tokens,
            "Reconciliation tick finished"
        );

        *self.last_report.write().await = Some(report.clone());
        self.ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        report
    }

    /// 分页读取全部 id，直到注册表耗尽或达到 max_scan
    async fn discover(&self) -> (Vec<AgentId>, Option<HiveError>) {
        let page_size = self.settings.page_size.max(1);
        let max_scan = self.settings.max_scan;
        let mut ids = Vec::new();
        let mut offset = 0usize;

        while ids.len() < max_scan {
            let limit = page_size.min(max_scan - ids.len());
            let page = match self.ledger.read_registry_page(offset, limit).await {
                Ok(page) => page,
                Err(e) => return (ids, Some(e)),
            };
            if page.ids.is_empty() {
                break;
            }
            offset += page.ids.len();
            let more = page.has_more();
            ids.extend(page.ids);
            if !more {
                break;
            }
        }
        (ids, None)
    }

    /// 处理单个 Agent；所有错误都在这里被吸收为 AgentOutcome
    pub async fn reconcile_agent(&self, id: AgentId) -> AgentOutcome {
        let agent = match self.ledger.read_agent(id).await {
            Ok(agent) => agent,
            Err(error) => {
                tracing::warn!(agent_id = %id, "Failed to read agent: {}", error);
                return AgentOutcome::Failed {
                    stage: FailureStage::Read,
                    error,
                };
            }
        };

        if !agent.is_active {
            tracing::debug!(agent_id = %id, "Skipping inactive agent");
            return AgentOutcome::Inactive;
        }
        if !agent.is_due(self.clock.now(), self.min_interval()) {
            tracing::debug!(agent_id = %id, "Agent not due yet");
            return AgentOutcome::NotDue;
        }

        let prompt = build_context_prompt(&agent, self.settings.context_memories);
        let text = match self.reasoning.generate(&prompt).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(agent_id = %id, "Generation failed, deferring to next tick: {}", error);
                return AgentOutcome::Failed {
                    stage: FailureStage::Generate,
                    error,
                };
            }
        };
        let generated_at = self.clock.now();
        let count_before = agent.execution_count;

        if let Err(error) = self
            .ledger
            .submit_result_commit(&self.commit_actor, id, &text)
            .await
        {
            tracing::warn!(agent_id = %id, "Result commit failed: {}", error);
            return AgentOutcome::Failed {
                stage: FailureStage::Commit,
                error,
            };
        }

        let key = execution_key(count_before);
        let value = execution_memory_value(generated_at, &text, self.settings.memory_preview_chars);
        match self
            .ledger
            .submit_memory_update(&self.commit_actor, id, &key, &value)
            .await
        {
            Ok(_) => {
                tracing::info!(agent_id = %id, execution = count_before + 1, "Agent advanced");
                AgentOutcome::Committed {
                    execution_count: count_before + 1,
                }
            }
            Err(error) => {
                tracing::warn!(
                    agent_id = %id,
                    key = %key,
                    "Result committed but execution memory failed: {}",
                    error
                );
                AgentOutcome::CommittedWithoutMemory {
                    execution_count: count_before + 1,
                    error,
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl PeriodicTask for Reconciler {
    fn name(&self) -> &'static str {
        "reconciler"
    }

    async fn tick(&self) {
        self.run_tick().await;
    }
}
