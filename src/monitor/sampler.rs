//! 健康采样：分页扫描全部 Agent，计算全局指标并追加到历史
//!
//! 只读，不修改任何 Agent。单个 Agent 的读取失败或健康检查只记日志，不影响整次扫描。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::agent::{Agent, AgentId};
use crate::config::MonitorSection;
use crate::core::{Clock, HiveError, PeriodicTask};
use crate::ledger::LedgerGateway;
use crate::monitor::history::within_window;
use crate::monitor::{HealthSample, MonitorHistory};

/// 建议性告警（只记录，不处理）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthAlert {
    /// 激活且执行过，但长时间没有新执行
    Stale { agent_id: AgentId, idle_hours: i64 },
    HighVolume { agent_id: AgentId, executions: u64 },
    MemoryHeavy { agent_id: AgentId, memories: usize },
}

/// 一次采样的完整结果
#[derive(Clone, Debug, Serialize)]
pub struct SampleReport {
    pub sample: HealthSample,
    pub alerts: Vec<HealthAlert>,
    pub scanned: usize,
    pub read_errors: usize,
}

pub struct HealthSampler {
    ledger: Arc<dyn LedgerGateway>,
    clock: Arc<dyn Clock>,
    history: Arc<MonitorHistory>,
    settings: MonitorSection,
}

impl HealthSampler {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        clock: Arc<dyn Clock>,
        history: Arc<MonitorHistory>,
        settings: MonitorSection,
    ) -> Self {
        Self {
            ledger,
            clock,
            history,
            settings,
        }
    }

    pub fn history(&self) -> &Arc<MonitorHistory> {
        &self.history
    }

    /// 单个 Agent 的健康检查
    pub fn check_agent(&self, agent: &Agent, now: DateTime<Utc>) -> Vec<HealthAlert> {
        let mut alerts = Vec::new();
        if agent.is_active && agent.execution_count > 0 {
            if let Some(last) = agent.last_execution_time {
                let idle = now - last;
                if idle > self.settings.stale_after() {
                    alerts.push(HealthAlert::Stale {
                        agent_id: agent.id,
                        idle_hours: idle.num_hours(),
                    });
                }
            }
        }
        if agent.execution_count > self.settings.high_volume_threshold {
            alerts.push(HealthAlert::HighVolume {
                agent_id: agent.id,
                executions: agent.execution_count,
            });
        }
        if agent.memory_count() > self.settings.memory_threshold {
            alerts.push(HealthAlert::MemoryHeavy {
                agent_id: agent.id,
                memories: agent.memory_count(),
            });
        }
        alerts
    }

    /// 采样一次并写入历史；分页首页读取失败时返回错误且不写历史
    pub async fn sample(&self) -> Result<SampleReport, HiveError> {
        let now = self.clock.now();
        let page_size = self.settings.page_size.max(1);
        let max_scan = self.settings.max_scan;

        let mut total_agents = 0usize;
        let mut active_agents = 0usize;
        let mut total_executions = 0u64;
        let mut recent_executions = 0usize;
        let mut alerts = Vec::new();
        let mut scanned = 0usize;
        let mut read_errors = 0usize;
        let mut offset = 0usize;

        while scanned < max_scan {
            let limit = page_size.min(max_scan - scanned);
            let page = match self.ledger.read_registry_page(offset, limit).await {
                Ok(page) => page,
                Err(e) if offset == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("Monitor stopped paging at offset {}: {}", offset, e);
                    break;
                }
            };
            total_agents = page.total;
            if page.ids.is_empty() {
                break;
            }
            offset += page.ids.len();
            let more = page.has_more();

            for id in page.ids {
                scanned += 1;
                let agent = match self.ledger.read_agent(id).await {
                    Ok(agent) => agent,
                    Err(e) => {
                        read_errors += 1;
                        tracing::warn!(agent_id = %id, "Monitor could not read agent: {}", e);
                        continue;
                    }
                };
                if agent.is_active {
                    active_agents += 1;
                }
                total_executions += agent.execution_count;
                if agent
                    .last_execution_time
                    .is_some_and(|t| within_window(t, now, Duration::hours(1)))
                {
                    recent_executions += 1;
                }
                for alert in self.check_agent(&agent, now) {
                    tracing::warn!(agent_id = %id, alert = ?alert, "Agent health alert");
                    alerts.push(alert);
                }
            }

            if !more {
                break;
            }
        }

        let sample = HealthSample {
            timestamp: now,
            total_agents,
            active_agents,
            total_executions,
            recent_executions,
        };
        self.history.append(sample.clone()).await?;

        tracing::info!(
            total_agents,
            active_agents,
            total_executions,
            recent_executions,
            alerts = alerts.len(),
            "Health sample recorded"
        );

        Ok(SampleReport {
            sample,
            alerts,
            scanned,
            read_errors,
        })
    }
}

#[async_trait::async_trait]
impl PeriodicTask for HealthSampler {
    fn name(&self) -> &'static str {
        "health-sampler"
    }

    async fn tick(&self) {
        if let Err(e) = self.sample().await {
            tracing::error!("Health sample failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Identity;
    use crate::core::ManualClock;
    use crate::ledger::testing::PageFailingLedger;
    use crate::ledger::InMemoryLedger;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        clock: ManualClock,
        sampler: HealthSampler,
    }

    fn fixture(settings: MonitorSection) -> Fixture {
        let clock = ManualClock::default();
        let ledger = Arc::new(InMemoryLedger::new(
            Identity::new("committer"),
            Arc::new(clock.clone()),
        ));
        let history = Arc::new(MonitorHistory::new(settings.history_cap));
        let sampler = HealthSampler::new(ledger.clone(), Arc::new(clock.clone()), history, settings);
        Fixture {
            ledger,
            clock,
            sampler,
        }
    }

    #[tokio::test]
    async fn test_sample_aggregates() {
        let f = fixture(MonitorSection::default());
        let alice = Identity::new("alice");
        let committer = Identity::new("committer");
        let a = f.ledger.submit_registration(&alice, "a").await.unwrap();
        let b = f.ledger.submit_registration(&alice, "b").await.unwrap();
        let c = f.ledger.submit_registration(&alice, "c").await.unwrap();

        f.ledger.submit_result_commit(&committer, a, "old").await.unwrap();
        f.clock.advance(Duration::hours(2));
        f.ledger.submit_result_commit(&committer, b, "r1").await.unwrap();
        f.ledger.submit_result_commit(&committer, b, "r2").await.unwrap();
        f.ledger.submit_activation(&alice, c, false).await.unwrap();

        let report = f.sampler.sample().await.unwrap();
        assert_eq!(report.sample.total_agents, 3);
        assert_eq!(report.sample.active_agents, 2);
        assert_eq!(report.sample.total_executions, 3);
        assert_eq!(report.sample.recent_executions, 1);
        assert!(report.alerts.is_empty());
        assert_eq!(f.sampler.history().len().await, 1);
    }

    #[tokio::test]
    async fn test_advisory_alerts() {
        let settings = MonitorSection {
            high_volume_threshold: 2,
            memory_threshold: 1,
            ..MonitorSection::default()
        };
        let f = fixture(settings);
        let alice = Identity::new("alice");
        let id = f.ledger.submit_registration(&alice, "busy").await.unwrap();
        for _ in 0..3 {
            f.ledger.submit_result_commit(&alice, id, "r").await.unwrap();
        }
        f.ledger.submit_memory_update(&alice, id, "k1", "v").await.unwrap();
        f.ledger.submit_memory_update(&alice, id, "k2", "v").await.unwrap();
        f.clock.advance(Duration::hours(7));

        let report = f.sampler.sample().await.unwrap();
        assert_eq!(report.alerts.len(), 3);
        assert!(report
            .alerts
            .iter()
            .any(|a| matches!(a, HealthAlert::Stale { idle_hours: 7, .. })));
        assert!(report
            .alerts
            .contains(&HealthAlert::HighVolume { agent_id: id, executions: 3 }));
        assert!(report
            .alerts
            .contains(&HealthAlert::MemoryHeavy { agent_id: id, memories: 2 }));

        // 停用后不再报告 Stale
        f.ledger.submit_activation(&alice, id, false).await.unwrap();
        let report = f.sampler.sample().await.unwrap();
        assert_eq!(report.alerts.len(), 2);
    }

    #[tokio::test]
    async fn test_sample_respects_max_scan() {
        let settings = MonitorSection {
            page_size: 3,
            max_scan: 4,
            ..MonitorSection::default()
        };
        let f = fixture(settings);
        let alice = Identity::new("alice");
        for i in 0..10 {
            f.ledger.submit_registration(&alice, &format!("g{i}")).await.unwrap();
        }
        let report = f.sampler.sample().await.unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.sample.total_agents, 10);
        assert_eq!(report.sample.active_agents, 4);
    }

    #[tokio::test]
    async fn test_empty_registry_sample() {
        let f = fixture(MonitorSection::default());
        let report = f.sampler.sample().await.unwrap();
        assert_eq!(report.sample.total_agents, 0);
        assert_eq!(report.scanned, 0);
        assert_eq!(f.sampler.history().len().await, 1);
    }

    fn paging_sampler(fail_from_offset: usize) -> (Arc<InMemoryLedger>, HealthSampler) {
        let clock = ManualClock::default();
        let inner = Arc::new(InMemoryLedger::new(
            Identity::new("committer"),
            Arc::new(clock.clone()),
        ));
        let settings = MonitorSection {
            page_size: 2,
            ..MonitorSection::default()
        };
        let sampler = HealthSampler::new(
            Arc::new(PageFailingLedger::new(inner.clone(), fail_from_offset)),
            Arc::new(clock),
            Arc::new(MonitorHistory::new(10)),
            settings,
        );
        (inner, sampler)
    }

    #[tokio::test]
    async fn test_first_page_failure_records_nothing() {
        let (inner, sampler) = paging_sampler(0);
        inner.submit_registration(&Identity::new("alice"), "g").await.unwrap();

        let err = sampler.sample().await.unwrap_err();
        assert!(err.is_transient());
        assert!(sampler.history().is_empty().await);
    }

    #[tokio::test]
    async fn test_later_page_failure_records_partial_sample() {
        let (inner, sampler) = paging_sampler(2);
        let alice = Identity::new("alice");
        for i in 0..5 {
            inner.submit_registration(&alice, &format!("g{i}")).await.unwrap();
        }

        let report = sampler.sample().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.sample.total_agents, 5);
        assert_eq!(report.sample.active_agents, 2);
        assert_eq!(sampler.history().len().await, 1);
    }

    #[tokio::test]
    async fn test_recent_window_includes_exact_hour() {
        let f = fixture(MonitorSection::default());
        let alice = Identity::new("alice");
        let id = f.ledger.submit_registration(&alice, "g").await.unwrap();
        f.ledger.submit_result_commit(&alice, id, "r").await.unwrap();

        f.clock.advance(Duration::hours(1));
        assert_eq!(f.sampler.sample().await.unwrap().sample.recent_executions, 1);
        f.clock.advance(Duration::seconds(1));
        assert_eq!(f.sampler.sample().await.unwrap().sample.recent_executions, 0);
    }

    #[tokio::test]
    async fn test_huge_stale_threshold_does_not_overflow() {
        let f = fixture(MonitorSection {
            stale_after_hours: i64::MAX,
            ..MonitorSection::default()
        });
        let alice = Identity::new("alice");
        let id = f.ledger.submit_registration(&alice, "g").await.unwrap();
        f.ledger.submit_result_commit(&alice, id, "r").await.unwrap();
        f.clock.advance(Duration::days(30));

        assert!(f.sampler.sample().await.unwrap().alerts.is_empty());
    }
}
