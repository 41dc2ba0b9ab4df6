//! 调和循环 + 对外接口 + 健康采样 集成测试

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use hive::agent::{Agent, AgentId, Identity, RegistryPage};
use hive::config::{MonitorSection, SchedulerSection, ServiceSection};
use hive::core::{Clock, HiveError, ManualClock};
use hive::ledger::{InMemoryLedger, LedgerGateway, LedgerReceipt};
use hive::llm::{LlmClient, LlmError, Message, MockLlmClient, ReasoningGateway, Role};
use hive::monitor::{HealthSampler, MonitorHistory};
use hive::scheduler::{AgentOutcome, FailureStage, Reconciler};
use hive::service::AgentService;

const COMMITTER: &str = "hive-committer";

/// 记忆写入可注入失败的账本包装
struct FaultyLedger {
    inner: Arc<InMemoryLedger>,
    fail_memory: AtomicBool,
}

#[async_trait]
impl LedgerGateway for FaultyLedger {
    async fn read_agent(&self, id: AgentId) -> Result<Agent, HiveError> {
        self.inner.read_agent(id).await
    }

    async fn read_registry_page(&self, offset: usize, limit: usize) -> Result<RegistryPage, HiveError> {
        self.inner.read_registry_page(offset, limit).await
    }

    async fn read_owner_agents(&self, owner: &Identity) -> Result<Vec<AgentId>, HiveError> {
        self.inner.read_owner_agents(owner).await
    }

    async fn submit_registration(&self, caller: &Identity, goal: &str) -> Result<AgentId, HiveError> {
        self.inner.submit_registration(caller, goal).await
    }

    async fn submit_goal_update(&self, caller: &Identity, id: AgentId, goal: &str) -> Result<LedgerReceipt, HiveError> {
        self.inner.submit_goal_update(caller, id, goal).await
    }

    async fn submit_memory_update(
        &self,
        caller: &Identity,
        id: AgentId,
        key: &str,
        value: &str,
    ) -> Result<LedgerReceipt, HiveError> {
        if self.fail_memory.load(Ordering::SeqCst) {
            return Err(HiveError::Unavailable("ledger node unreachable".into()));
        }
        self.inner.submit_memory_update(caller, id, key, value).await
    }

    async fn submit_result_commit(&self, caller: &Identity, id: AgentId, text: &str) -> Result<LedgerReceipt, HiveError> {
        self.inner.submit_result_commit(caller, id, text).await
    }

    async fn submit_activation(&self, caller: &Identity, id: AgentId, active: bool) -> Result<LedgerReceipt, HiveError> {
        self.inner.submit_activation(caller, id, active).await
    }

    async fn submit_ownership_transfer(
        &self,
        caller: &Identity,
        id: AgentId,
        new_owner: &Identity,
    ) -> Result<LedgerReceipt, HiveError> {
        self.inner.submit_ownership_transfer(caller, id, new_owner).await
    }
}

/// 目标中含 "unreachable" 时推理失败，其它正常回显
struct GoalAwareClient;

#[async_trait]
impl LlmClient for GoalAwareClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if prompt.contains("unreachable") {
            return Err(LlmError::Network("connection refused".into()));
        }
        MockLlmClient.complete(messages).await
    }
}

struct Harness {
    clock: ManualClock,
    ledger: Arc<FaultyLedger>,
    service: AgentService,
    reconciler: Reconciler,
    sampler: HealthSampler,
}

fn harness(client: Arc<dyn LlmClient>) -> Harness {
    let clock = ManualClock::default();
    let inner = Arc::new(InMemoryLedger::new(Identity::new(COMMITTER), Arc::new(clock.clone())));
    let ledger = Arc::new(FaultyLedger {
        inner,
        fail_memory: AtomicBool::new(false),
    });
    let reasoning = Arc::new(ReasoningGateway::new(client, StdDuration::from_secs(5)));
    let reconciler = Reconciler::new(
        ledger.clone(),
        reasoning,
        Arc::new(clock.clone()),
        Identity::new(COMMITTER),
        SchedulerSection::default(),
    );
    let sampler = HealthSampler::new(
        ledger.clone(),
        Arc::new(clock.clone()),
        Arc::new(MonitorHistory::new(10)),
        MonitorSection::default(),
    );
    let service = AgentService::new(ledger.clone(), &ServiceSection::default());
    Harness {
        clock,
        ledger,
        service,
        reconciler,
        sampler,
    }
}

#[tokio::test]
async fn test_one_agent_failure_does_not_block_others() {
    let h = harness(Arc::new(GoalAwareClient));
    let alice = Identity::new("alice");
    let a = h.service.create_agent(&alice, "Contact the unreachable server").await.unwrap();
    let b = h.service.create_agent(&alice, "Write a haiku").await.unwrap();

    let report = h.reconciler.run_tick().await;
    assert_eq!(report.discovered, 2);
    assert_eq!(report.committed, 1);
    assert_eq!(report.generation_failed, 1);

    let a = h.service.get_agent(a.id).await.unwrap();
    assert_eq!(a.execution_count, 0);
    assert!(a.last_result.is_empty());
    assert_eq!(a.memory_count(), 0);

    let b = h.service.get_agent(b.id).await.unwrap();
    assert_eq!(b.execution_count, 1);
    assert!(b.last_result.contains("Write a haiku"));

    let history = h.service.get_execution_history(b.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].execution, 0);
    assert!(history[0].text.starts_with('['));
    assert!(history[0].text.contains("Write a haiku"));

    // 失败的 Agent 仍然到期，下个 tick 继续尝试
    let outcome = h.reconciler.reconcile_agent(a.id).await;
    assert!(matches!(
        outcome,
        AgentOutcome::Failed {
            stage: FailureStage::Generate,
            ..
        }
    ));
}

#[tokio::test]
async fn test_commit_stands_when_execution_memory_fails() {
    let h = harness(Arc::new(MockLlmClient));
    let alice = Identity::new("alice");
    let agent = h.service.create_agent(&alice, "Track rainfall").await.unwrap();

    h.ledger.fail_memory.store(true, Ordering::SeqCst);
    let outcome = h.reconciler.reconcile_agent(agent.id).await;
    assert!(matches!(
        outcome,
        AgentOutcome::CommittedWithoutMemory {
            execution_count: 1,
            ..
        }
    ));

    let snapshot = h.service.get_agent(agent.id).await.unwrap();
    assert_eq!(snapshot.execution_count, 1);
    assert!(snapshot.last_execution_time.is_some());
    assert_eq!(snapshot.memory_count(), 0);

    // 恢复后下一次执行使用新的计数作为 key
    h.ledger.fail_memory.store(false, Ordering::SeqCst);
    h.clock.advance(Duration::hours(1));
    let report = h.reconciler.run_tick().await;
    assert_eq!(report.committed, 1);
    let snapshot = h.service.get_agent(agent.id).await.unwrap();
    assert_eq!(snapshot.execution_count, 2);
    assert!(snapshot.get_memory("execution_1").is_some());
    assert!(snapshot.get_memory("execution_0").is_none());
}

#[tokio::test]
async fn test_owner_controls_and_monitor_view() {
    let h = harness(Arc::new(MockLlmClient));
    let alice = Identity::new("alice");
    let bob = Identity::new("bob");
    let a = h.service.create_agent(&alice, "Summarize news").await.unwrap();
    let b = h.service.create_agent(&bob, "Learn Rust").await.unwrap();
    h.service.set_active(&bob, b.id, false).await.unwrap();

    // 非所有者不能修改
    assert!(h.service.set_active(&alice, b.id, true).await.is_err());

    let report = h.reconciler.run_tick().await;
    assert_eq!(report.committed, 1);
    assert_eq!(report.inactive, 1);

    // 未到期：第二次 tick 不推进
    h.clock.advance(Duration::minutes(10));
    let report = h.reconciler.run_tick().await;
    assert_eq!(report.not_due, 1);
    assert_eq!(h.service.get_agent(a.id).await.unwrap().execution_count, 1);

    let sample = h.sampler.sample().await.unwrap().sample;
    assert_eq!(sample.total_agents, 2);
    assert_eq!(sample.active_agents, 1);
    assert_eq!(sample.total_executions, 1);
    assert_eq!(sample.recent_executions, 1);

    let last = h.sampler.history().last().await.unwrap();
    assert_eq!(last, sample);
    let hour = h.sampler.history().last_hour(h.clock.now()).await;
    assert_eq!(hour.count, 1);
    assert!((hour.average_active_agents - 1.0).abs() < f64::EPSILON);

    let stored = h.ledger.inner.agent_events(a.id).await;
    assert!(stored.len() >= 3);
}
