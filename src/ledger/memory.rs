//! 进程内账本：单把读写锁给出全序，确认后的每次写入都追加一条不可变事件
//!
//! 写权限：目标 / 激活 / 转移只允许 owner；结果与记忆允许 owner 或配置的 commit actor。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::agent::{Agent, AgentId, Identity, Registry, RegistryPage};
use crate::core::{Clock, HiveError};
use crate::ledger::{LedgerGateway, LedgerReceipt};

/// 账本事件种类
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    Registered { owner: Identity, goal: String },
    GoalUpdated { goal: String },
    MemoryStored { key: String },
    ResultCommitted { execution_count: u64 },
    /// 设置为当前值时也会记录（changed = false）
    ActivationChanged { active: bool, changed: bool },
    OwnershipTransferred { from: Identity, to: Identity },
}

/// 只追加的审计事件
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    pub sequence: u64,
    pub at: DateTime<Utc>,
    pub agent_id: AgentId,
    pub actor: Identity,
    pub kind: LedgerEventKind,
}

#[derive(Default)]
struct LedgerState {
    registry: Registry,
    events: Vec<LedgerEvent>,
}

impl LedgerState {
    fn append(&mut self, at: DateTime<Utc>, agent_id: AgentId, actor: &Identity, kind: LedgerEventKind) -> LedgerReceipt {
        let sequence = self.events.len() as u64 + 1;
        self.events.push(LedgerEvent {
            sequence,
            at,
            agent_id,
            actor: actor.clone(),
            kind,
        });
        LedgerReceipt {
            sequence,
            confirmed_at: at,
        }
    }
}

pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    commit_actor: Identity,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new(commit_actor: Identity, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            commit_actor,
            clock,
        }
    }

    pub fn commit_actor(&self) -> &Identity {
        &self.commit_actor
    }

    /// 审计日志副本（按确认顺序）
    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.state.read().await.events.clone()
    }

    pub async fn agent_events(&self, id: AgentId) -> Vec<LedgerEvent> {
        self.state
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.agent_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn read_agent(&self, id: AgentId) -> Result<Agent, HiveError> {
        self.state.read().await.registry.get(id).cloned()
    }

    async fn read_registry_page(&self, offset: usize, limit: usize) -> Result<RegistryPage, HiveError> {
        self.state.read().await.registry.list_page(offset, limit)
    }

    async fn read_owner_agents(&self, owner: &Identity) -> Result<Vec<AgentId>, HiveError> {
        Ok(self.state.read().await.registry.list_by_owner(owner))
    }

    async fn submit_registration(&self, caller: &Identity, goal: &str) -> Result<AgentId, HiveError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let id = state.registry.register(caller.clone(), goal, now)?;
        state.append(
            now,
            id,
            caller,
            LedgerEventKind::Registered {
                owner: caller.clone(),
                goal: goal.to_string(),
            },
        );
        tracing::debug!(agent_id = %id, owner = %caller, "Agent registered");
        Ok(id)
    }

    async fn submit_goal_update(&self, caller: &Identity, id: AgentId, goal: &str) -> Result<LedgerReceipt, HiveError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.registry.get_mut(id)?.update_goal(caller, goal)?;
        Ok(state.append(now, id, caller, LedgerEventKind::GoalUpdated { goal: goal.to_string() }))
    }

    async fn submit_memory_update(
        &self,
        caller: &Identity,
        id: AgentId,
        key: &str,
        value: &str,
    ) -> Result<LedgerReceipt, HiveError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state
            .registry
            .get_mut(id)?
            .store_memory(caller, &self.commit_actor, key, value, now)?;
        Ok(state.append(now, id, caller, LedgerEventKind::MemoryStored { key: key.to_string() }))
    }

    async fn submit_result_commit(&self, caller: &Identity, id: AgentId, text: &str) -> Result<LedgerReceipt, HiveError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let agent = state.registry.get_mut(id)?;
        agent.commit_result(caller, &self.commit_actor, text, now)?;
        let execution_count = agent.execution_count;
        Ok(state.append(now, id, caller, LedgerEventKind::ResultCommitted { execution_count }))
    }

    async fn submit_activation(&self, caller: &Identity, id: AgentId, active: bool) -> Result<LedgerReceipt, HiveError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let changed = state.registry.get_mut(id)?.set_active(caller, active)?;
        Ok(state.append(now, id, caller, LedgerEventKind::ActivationChanged { active, changed }))
    }

    async fn submit_ownership_transfer(
        &self,
        caller: &Identity,
        id: AgentId,
        new_owner: &Identity,
    ) -> Result<LedgerReceipt, HiveError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state
            .registry
            .get_mut(id)?
            .transfer_ownership(caller, new_owner.clone())?;
        Ok(state.append(
            now,
            id,
            caller,
            LedgerEventKind::OwnershipTransferred {
                from: caller.clone(),
                to: new_owner.clone(),
            },
        ))
    }
}
