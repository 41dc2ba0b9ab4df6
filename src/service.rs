//! 对外 Agent 接口（供请求层调用）
//!
//! 每个写操作提交到账本后重新读取，返回完整快照。鉴权在账本侧按 caller 校验。

use std::sync::Arc;

use serde::Serialize;

use crate::agent::{execution_history, Agent, AgentId, ExecutionEntry, Identity, MemoryEntry};
use crate::config::ServiceSection;
use crate::core::HiveError;
use crate::ledger::LedgerGateway;

/// 分页结果
#[derive(Clone, Debug, Serialize)]
pub struct AgentPage {
    pub agents: Vec<Agent>,
    pub total: usize,
    pub offset: usize,
    pub has_more: bool,
}

pub struct AgentService {
    ledger: Arc<dyn LedgerGateway>,
    max_page_limit: usize,
}

impl AgentService {
    pub fn new(ledger: Arc<dyn LedgerGateway>, settings: &ServiceSection) -> Self {
        Self {
            ledger,
            max_page_limit: settings.max_page_limit.max(1),
        }
    }

    pub async fn get_agent(&self, id: AgentId) -> Result<Agent, HiveError> {
        self.ledger.read_agent(id).await
    }

    /// limit 为 0 时拒绝；超过上限时截断到 max_page_limit
    pub async fn list_agents(&self, offset: usize, limit: usize) -> Result<AgentPage, HiveError> {
        if limit == 0 {
            return Err(HiveError::InvalidArgument("limit must be positive".into()));
        }
        let limit = limit.min(self.max_page_limit);
        let page = self.ledger.read_registry_page(offset, limit).await?;
        let has_more = page.has_more();
        let mut agents = Vec::with_capacity(page.ids.len());
        for id in page.ids {
            agents.push(self.ledger.read_agent(id).await?);
        }
        Ok(AgentPage {
            agents,
            total: page.total,
            offset: page.offset,
            has_more,
        })
    }

    pub async fn list_agents_by_owner(&self, owner: &Identity) -> Result<Vec<Agent>, HiveError> {
        let ids = self.ledger.read_owner_agents(owner).await?;
        let mut agents = Vec::with_capacity(ids.len());
        for id in ids {
            agents.push(self.ledger.read_agent(id).await?);
        }
        Ok(agents)
    }

    pub async fn create_agent(&self, caller: &Identity, goal: &str) -> Result<Agent, HiveError> {
        let id = self.ledger.submit_registration(caller, goal).await?;
        tracing::info!(agent_id = %id, owner = %caller, "Agent registered");
        self.ledger.read_agent(id).await
    }

    pub async fn update_goal(&self, caller: &Identity, id: AgentId, goal: &str) -> Result<Agent, HiveError> {
        self.ledger.submit_goal_update(caller, id, goal).await?;
        self.ledger.read_agent(id).await
    }

    pub async fn store_memory(
        &self,
        caller: &Identity,
        id: AgentId,
        key: &str,
        value: &str,
    ) -> Result<Agent, HiveError> {
        self.ledger.submit_memory_update(caller, id, key, value).await?;
        self.ledger.read_agent(id).await
    }

    pub async fn set_active(&self, caller: &Identity, id: AgentId, active: bool) -> Result<Agent, HiveError> {
        self.ledger.submit_activation(caller, id, active).await?;
        self.ledger.read_agent(id).await
    }

    pub async fn transfer_ownership(
        &self,
        caller: &Identity,
        id: AgentId,
        new_owner: &Identity,
    ) -> Result<Agent, HiveError> {
        self.ledger.submit_ownership_transfer(caller, id, new_owner).await?;
        tracing::info!(agent_id = %id, new_owner = %new_owner, "Agent ownership transferred");
        self.ledger.read_agent(id).await
    }

    pub async fn get_memory(&self, id: AgentId, key: &str) -> Result<MemoryEntry, HiveError> {
        let agent = self.ledger.read_agent(id).await?;
        agent
            .get_memory(key)
            .cloned()
            .ok_or_else(|| HiveError::NotFound(format!("memory '{}' of agent {}", key, id)))
    }

    /// 执行历史：按时间倒序
    pub async fn get_execution_history(&self, id: AgentId) -> Result<Vec<ExecutionEntry>, HiveError> {
        let agent = self.ledger.read_agent(id).await?;
        Ok(execution_history(&agent))
    }
}
