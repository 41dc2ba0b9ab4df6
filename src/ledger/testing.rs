//! 测试用账本包装：从指定 offset 起分页读取失败

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{Agent, AgentId, Identity, RegistryPage};
use crate::core::HiveError;
use crate::ledger::{InMemoryLedger, LedgerGateway, LedgerReceipt};

pub struct PageFailingLedger {
    inner: Arc<InMemoryLedger>,
    fail_from_offset: usize,
}

impl PageFailingLedger {
    /// offset >= fail_from_offset 的分页读取返回 Unavailable
    pub fn new(inner: Arc<InMemoryLedger>, fail_from_offset: usize) -> Self {
        Self {
            inner,
            fail_from_offset,
        }
    }
}

#[async_trait]
impl LedgerGateway for PageFailingLedger {
    async fn read_agent(&self, id: AgentId) -> Result<Agent, HiveError> {
        self.inner.read_agent(id).await
    }

    async fn read_registry_page(&self, offset: usize, limit: usize) -> Result<RegistryPage, HiveError> {
        if offset >= self.fail_from_offset {
            return Err(HiveError::Unavailable(format!("page at offset {offset} lost")));
        }
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
