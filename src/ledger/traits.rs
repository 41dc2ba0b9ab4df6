//! 账本网关抽象
//!
//! 把对 Agent 记录与注册表的逻辑读写转换为账本操作。每个 submit 都是独立单元：
//! 只在账本确认排序后返回（或因鉴权 / 校验被拒绝），与其它 submit 之间没有原子性。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agent::{Agent, AgentId, Identity, RegistryPage};
use crate::core::HiveError;

/// 写入确认：账本全序中的位置与确认时间
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub sequence: u64,
    pub confirmed_at: DateTime<Utc>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn read_agent(&self, id: AgentId) -> Result<Agent, HiveError>;

    async fn read_registry_page(&self, offset: usize, limit: usize) -> Result<RegistryPage, HiveError>;

    async fn read_owner_agents(&self, owner: &Identity) -> Result<Vec<AgentId>, HiveError>;

    /// 以 caller 为所有者注册新 Agent
    async fn submit_registration(&self, caller: &Identity, goal: &str) -> Result<AgentId, HiveError>;

    async fn submit_goal_update(
        &self,
        caller: &Identity,
        id: AgentId,
        goal: &str,
    ) -> Result<LedgerReceipt, HiveError>;

    async fn submit_memory_update(
        &self,
        caller: &Identity,
        id: AgentId,
        key: &str,
        value: &str,
    ) -> Result<LedgerReceipt, HiveError>;

    async fn submit_result_commit(
        &self,
        caller: &Identity,
        id: AgentId,
        text: &str,
    ) -> Result<LedgerReceipt, HiveError>;

    async fn submit_activation(
        &self,
        caller: &Identity,
        id: AgentId,
        active: bool,
    ) -> Result<LedgerReceipt, HiveError>;

    async fn submit_ownership_transfer(
        &self,
        caller: &Identity,
        id: AgentId,
        new_owner: &Identity,
    ) -> Result<LedgerReceipt, HiveError>;
}
