//! Agent 注册表：只追加的全量 id 序列 + 按创建者索引 + 分页枚举
//!
//! Agent 永不删除，只会停用；全量序列的下标即创建次序。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agent::{Agent, AgentId, Identity};
use crate::core::HiveError;

/// 一页 id；has_more 由 offset 与 total 推导
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistryPage {
    pub ids: Vec<AgentId>,
    pub total: usize,
    pub offset: usize,
}

impl RegistryPage {
    pub fn has_more(&self) -> bool {
        self.offset + self.ids.len() < self.total
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    agents: HashMap<AgentId, Agent>,
    /// 创建顺序
    all: Vec<AgentId>,
    by_owner: HashMap<Identity, Vec<AgentId>>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// 分配新 Agent，追加到全量序列与创建者序列
    pub fn register(&mut self, owner: Identity, goal: &str, now: DateTime<Utc>) -> Result<AgentId, HiveError> {
        let id = AgentId(self.next_id + 1);
        let agent = Agent::new(id, owner.clone(), goal, now)?;
        self.next_id += 1;

        self.agents.insert(id, agent);
        self.all.push(id);
        self.by_owner.entry(owner).or_default().push(id);
        Ok(id)
    }

    pub fn get(&self, id: AgentId) -> Result<&Agent, HiveError> {
        self.agents
            .get(&id)
            .ok_or_else(|| HiveError::NotFound(format!("agent {id}")))
    }

    pub fn get_mut(&mut self, id: AgentId) -> Result<&mut Agent, HiveError> {
        self.agents
            .get_mut(&id)
            .ok_or_else(|| HiveError::NotFound(format!("agent {id}")))
    }

    /// 创建者的 id，按创建顺序；没有时返回空序列
    pub fn list_by_owner(&self, owner: &Identity) -> Vec<AgentId> {
        self.by_owner.get(owner).cloned().unwrap_or_default()
    }

    /// 从 offset 起最多取 limit 个 id；非空注册表上 offset 越界报 OutOfRange
    pub fn list_page(&self, offset: usize, limit: usize) -> Result<RegistryPage, HiveError> {
        let total = self.all.len();
        if total > 0 && offset >= total {
            return Err(HiveError::OutOfRange { offset, total });
        }
        let end = offset.saturating_add(limit).min(total);
        let ids = if total == 0 {
            Vec::new()
        } else {
            self.all[offset..end].to_vec()
        };
        Ok(RegistryPage { ids, total, offset })
    }
}
