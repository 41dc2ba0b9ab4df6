//! Agent 记录：所有者、目标、最近结果、执行计数、按 key 去重的记忆序列
//!
//! 纯数据 + 不变量检查，不做任何外部调用。每个变更操作都显式接收调用者身份，
//! 与存储的 owner 以及配置的 commit actor 比对。

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::HiveError;

/// 账本分配的 Agent 标识，生命周期内稳定
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 调用者 / 所有者身份
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 空身份：空白串，或 `0x` 后全为 0
    pub fn is_zero(&self) -> bool {
        let s = self.0.trim();
        if s.is_empty() {
            return true;
        }
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(rest) => rest.chars().all(|c| c == '0'),
            None => false,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 单条记忆：(key, value, timestamp)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// 由字段推导出的阶段（不存储）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    /// 已停用，重新激活前不推进
    Inactive,
    /// 激活但未到期
    Cooling,
    /// 激活且到期
    Due,
}

/// Agent 状态快照
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub owner: Identity,
    pub goal: String,
    pub last_result: String,
    /// 最近一次提交结果的时间；从未提交时为 None
    pub last_execution_time: Option<DateTime<Utc>>,
    pub execution_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    memories: Vec<MemoryEntry>,
}

impl Agent {
    /// 新建：激活、计数为零、无记忆
    pub fn new(id: AgentId, owner: Identity, goal: &str, now: DateTime<Utc>) -> Result<Self, HiveError> {
        if owner.is_zero() {
            return Err(HiveError::InvalidArgument("owner must not be the zero identity".into()));
        }
        let goal = validate_goal(goal)?;
        Ok(Self {
            id,
            owner,
            goal,
            last_result: String::new(),
            last_execution_time: None,
            execution_count: 0,
            is_active: true,
            created_at: now,
            memories: Vec::new(),
        })
    }

    pub fn memories(&self) -> &[MemoryEntry] {
        &self.memories
    }

    pub fn memory_count(&self) -> usize {
        self.memories.len()
    }

    pub fn get_memory(&self, key: &str) -> Option<&MemoryEntry> {
        self.memories.iter().find(|m| m.key == key)
    }

    /// 按插入位置取最近 n 条（最新的在最后）
    pub fn recent_memories(&self, n: usize) -> &[MemoryEntry] {
        let start = self.memories.len().saturating_sub(n);
        &self.memories[start..]
    }

    pub fn update_goal(&mut self, caller: &Identity, new_goal: &str) -> Result<(), HiveError> {
        self.require_owner(caller)?;
        self.goal = validate_goal(new_goal)?;
        Ok(())
    }

    /// 幂等；返回值表示状态是否实际改变
    pub fn set_active(&mut self, caller: &Identity, active: bool) -> Result<bool, HiveError> {
        self.require_owner(caller)?;
        let changed = self.is_active != active;
        self.is_active = active;
        Ok(changed)
    }

    pub fn transfer_ownership(&mut self, caller: &Identity, new_owner: Identity) -> Result<(), HiveError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(HiveError::InvalidArgument("new owner must not be the zero identity".into()));
        }
        self.owner = new_owner;
        Ok(())
    }

    /// 按 key 去重写入：已有 key 原位更新 value 与时间戳，新 key 追加到末尾
    pub fn store_memory(
        &mut self,
        caller: &Identity,
        commit_actor: &Identity,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HiveError> {
        self.require_writer(caller, commit_actor)?;
        if key.trim().is_empty() {
            return Err(HiveError::InvalidArgument("memory key must not be empty".into()));
        }

        match self.memories.iter_mut().find(|m| m.key == key) {
            Some(entry) => {
                entry.value = value.to_string();
                entry.timestamp = now;
            }
            None => self.memories.push(MemoryEntry {
                key: key.to_string(),
                value: value.to_string(),
                timestamp: now,
            }),
        }
        Ok(())
    }

    /// 提交结果：execution_count 恰好加一，last_execution_time 不回退，记忆不变
    pub fn commit_result(
        &mut self,
        caller: &Identity,
        commit_actor: &Identity,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HiveError> {
        self.require_writer(caller, commit_actor)?;
        self.last_result = text.to_string();
        self.last_execution_time = Some(match self.last_execution_time {
            Some(prev) if prev > now => prev,
            _ => now,
        });
        self.execution_count += 1;
        Ok(())
    }

    /// 从未执行过的 Agent 总是到期；否则距上次执行至少 min_interval
    pub fn is_due(&self, now: DateTime<Utc>, min_interval: Duration) -> bool {
        if self.execution_count == 0 {
            return true;
        }
        match self.last_execution_time {
            Some(last) => now - last >= min_interval,
            None => true,
        }
    }

    pub fn phase(&self, now: DateTime<Utc>, min_interval: Duration) -> AgentPhase {
        if !self.is_active {
            AgentPhase::Inactive
        } else if self.is_due(now, min_interval) {
            AgentPhase::Due
        } else {
            AgentPhase::Cooling
        }
    }

    fn require_owner(&self, caller: &Identity) -> Result<(), HiveError> {
        if caller == &self.owner {
            Ok(())
        } else {
            Err(HiveError::Unauthorized(format!(
                "{caller} is not the owner of agent {}",
                self.id
            )))
        }
    }

    fn require_writer(&self, caller: &Identity, commit_actor: &Identity) -> Result<(), HiveError> {
        if caller == &self.owner || (!commit_actor.is_zero() && caller == commit_actor) {
            Ok(())
        } else {
            Err(HiveError::Unauthorized(format!(
                "{caller} may not write results or memories for agent {}",
                self.id
            )))
        }
    }
}

fn validate_goal(goal: &str) -> Result<String, HiveError> {
    if goal.trim().is_empty() {
        return Err(HiveError::InvalidArgument("goal must not be empty".into()));
    }
    Ok(goal.to_string())
}
