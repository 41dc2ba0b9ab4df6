//! 带超时与重试的账本网关包装
//!
//! 每次调用都受调用方超时约束（超时视同失败）。只有暂时性错误会重试，校验 / 鉴权错误立即返回。
//! 读取与按 key 幂等的写入在超时后也会重试；结果提交、注册、所有权转移超时后不重放
//! （超时的写入可能已被确认）。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::{Agent, AgentId, Identity, RegistryPage};
use crate::config::LedgerSection;
use crate::core::HiveError;
use crate::ledger::{LedgerGateway, LedgerReceipt};

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 首次失败后的最大重试次数
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 单次调用超时
    pub call_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn from_section(section: &LedgerSection) -> Self {
        Self {
            max_retries: section.max_retries,
            base_delay: Duration::from_millis(section.retry_base_delay_ms),
            max_delay: Duration::from_millis(section.retry_max_delay_ms),
            call_timeout: Duration::from_secs(section.call_timeout_secs),
        }
    }

    /// 指数退避：base * 2^attempt，不超过 max_delay
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 超时后是否可以安全重放
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Replay {
    Safe,
    /// 只在账本明确报告不可用时重试
    OnReportedFailure,
}

pub struct RetryingLedger {
    inner: Arc<dyn LedgerGateway>,
    config: RetryConfig,
}

impl RetryingLedger {
    pub fn new(inner: Arc<dyn LedgerGateway>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn call<T, F, Fut>(&self, op: &'static str, replay: Replay, mut f: F) -> Result<T, HiveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HiveError>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(self.config.call_timeout, f()).await {
                Ok(r) => r,
                Err(_) => Err(HiveError::Timeout(self.config.call_timeout)),
            };

            let err = match result {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let retryable = err.is_transient()
                && (replay == Replay::Safe || !err.is_timeout())
                && attempt < self.config.max_retries;
            if !retryable {
                return Err(err);
            }

            let delay = self.config.delay_for(attempt);
            attempt += 1;
            tracing::warn!(
                "Ledger {} failed ({}), retry {}/{} in {:?}",
                op,
                err,
                attempt,
                self.config.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LedgerGateway for RetryingLedger {
    async fn read_agent(&self, id: AgentId) -> Result<Agent, HiveError> {
        self.call("read_agent", Replay::Safe, || self.inner.read_agent(id))
            .await
    }

    async fn read_registry_page(&self, offset: usize, limit: usize) -> Result<RegistryPage, HiveError> {
        self.call("read_registry_page", Replay::Safe, || {
            self.inner.read_registry_page(offset, limit)
        })
        .await
    }

    async fn read_owner_agents(&self, owner: &Identity) -> Result<Vec<AgentId>, HiveError> {
        self.call("read_owner_agents", Replay::Safe, || {
            self.inner.read_owner_agents(owner)
        })
        .await
    }

    async fn submit_registration(&self, caller: &Identity, goal: &str) -> Result<AgentId, HiveError> {
        self.call("submit_registration", Replay::OnReportedFailure, || {
            self.inner.submit_registration(caller, goal)
        })
        .await
    }

    async fn submit_goal_update(&self, caller: &Identity, id: AgentId, goal: &str) -> Result<LedgerReceipt, HiveError> {
        self.call("submit_goal_update", Replay::Safe, || {
            self.inner.submit_goal_update(caller, id, goal)
        })
        .await
    }

    async fn submit_memory_update(
        &self,
        caller: &Identity,
        id: AgentId,
        key: &str,
        value: &str,
    ) -> Result<LedgerReceipt, HiveError> {
        self.call("submit_memory_update", Replay::Safe, || {
            self.inner.submit_memory_update(caller, id, key, value)
        })
        .await
    }

    async fn submit_result_commit(&self, caller: &Identity, id: AgentId, text: &str) -> Result<LedgerReceipt, HiveError> {
        self.call("submit_result_commit", Replay::OnReportedFailure, || {
            self.inner.submit_result_commit(caller, id, text)
        })
        .await
    }

    async fn submit_activation(&self, caller: &Identity, id: AgentId, active: bool) -> Result<LedgerReceipt, HiveError> {
        self.call("submit_activation", Replay::Safe, || {
            self.inner.submit_activation(caller, id, active)
        })
        .await
    }

    async fn submit_ownership_transfer(
        &self,
        caller: &Identity,
        id: AgentId,
        new_owner: &Identity,
    ) -> Result<LedgerReceipt, HiveError> {
        self.call("submit_ownership_transfer", Replay::OnReportedFailure, || {
            self.inner.submit_ownership_transfer(caller, id, new_owner)
        })
        .await
    }
}
