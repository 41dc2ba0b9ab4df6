//! 监控历史：有上限的 FIFO 样本序列，写入串行化，可选镜像到外部存储
//!
//! 查询支持“最近一条”“最近一小时”“最近一天”；空窗口的平均值为 NaN。

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::HiveError;
use crate::monitor::HistoryStore;

/// 一次健康采样
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub total_agents: usize,
    pub active_agents: usize,
    pub total_executions: u64,
    pub recent_executions: usize,
}

/// 时间窗口查询结果
#[derive(Clone, Debug, Serialize)]
pub struct HistoryWindow {
    pub samples: Vec<HealthSample>,
    pub count: usize,
    /// active_agents 的平均值；窗口为空时为 NaN
    pub average_active_agents: f64,
}

impl HistoryWindow {
    fn from_samples(samples: Vec<HealthSample>) -> Self {
        let count = samples.len();
        let average_active_agents = if count == 0 {
            f64::NAN
        } else {
            samples.iter().map(|s| s.active_agents as f64).sum::<f64>() / count as f64
        };
        Self {
            samples,
            count,
            average_active_agents,
        }
    }
}

/// 窗口判定（两端都包含）：采样器的“最近一小时”与历史查询共用
pub fn within_window(ts: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    ts <= now && now - ts <= window
}

pub struct MonitorHistory {
    samples: Mutex<VecDeque<HealthSample>>,
    cap: usize,
    store: Option<Arc<dyn HistoryStore>>,
}

impl MonitorHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            cap: cap.max(1),
            store: None,
        }
    }

    /// 带外部存储；启动时加载已有样本（超出上限的旧样本丢弃）
    pub fn with_store(cap: usize, store: Arc<dyn HistoryStore>) -> Result<Self, HiveError> {
        let cap = cap.max(1);
        let mut loaded: VecDeque<HealthSample> = store.load()?.into();
        while loaded.len() > cap {
            loaded.pop_front();
        }
        tracing::info!("Loaded {} monitor samples from {} store", loaded.len(), store.name());
        Ok(Self {
            samples: Mutex::new(loaded),
            cap,
            store: Some(store),
        })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// 追加样本；超出上限时淘汰最旧的
    ///
    /// 先写外部存储，成功后才进入内存序列；存储失败时内存不变。
    pub async fn append(&self, sample: HealthSample) -> Result<(), HiveError> {
        let mut samples = self.samples.lock().await;

        // 持有锁期间写外部存储，保证写入顺序与内存一致
        if let Some(store) = &self.store {
            let store = Arc::clone(store);
            let cap = self.cap;
            let persisted = sample.clone();
            tokio::task::spawn_blocking(move || store.append(&persisted, cap))
                .await
                .map_err(|e| HiveError::Internal(format!("history writer panicked: {e}")))??;
        }

        samples.push_back(sample);
        while samples.len() > self.cap {
            samples.pop_front();
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.samples.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.lock().await.is_empty()
    }

    pub async fn last(&self) -> Option<HealthSample> {
        self.samples.lock().await.back().cloned()
    }

    /// 时间戳落在 [now - window, now] 内的样本
    pub async fn within(&self, now: DateTime<Utc>, window: Duration) -> HistoryWindow {
        let samples: Vec<HealthSample> = self
            .samples
            .lock()
            .await
            .iter()
            .filter(|s| within_window(s.timestamp, now, window))
            .cloned()
            .collect();
        HistoryWindow::from_samples(samples)
    }

    pub async fn last_hour(&self, now: DateTime<Utc>) -> HistoryWindow {
        self.within(now, Duration::hours(1)).await
    }

    pub async fn last_day(&self, now: DateTime<Utc>) -> HistoryWindow {
        self.within(now, Duration::days(1)).await
    }

    pub async fn all(&self) -> Vec<HealthSample> {
        self.samples.lock().await.iter().cloned().collect()
    }
}
