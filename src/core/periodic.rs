//! 周期任务：定时器 + 显式 tick 函数，可协作式取消
//!
//! 取消只会阻止下一次 tick 被调度；正在执行的 tick 会跑完（或由其内部超时结束），不做中途回滚。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// 周期任务：每次 tick 执行一轮工作
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// 任务名称（用于日志）
    fn name(&self) -> &'static str;

    async fn tick(&self);
}

/// 按固定节奏运行任务直到 token 被取消；首个 tick 立即执行
pub async fn run_periodic(task: Arc<dyn PeriodicTask>, period: Duration, token: CancellationToken) {
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    // 上一轮超出周期时直接跳过错过的 tick
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Periodic task '{}' started (every {:?})", task.name(), period);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if token.is_cancelled() {
            break;
        }
        task.tick().await;
    }
    tracing::info!("Periodic task '{}' stopped", task.name());
}

/// 在 tracker 中启动周期任务，关闭时通过 tracker 等待其退出
pub fn spawn_periodic(
    tracker: &TaskTracker,
    task: Arc<dyn PeriodicTask>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tracker.spawn(run_periodic(task, period, token))
}
