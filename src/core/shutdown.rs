//! 优雅关闭
//!
//! 停止调度新的 tick，等待进行中的 tick 跑完或超时。
//! 不做任何单个 Agent 级别的回滚。

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// 关闭信号管理器
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
}

/// 关闭原因
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 周期任务共享的取消 token
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!("Shutdown requested: {:?}", reason);
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭时需要执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 清理任务名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 关闭协调器：按注册顺序执行清理，每项受超时约束
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    /// 单个清理任务的超时（秒）
    timeout_secs: u64,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout_secs: 5,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    pub async fn run_cleanup(&self) {
        tracing::info!("Running {} cleanup tasks...", self.cleanup_tasks.len());

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);

        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(timeout, task.cleanup()).await {
                Ok(Ok(())) => {
                    tracing::info!("Cleanup task '{}' completed successfully", name);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Cleanup task '{}' failed: {}", name, e);
                }
                Err(_) => {
                    tracing::warn!("Cleanup task '{}' timed out after {}s", name, self.timeout_secs);
                }
            }
        }

        tracing::info!("All cleanup tasks finished");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待周期任务退出（进行中的 tick 会先跑完）
pub struct PeriodicTaskDrain {
    tracker: TaskTracker,
}

impl PeriodicTaskDrain {
    pub fn new(tracker: TaskTracker) -> Self {
        Self { tracker }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for PeriodicTaskDrain {
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "PeriodicTasks"
    }
}

/// 运行主应用直到结束或收到关闭信号，然后执行清理
pub async fn run_with_graceful_shutdown<F, Fut>(
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    shutdown_manager.install_signal_handlers();

    tokio::select! {
        _ = app => {
            tracing::warn!("Application finished before shutdown was requested");
        }
        _ = shutdown_manager.wait_for_shutdown() => {
            tracing::info!("Shutdown signal received");
        }
    }

    cleanup().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_shutdown_manager_token() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!manager.is_shutdown());
        manager.shutdown(ShutdownReason::UserInitiated);
        assert!(token.is_cancelled());
        assert!(manager.is_shutdown());
    }

    struct MockCleanup {
        called: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ShutdownCleanup for MockCleanup {
        async fn cleanup(&self) -> anyhow::Result<()> {
            self.called.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "MockCleanup"
        }
    }

    #[tokio::test]
    async fn test_shutdown_coordinator_runs_cleanup() {
        let mut coordinator = ShutdownCoordinator::new();

        let called = Arc::new(AtomicBool::new(false));
        coordinator.register(MockCleanup { called: called.clone() });

        coordinator.run_cleanup().await;
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_task_drain_waits_for_tracked_tasks() {
        let tracker = TaskTracker::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        tracker.spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let drain = PeriodicTaskDrain::new(tracker.clone());
        drain.cleanup().await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert!(tracker.is_closed());
    }

    #[tokio::test]
    async fn test_app_exit_still_runs_cleanup() {
        let manager = Arc::new(ShutdownManager::new());
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = cleaned.clone();

        run_with_graceful_shutdown(manager.clone(), async {}, || async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(cleaned.load(Ordering::SeqCst));
        assert!(!manager.is_shutdown());
    }
}
