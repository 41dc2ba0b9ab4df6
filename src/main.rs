//! Hive - 自治 Agent 注册与调度系统
//!
//! 入口：加载配置、构建运行时上下文、启动调度与监控周期任务，直到收到关闭信号。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hive::config::load_config;
use hive::core::shutdown::PeriodicTaskDrain;
use hive::core::{spawn_periodic, ShutdownCoordinator, ShutdownManager};
use hive::{observability, HiveContext};
use tokio_util::task::TaskTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 第一个参数可指定额外的配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    let scheduler_interval = Duration::from_secs(config.scheduler.interval_secs.max(1));
    let monitor_interval = Duration::from_secs(config.monitor.interval_secs.max(1));
    let app_name = config.app.name.clone().unwrap_or_else(|| "hive".to_string());
    // 进行中的 tick 可能正在等待推理，清理超时要覆盖一次推理调用
    let drain_timeout_secs = config.llm.request_timeout_secs + 5;

    let ctx = HiveContext::build(config).context("Failed to build runtime context")?;
    let seeded = ctx.seed_agents().await;
    tracing::info!("{} starting ({} seed agents registered)", app_name, seeded);

    let shutdown = Arc::new(ShutdownManager::new());
    let token = shutdown.token();

    let tracker = TaskTracker::new();
    spawn_periodic(&tracker, Arc::new(ctx.reconciler()), scheduler_interval, token.clone());
    spawn_periodic(&tracker, Arc::new(ctx.sampler()), monitor_interval, token.clone());
    tracker.close();

    let mut coordinator = ShutdownCoordinator::new().with_timeout(drain_timeout_secs);
    coordinator.register(PeriodicTaskDrain::new(tracker.clone()));

    // 周期任务只会在取消或 panic 时退出；提前全部退出时同样走清理流程
    hive::core::shutdown::run_with_graceful_shutdown(
        Arc::clone(&shutdown),
        async move { tracker.wait().await },
        || async move {
            token.cancel();
            coordinator.run_cleanup().await
        },
    )
    .await;

    tracing::info!("{} stopped", app_name);
    Ok(())
}
