//! Hive - 自治 Agent 注册与调度系统
//!
//! 模块划分：
//! - **agent**: Agent 记录、注册表、执行历史视图
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、时钟、周期任务、优雅关闭
//! - **ledger**: 账本网关（进程内实现 + 超时重试包装）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）与推理网关
//! - **monitor**: 健康采样与有上限的采样历史
//! - **observability**: 日志初始化
//! - **runtime**: 启动时构建的运行时上下文
//! - **scheduler**: 周期性调和循环
//! - **service**: 对外 Agent 接口

pub mod agent;
pub mod config;
pub mod core;
pub mod ledger;
pub mod llm;
pub mod monitor;
pub mod observability;
pub mod runtime;
pub mod scheduler;
pub mod service;

pub use runtime::HiveContext;
pub use service::{AgentPage, AgentService};
