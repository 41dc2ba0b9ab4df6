//! 调度：周期性调和循环与推理上下文构建

pub mod context;
pub mod reconcile;

pub use context::build_context_prompt;
pub use reconcile::{AgentOutcome, FailureStage, Reconciler, TickReport};
