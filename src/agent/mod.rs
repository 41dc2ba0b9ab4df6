//! Agent 状态模型：记录、注册表、执行历史视图

pub mod execution;
pub mod record;
pub mod registry;

pub use execution::{execution_history, execution_key, execution_memory_value, ExecutionEntry};
pub use record::{Agent, AgentId, AgentPhase, Identity, MemoryEntry};
pub use registry::{Registry, RegistryPage};
