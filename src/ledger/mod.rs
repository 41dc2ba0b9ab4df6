//! 账本网关：抽象、进程内实现、超时重试包装

pub mod memory;
pub mod retry;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;

pub use memory::{InMemoryLedger, LedgerEvent, LedgerEventKind};
pub use retry::{RetryConfig, RetryingLedger};
pub use traits::{LedgerGateway, LedgerReceipt};
