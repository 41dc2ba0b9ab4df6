//! 监控：周期性健康采样与有上限的采样历史

pub mod history;
pub mod sampler;
pub mod store;

pub use history::{HealthSample, HistoryWindow, MonitorHistory};
pub use sampler::{HealthAlert, HealthSampler, SampleReport};
pub use store::{HistoryStore, JsonFileHistoryStore, SqliteHistoryStore};
