//! 核心基础设施：错误分类、时钟、周期任务、优雅关闭

pub mod clock;
pub mod error;
pub mod periodic;
pub mod shutdown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, ErrorPayload, HiveError};
pub use periodic::{run_periodic, spawn_periodic, PeriodicTask};
pub use shutdown::{ShutdownCoordinator, ShutdownManager, ShutdownReason};
