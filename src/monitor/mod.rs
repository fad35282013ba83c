//! Monitoring loop: operating window, adaptive cadence, search plan,
//! single-instance lock, and the scheduler that ties the layers together.

mod handle;
mod interval;
mod lock;
mod scheduler;
mod search;
mod window;

pub use handle::MonitorHandle;
pub use interval::AdaptiveInterval;
pub use lock::InstanceLock;
pub use scheduler::{CycleReport, Scheduler};
pub use search::{KeywordSet, SearchPlan};
pub use window::OperatingWindow;
