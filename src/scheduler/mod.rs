//! Background tasks
//!
//! - Refresh worker draining the work queue
//! - Periodic sweep of expired cache entries and sessions

mod maintenance;
mod refresh_worker;

pub use maintenance::MaintenanceScheduler;
pub use refresh_worker::RefreshWorker;
