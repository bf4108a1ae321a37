mod handle;
mod service;

pub use handle::TaskHandle;
pub use service::{SchedulerService, Trigger};
