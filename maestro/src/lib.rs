//! # Maestro - Cron Scheduling and Task Execution for Tokio
//!
//! This library provides a 6-field cron engine (second-level precision)
//! and a concurrent task-execution service with three timing modes.
//!
//! ## Features
//!
//! - **Cron expressions**: `second minute hour day-of-month month day-of-week`,
//!   with `*`, `?`, ranges, lists, steps and month/weekday names
//! - **Fixed rate**: execute at a constant cadence measured from each start
//! - **Fixed delay**: execute with a constant pause after each completion
//! - **Failure isolation**: an erroring task keeps its own schedule and
//!   never disturbs its siblings or the service
//! - **Callbacks**: per-task `on_success` / `on_error` hooks, with the
//!   error hook deciding whether the schedule continues
//! - **Config support**: placeholders like `${app.interval}` resolve
//!   schedule definitions from TOML/YAML files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use maestro::{CronExpression, SchedulerService, TaskError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SchedulerService::new();
//!
//!     // Top of every minute
//!     let expr = CronExpression::parse("0 * * * * ?")?;
//!     service.schedule_cron(
//!         "heartbeat",
//!         || async {
//!             println!("still here");
//!             Ok::<(), TaskError>(())
//!         },
//!         expr,
//!         Duration::ZERO,
//!     );
//!
//!     // Every 30 seconds, measured from each completion
//!     service.schedule_fixed_delay(
//!         "poll",
//!         || async { Ok::<(), TaskError>(()) },
//!         Duration::from_secs(5),
//!         Duration::from_secs(30),
//!     );
//!
//!     tokio::signal::ctrl_c().await?;
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Cron format
//!
//! ```text
//! sec   min   hour   day of month   month   day of week
//! 0     0/1   *      *              *       ?
//! ```
//!
//! When both day fields are restricted a day qualifies if **either**
//! matches (Quartz convention). `"0 0 12 1 * MON"` fires at noon on the
//! 1st of each month *and* on every Monday.

// Re-export core types
pub use maestro_runtime::{
    load_toml_config, load_yaml_config, parse_interval, parse_zone, resolve_config_value,
    CronError, CronExpression, CronField, ErrorHook, ExecutionTimedOut, FieldKind,
    ScheduleConfig, ScheduleConfigBuilder, ScheduleDefinition, ScheduleError, SchedulerService,
    SuccessHook, TaskError, TaskHandle, TimeUnit, Trigger,
};

// Make the runtime crate itself reachable
pub use maestro_runtime;
