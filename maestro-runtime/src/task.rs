use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

/// Error object a task body may return. Contained per iteration: the
/// scheduling loop logs it and continues.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Invoked after a successful execution with the task name and elapsed time.
pub type SuccessHook = dyn Fn(&str, Duration) + Send + Sync;

/// Invoked after a failed execution with the task name, the error and the
/// running execution count. Returning `false` stops that task's schedule.
pub type ErrorHook = dyn Fn(&str, &TaskError, u64) -> bool + Send + Sync;

/// Raised as the iteration error when an execution exceeds the
/// configured max execution time.
#[derive(Debug, Error)]
#[error("execution exceeded the {budget:?} time budget")]
pub struct ExecutionTimedOut {
    pub budget: Duration,
}

/// Per-task scheduling metadata: name, tags, initial delay, timezone,
/// optional execution time budget and outcome hooks. Immutable once
/// built; the scheduler only reads it.
#[derive(Clone)]
pub struct ScheduleConfig {
    name: String,
    tags: Vec<String>,
    initial_delay: Duration,
    zone: FixedOffset,
    max_execution_time: Option<Duration>,
    on_success: Option<Arc<SuccessHook>>,
    on_error: Option<Arc<ErrorHook>>,
}

impl ScheduleConfig {
    /// A config with defaults: no tags, zero initial delay, UTC, no
    /// execution budget, no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> ScheduleConfigBuilder {
        ScheduleConfigBuilder {
            name: name.into(),
            tags: Vec::new(),
            initial_delay: Duration::ZERO,
            zone: Utc.fix(),
            max_execution_time: None,
            on_success: None,
            on_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time
    }

    pub(crate) fn on_success(&self) -> Option<&SuccessHook> {
        self.on_success.as_deref()
    }

    pub(crate) fn on_error(&self) -> Option<&ErrorHook> {
        self.on_error.as_deref()
    }
}

impl fmt::Debug for ScheduleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleConfig")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("initial_delay", &self.initial_delay)
            .field("zone", &self.zone)
            .field("max_execution_time", &self.max_execution_time)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Chaining builder for [`ScheduleConfig`].
pub struct ScheduleConfigBuilder {
    name: String,
    tags: Vec<String>,
    initial_delay: Duration,
    zone: FixedOffset,
    max_execution_time: Option<Duration>,
    on_success: Option<Arc<SuccessHook>>,
    on_error: Option<Arc<ErrorHook>>,
}

impl ScheduleConfigBuilder {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Fixed-offset timezone used when evaluating cron expressions.
    pub fn zone(mut self, zone: FixedOffset) -> Self {
        self.zone = zone;
        self
    }

    /// Budget for a single execution. Exceeding it fails that iteration
    /// with [`ExecutionTimedOut`]; the schedule itself continues.
    pub fn max_execution_time(mut self, budget: Duration) -> Self {
        self.max_execution_time = Some(budget);
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &TaskError, u64) -> bool + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ScheduleConfig {
        ScheduleConfig {
            name: self.name,
            tags: self.tags,
            initial_delay: self.initial_delay,
            zone: self.zone,
            max_execution_time: self.max_execution_time,
            on_success: self.on_success,
            on_error: self.on_error,
        }
    }
}
