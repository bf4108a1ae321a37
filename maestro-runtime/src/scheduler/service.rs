use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handle::TaskHandle;
use crate::cron::CronExpression;
use crate::task::{ExecutionTimedOut, ScheduleConfig, TaskError};

/// Timing discipline of one registered task.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Wait measured from each execution's start. A zero interval runs
    /// the task exactly once.
    FixedRate(Duration),
    /// Wait measured from each execution's end; no overlap.
    FixedDelay(Duration),
    /// Wait computed from the expression after each execution, evaluated
    /// in the config's timezone.
    Cron(CronExpression),
}

/// Concurrent task-execution service. Each registration spawns one
/// repeating loop under the service's cancellation scope; a failing
/// iteration is logged and never stops the loop, a failing task never
/// affects its siblings. Registration is non-blocking.
///
/// Stopping is cooperative: loops observe cancellation at their waits
/// and a running task body is never interrupted mid-execution. A stopped
/// service is not reusable; create a new one instead.
pub struct SchedulerService {
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    runtime: Option<tokio::runtime::Handle>,
}

impl SchedulerService {
    /// A service spawning onto the ambient tokio runtime.
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            runtime: None,
        }
    }

    /// A service spawning onto a caller-supplied runtime.
    pub fn with_runtime(runtime: tokio::runtime::Handle) -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            runtime: Some(runtime),
        }
    }

    /// Fixed-rate scheduling: after `initial_delay`, run every `interval`
    /// measured from each execution's start. A zero `interval` runs the
    /// task exactly once.
    pub fn schedule<F, Fut>(
        &self,
        name: impl Into<String>,
        task: F,
        initial_delay: Duration,
        interval: Duration,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let config = ScheduleConfig::builder(name).initial_delay(initial_delay).build();
        self.schedule_task(config, Trigger::FixedRate(interval), task)
    }

    /// Fixed-delay scheduling: after `initial_delay`, run repeatedly with
    /// `fixed_delay` measured from the end of each execution.
    pub fn schedule_fixed_delay<F, Fut>(
        &self,
        name: impl Into<String>,
        task: F,
        initial_delay: Duration,
        fixed_delay: Duration,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let config = ScheduleConfig::builder(name).initial_delay(initial_delay).build();
        self.schedule_task(config, Trigger::FixedDelay(fixed_delay), task)
    }

    /// Cron-driven scheduling in UTC: after `initial_delay`, run, then
    /// sleep until the expression's next instant, repeatedly.
    pub fn schedule_cron<F, Fut>(
        &self,
        name: impl Into<String>,
        task: F,
        expression: CronExpression,
        initial_delay: Duration,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let config = ScheduleConfig::builder(name).initial_delay(initial_delay).build();
        self.schedule_task(config, Trigger::Cron(expression), task)
    }

    /// Fixed-rate scheduling driven by a [`ScheduleConfig`].
    pub fn schedule_with<F, Fut>(
        &self,
        config: ScheduleConfig,
        task: F,
        interval: Duration,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.schedule_task(config, Trigger::FixedRate(interval), task)
    }

    /// Fixed-delay scheduling driven by a [`ScheduleConfig`].
    pub fn schedule_fixed_delay_with<F, Fut>(
        &self,
        config: ScheduleConfig,
        task: F,
        fixed_delay: Duration,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.schedule_task(config, Trigger::FixedDelay(fixed_delay), task)
    }

    /// Cron-driven scheduling driven by a [`ScheduleConfig`]; the
    /// expression is evaluated in the config's timezone.
    pub fn schedule_cron_with<F, Fut>(
        &self,
        config: ScheduleConfig,
        task: F,
        expression: CronExpression,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.schedule_task(config, Trigger::Cron(expression), task)
    }

    /// Shared registration entry: spawn one repeating loop for `task`
    /// under this service's cancellation scope. Used directly when the
    /// config and trigger come from a resolved
    /// [`ScheduleDefinition`](crate::ScheduleDefinition).
    pub fn schedule_task<F, Fut>(
        &self,
        config: ScheduleConfig,
        trigger: Trigger,
        task: F,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let name = config.name().to_string();
        if self.shutdown.is_cancelled() {
            warn!(task = %name, "scheduler already stopped; registration will never run");
        } else {
            debug!(task = %name, tags = ?config.tags(), ?trigger, "task registered");
        }

        let token = self.shutdown.child_token();
        let loop_token = token.clone();
        let task_loop = run_task_loop(config, trigger, task, loop_token);
        let join = match &self.runtime {
            Some(runtime) => runtime.spawn(task_loop),
            None => tokio::spawn(task_loop),
        };
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(join);

        TaskHandle::new(name, token)
    }

    /// Cancel the service scope. All registered loops end at their next
    /// suspension point; running task bodies finish first. Idempotent.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("scheduler stopping");
            self.shutdown.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the service and wait for every scheduling loop to wind down.
    pub async fn shutdown(&self) {
        self.stop();
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tasks.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "task loop ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}

impl Default for SchedulerService {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_task_loop<F, Fut>(
    config: ScheduleConfig,
    trigger: Trigger,
    task: F,
    token: CancellationToken,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    if !config.initial_delay().is_zero() {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(config.initial_delay()) => {}
        }
    }
    if token.is_cancelled() {
        return;
    }

    let mut executions: u64 = 0;

    match trigger {
        Trigger::FixedRate(interval) if interval.is_zero() => {
            run_iteration(&config, &task, &mut executions, &token).await;
            debug!(task = %config.name(), "one-shot task completed");
        }
        Trigger::FixedRate(interval) => {
            // Cadence is anchored at the first execution; the tick after
            // each run completes `interval` from that run's start. An
            // overrunning body is followed back-to-back, never overlapped.
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                run_iteration(&config, &task, &mut executions, &token).await;
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
            }
        }
        Trigger::FixedDelay(delay) => {
            loop {
                run_iteration(&config, &task, &mut executions, &token).await;
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        Trigger::Cron(expression) => {
            loop {
                run_iteration(&config, &task, &mut executions, &token).await;
                let now = Utc::now().with_timezone(&config.zone());
                let wait = match expression.next_execution_after(&now) {
                    // A negative delta means the execution overran past
                    // the next firing; proceed immediately.
                    Ok(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
                    Err(e) => {
                        error!(task = %config.name(), error = %e, "no further execution instant; ending schedule");
                        break;
                    }
                };
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
    }
    debug!(task = %config.name(), executions, "task loop exited");
}

/// One execution: apply the optional time budget, time the body, report
/// the outcome. Errors are contained here; the loop continues unless the
/// error hook asks to stop.
async fn run_iteration<F, Fut>(
    config: &ScheduleConfig,
    task: &F,
    executions: &mut u64,
    token: &CancellationToken,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    *executions += 1;
    let attempt = *executions;
    let started = tokio::time::Instant::now();

    let outcome = match config.max_execution_time() {
        Some(budget) => match tokio::time::timeout(budget, task()).await {
            Ok(result) => result,
            Err(_) => Err(TaskError::from(ExecutionTimedOut { budget })),
        },
        None => task().await,
    };
    let elapsed = started.elapsed();

    match outcome {
        Ok(()) => {
            debug!(task = %config.name(), ?elapsed, attempt, "execution succeeded");
            if let Some(hook) = config.on_success() {
                hook(config.name(), elapsed);
            }
        }
        Err(e) => {
            error!(task = %config.name(), error = %e, attempt, "execution failed");
            if let Some(hook) = config.on_error() {
                if !hook(config.name(), &e, attempt) {
                    info!(task = %config.name(), attempt, "error hook requested stop");
                    token.cancel();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn count_task(
        counter: Arc<AtomicU64>,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>
           + Send
           + Sync
           + 'static {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn fail_task(
        counter: Arc<AtomicU64>,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>
           + Send
           + Sync
           + 'static {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("boom".into())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_rate_runs_repeatedly() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule(
            "tick",
            count_task(counter.clone()),
            Duration::ZERO,
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(1050)).await;
        service.shutdown().await;
        assert!(counter.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_runs_exactly_once() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule(
            "once",
            count_task(counter.clone()),
            Duration::from_millis(50),
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        service.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_delay_is_honored() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule(
            "later",
            count_task(counter.clone()),
            Duration::from_millis(300),
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(counter.load(Ordering::SeqCst) >= 1);
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_keeps_running() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule_fixed_delay(
            "flaky",
            fail_task(counter.clone()),
            Duration::ZERO,
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(550)).await;
        service.shutdown().await;
        assert!(counter.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_does_not_affect_siblings() {
        let service = SchedulerService::new();
        let failures = Arc::new(AtomicU64::new(0));
        let successes = Arc::new(AtomicU64::new(0));
        service.schedule_fixed_delay(
            "flaky",
            fail_task(failures.clone()),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        service.schedule_fixed_delay(
            "steady",
            count_task(successes.clone()),
            Duration::ZERO,
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(650)).await;
        service.shutdown().await;
        assert!(failures.load(Ordering::SeqCst) > 1);
        assert!(successes.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_cancels_one_task() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        let handle = service.schedule(
            "short-lived",
            count_task(counter.clone()),
            Duration::ZERO,
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_millis(200)).await;
        let settled = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), settled);
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_stops_everything() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule(
            "tick",
            count_task(counter.clone()),
            Duration::ZERO,
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        service.stop();
        service.stop();
        assert!(service.is_stopped());
        tokio::time::sleep(Duration::from_millis(200)).await;
        let settled = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), settled);
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn registration_after_stop_never_runs() {
        let service = SchedulerService::new();
        service.stop();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule(
            "too-late",
            count_task(counter.clone()),
            Duration::ZERO,
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        service.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cron_schedule_executes() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        let expr = CronExpression::parse("* * * * * ?").unwrap();
        service.schedule_cron("every-second", count_task(counter.clone()), expr, Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(5)).await;
        service.shutdown().await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unsatisfiable_cron_ends_after_first_run() {
        let service = SchedulerService::new();
        let counter = Arc::new(AtomicU64::new(0));
        let expr = CronExpression::parse("0 0 0 31 4 ?").unwrap();
        service.schedule_cron("never-again", count_task(counter.clone()), expr, Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(2)).await;
        service.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_hook_sees_every_execution() {
        let service = SchedulerService::new();
        let reported = Arc::new(AtomicU64::new(0));
        let hooked = reported.clone();
        let config = ScheduleConfig::builder("audited")
            .on_success(move |name, _elapsed| {
                assert_eq!(name, "audited");
                hooked.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule_with(config, count_task(counter.clone()), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(550)).await;
        service.shutdown().await;
        assert_eq!(
            reported.load(Ordering::SeqCst),
            counter.load(Ordering::SeqCst)
        );
        assert!(reported.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn error_hook_can_stop_the_schedule() {
        let service = SchedulerService::new();
        let config = ScheduleConfig::builder("give-up")
            .on_error(|_, _, attempt| attempt < 3)
            .build();
        let counter = Arc::new(AtomicU64::new(0));
        service.schedule_fixed_delay_with(
            config,
            fail_task(counter.clone()),
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        service.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn execution_budget_times_out_but_schedule_continues() {
        let service = SchedulerService::new();
        let timeouts = Arc::new(AtomicU64::new(0));
        let seen = timeouts.clone();
        let config = ScheduleConfig::builder("slow")
            .max_execution_time(Duration::from_millis(50))
            .on_error(move |_, error, _| {
                if error.is::<ExecutionTimedOut>() {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                true
            })
            .build();
        service.schedule_fixed_delay_with(
            config,
            || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<(), TaskError>(())
            },
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        service.shutdown().await;
        assert!(timeouts.load(Ordering::SeqCst) >= 2);
    }
}
