//! ScheduleConfig in action: tags, hooks, time budgets, and an error
//! hook that gives up after repeated failures.
//!
//! Run with: cargo run --example callbacks

use std::time::Duration;

use maestro::{ScheduleConfig, SchedulerService, TaskError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let service = SchedulerService::new();

    let config = ScheduleConfig::builder("importer")
        .tag("demo")
        .initial_delay(Duration::from_secs(1))
        .max_execution_time(Duration::from_secs(2))
        .on_success(|name, elapsed| {
            println!("[{name}] completed in {elapsed:?}");
        })
        .on_error(|name, error, attempt| {
            eprintln!("[{name}] attempt {attempt} failed: {error}");
            // give the task three chances, then stop its schedule
            attempt < 3
        })
        .build();

    service.schedule_fixed_delay_with(
        config,
        || async {
            if rand_like_failure() {
                return Err::<(), TaskError>("upstream unavailable".into());
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        },
        Duration::from_secs(1),
    );

    tokio::time::sleep(Duration::from_secs(15)).await;
    service.shutdown().await;
    Ok(())
}

// Deterministic stand-in for a flaky dependency: fails on odd seconds.
fn rand_like_failure() -> bool {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() % 2 == 1)
        .unwrap_or(false)
}
