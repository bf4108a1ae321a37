//! Basic usage: the three scheduling modes side by side.
//!
//! Run with: cargo run --example basic

use std::time::Duration;

use maestro::{CronExpression, SchedulerService, TaskError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,maestro_runtime=debug".into()),
        )
        .init();

    let service = SchedulerService::new();

    // Fixed rate: every 2 seconds measured from each start
    service.schedule(
        "fixed-rate",
        || async {
            println!("[fixed-rate] tick");
            Ok::<(), TaskError>(())
        },
        Duration::ZERO,
        Duration::from_secs(2),
    );

    // Fixed delay: 3 seconds after each completion
    service.schedule_fixed_delay(
        "fixed-delay",
        || async {
            println!("[fixed-delay] working...");
            tokio::time::sleep(Duration::from_millis(500)).await;
            println!("[fixed-delay] done");
            Ok::<(), TaskError>(())
        },
        Duration::from_secs(1),
        Duration::from_secs(3),
    );

    // Cron: every 5 seconds on the 5-second marks
    let expr = CronExpression::parse("0/5 * * * * ?")?;
    service.schedule_cron(
        "cron",
        || async {
            println!("[cron] fired");
            Ok::<(), TaskError>(())
        },
        expr,
        Duration::ZERO,
    );

    println!("Running for 20 seconds, Ctrl+C to stop early...");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(20)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    service.shutdown().await;
    Ok(())
}
