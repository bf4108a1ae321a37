//! Preview the upcoming firing times of a cron expression without
//! scheduling anything.
//!
//! Run with: cargo run --example preview -- "0 30 9 * * MON-FRI"

use chrono::Utc;
use maestro::CronExpression;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let expr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0 0/15 9-17 * * MON-FRI".to_string());

    let expression = CronExpression::parse(&expr)?;
    println!("next 10 firings of '{expression}':");

    let mut t = Utc::now();
    for i in 1..=10 {
        t = expression.next_execution_after(&t)?;
        println!("{i:>3}. {t}");
    }
    Ok(())
}
