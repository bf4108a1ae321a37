use std::time::Duration;

use crate::error::ScheduleError;

/// Time unit for interval values read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl std::str::FromStr for TimeUnit {
    type Err = ScheduleError;

    /// Only accepts full lowercase unit names: "milliseconds", "seconds",
    /// "minutes", "hours", "days". For shorthand notations like "5s" use
    /// [`TimeUnit::parse_duration`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "milliseconds" => Ok(TimeUnit::Milliseconds),
            "seconds" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            _ => Err(ScheduleError::InvalidTimeUnit(s.to_string())),
        }
    }
}

impl TimeUnit {
    pub fn to_duration(&self, value: u64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value * 60),
            TimeUnit::Hours => Duration::from_secs(value * 3_600),
            TimeUnit::Days => Duration::from_secs(value * 86_400),
        }
    }

    /// Parse a shorthand duration like "5s", "10m", "2h", "500ms".
    ///
    /// Strict rules: lowercase suffixes only ("ms", "s", "m", "h", "d"),
    /// the format is digits immediately followed by the suffix.
    pub fn parse_duration(s: &str) -> Option<(u64, TimeUnit)> {
        let s = s.trim();

        let split_pos = s.chars().position(|c| !c.is_ascii_digit())?;
        if split_pos == 0 {
            return None;
        }

        let (num_str, unit_str) = s.split_at(split_pos);
        let value = num_str.parse::<u64>().ok()?;

        let time_unit = match unit_str {
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        };

        Some((value, time_unit))
    }
}
