//! Configuration support: file loading, `${key}` placeholder resolution
//! and schedule definitions that resolve into runnable registrations.

use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::cron::CronExpression;
use crate::error::ScheduleError;
use crate::scheduler::Trigger;
use crate::task::ScheduleConfig;
use crate::time_unit::TimeUnit;

/// Load config from a specific TOML file, layered with `APP_`-prefixed
/// environment variables.
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config, ScheduleError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .add_source(config::Environment::with_prefix("APP").separator("_"))
        .build()?;
    Ok(config)
}

/// Load config from a specific YAML file, layered with `APP_`-prefixed
/// environment variables.
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config, ScheduleError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
        .add_source(config::Environment::with_prefix("APP").separator("_"))
        .build()?;
    Ok(config)
}

/// Resolve a config placeholder like `${app.interval}` or
/// `${app.interval:default}`. Plain values pass through unchanged.
pub fn resolve_config_value(value: &str, config: &Config) -> Result<String, ScheduleError> {
    if value.starts_with("${") && value.ends_with('}') {
        let inner = &value[2..value.len() - 1];

        if let Some(colon_pos) = inner.find(':') {
            let key = &inner[..colon_pos];
            let default_value = &inner[colon_pos + 1..];

            match config.get_string(key) {
                Ok(resolved) => Ok(resolved),
                Err(_) => Ok(default_value.to_string()),
            }
        } else {
            Ok(config.get_string(inner)?)
        }
    } else {
        Ok(value.to_string())
    }
}

/// Parse an interval value: either a shorthand duration ("5s", "500ms")
/// or a bare integer scaled by `default_unit`.
pub fn parse_interval(value: &str, default_unit: TimeUnit) -> Result<Duration, ScheduleError> {
    if let Some((amount, unit)) = TimeUnit::parse_duration(value) {
        return Ok(unit.to_duration(amount));
    }
    value
        .parse::<u64>()
        .map(|amount| default_unit.to_duration(amount))
        .map_err(|_| ScheduleError::InvalidDuration(value.to_string()))
}

/// Parse a fixed-offset zone: "UTC", "Z" or "+HH:MM" / "-HH:MM".
pub fn parse_zone(value: &str) -> Result<FixedOffset, ScheduleError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
        return Ok(Utc.fix());
    }

    let invalid = || ScheduleError::InvalidZone(value.to_string());
    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// A task schedule as declared in a config file. Every string field may
/// be a `${key}` / `${key:default}` placeholder.
///
/// ```toml
/// [[schedules]]
/// name = "cleanup"
/// schedule_type = "cron"
/// value = "0 0 3 * * ?"
/// zone = "+07:00"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleDefinition {
    pub name: String,
    /// "cron", "fixed_rate" or "fixed_delay".
    pub schedule_type: String,
    /// Cron expression, or interval for the fixed modes.
    pub value: String,
    #[serde(default)]
    pub initial_delay: Option<String>,
    /// Unit applied to bare-integer intervals; defaults to milliseconds.
    #[serde(default)]
    pub time_unit: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    /// Anything but "false" (after resolution) keeps the task enabled.
    #[serde(default)]
    pub enabled: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScheduleDefinition {
    /// Resolve placeholders against `config` and build the registration
    /// input for [`SchedulerService::schedule_task`]. Returns `Ok(None)`
    /// when the definition is disabled. A malformed cron value or
    /// interval fails the registration outright.
    ///
    /// [`SchedulerService::schedule_task`]: crate::SchedulerService::schedule_task
    pub fn into_registration(
        &self,
        config: &Config,
    ) -> Result<Option<(ScheduleConfig, Trigger)>, ScheduleError> {
        if let Some(enabled) = &self.enabled {
            if resolve_config_value(enabled, config)?.eq_ignore_ascii_case("false") {
                return Ok(None);
            }
        }

        let time_unit = match &self.time_unit {
            Some(unit) => resolve_config_value(unit, config)?.parse::<TimeUnit>()?,
            None => TimeUnit::Milliseconds,
        };

        let initial_delay = match &self.initial_delay {
            Some(delay) => parse_interval(&resolve_config_value(delay, config)?, time_unit)?,
            None => Duration::ZERO,
        };

        let zone = match &self.zone {
            Some(zone) => parse_zone(&resolve_config_value(zone, config)?)?,
            None => Utc.fix(),
        };

        let value = resolve_config_value(&self.value, config)?;
        let schedule_type = resolve_config_value(&self.schedule_type, config)?;
        let trigger = match schedule_type.as_str() {
            "cron" => Trigger::Cron(CronExpression::parse(&value)?),
            "fixed_rate" => Trigger::FixedRate(parse_interval(&value, time_unit)?),
            "fixed_delay" => Trigger::FixedDelay(parse_interval(&value, time_unit)?),
            other => return Err(ScheduleError::UnknownScheduleType(other.to_string())),
        };

        let schedule = ScheduleConfig::builder(&self.name)
            .tags(self.tags.iter().cloned())
            .initial_delay(initial_delay)
            .zone(zone)
            .build();

        Ok(Some((schedule, trigger)))
    }
}
