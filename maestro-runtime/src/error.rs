use thiserror::Error;

/// Errors raised while parsing a cron expression or computing its next
/// execution instant. Parse variants are surfaced at construction time;
/// the expression is never left half-built.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("cron expression '{expr}' must have 6 fields, found {found}")]
    FieldCount { expr: String, found: usize },

    #[error("{field} field is empty")]
    EmptyField { field: &'static str },

    #[error("{field} field '{token}' is not a valid value")]
    InvalidValue { field: &'static str, token: String },

    #[error("{field} field value {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("{field} field range '{token}' must run from low to high")]
    InvalidRange { field: &'static str, token: String },

    #[error("{field} field step '{token}' must use a positive integer step")]
    InvalidStep { field: &'static str, token: String },

    #[error("{field} field step '{token}' selects fewer than two values")]
    DegenerateStep { field: &'static str, token: String },

    #[error("'?' is not allowed in the {field} field")]
    QuestionNotAllowed { field: &'static str },

    #[error("day-of-month and day-of-week cannot both be '?'")]
    AmbiguousDayFields,

    #[error("no instant matching '{expr}' within {months} months after {after}")]
    Unsatisfiable {
        expr: String,
        after: String,
        months: u32,
    },
}

/// Errors raised while resolving schedule definitions from configuration.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("invalid time unit '{0}'")]
    InvalidTimeUnit(String),

    #[error("invalid zone '{0}': expected UTC, Z or a +HH:MM / -HH:MM offset")]
    InvalidZone(String),

    #[error("unknown schedule type '{0}'")]
    UnknownScheduleType(String),
}
