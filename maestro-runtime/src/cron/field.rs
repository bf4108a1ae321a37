use std::collections::BTreeSet;

use crate::error::CronError;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Position of a field within a cron expression. Carries the field's
/// valid range, its diagnostic name and whether a bare `?` is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Second => "second",
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
        }
    }

    /// Inclusive range of valid values. Day-of-week runs 0..=6 with 0 = Sunday.
    pub fn range(self) -> (u32, u32) {
        match self {
            FieldKind::Second | FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 6),
        }
    }

    fn allows_question(self) -> bool {
        matches!(self, FieldKind::DayOfMonth | FieldKind::DayOfWeek)
    }

    /// Three-letter name alias (JAN..DEC, SUN..SAT), case-insensitive.
    fn alias(self, token: &str) -> Option<u32> {
        let table: &[&str] = match self {
            FieldKind::Month => &MONTH_NAMES,
            FieldKind::DayOfWeek => &DAY_NAMES,
            _ => return None,
        };
        let upper = token.to_ascii_uppercase();
        let pos = table.iter().position(|n| *n == upper)? as u32;
        Some(pos + self.range().0)
    }
}

/// One parsed cron field: an immutable membership set over the field's
/// declared range. All syntax and range validation happens at parse time.
#[derive(Debug, Clone)]
pub struct CronField {
    expr: String,
    kind: FieldKind,
    values: BTreeSet<u32>,
    first: u32,
    unrestricted: bool,
}

impl CronField {
    pub fn parse(token: &str, kind: FieldKind) -> Result<Self, CronError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CronError::EmptyField { field: kind.name() });
        }

        let (min, max) = kind.range();
        if token == "*" || token == "?" {
            if token == "?" && !kind.allows_question() {
                return Err(CronError::QuestionNotAllowed { field: kind.name() });
            }
            return Ok(Self {
                expr: token.to_string(),
                kind,
                values: (min..=max).collect(),
                first: min,
                unrestricted: true,
            });
        }

        let mut values = BTreeSet::new();
        for part in token.split(',') {
            values.extend(Self::parse_part(part, kind)?);
        }
        let first = values
            .iter()
            .next()
            .copied()
            .ok_or(CronError::EmptyField { field: kind.name() })?;

        Ok(Self {
            expr: token.to_string(),
            kind,
            values,
            first,
            unrestricted: false,
        })
    }

    /// One list element: a step, a range or a single value.
    fn parse_part(part: &str, kind: FieldKind) -> Result<BTreeSet<u32>, CronError> {
        if part.is_empty() {
            return Err(CronError::EmptyField { field: kind.name() });
        }

        if let Some((base, step)) = part.split_once('/') {
            return Self::parse_step(part, base, step, kind);
        }
        if part.contains('-') {
            let (lo, hi) = Self::parse_range(part, kind)?;
            return Ok((lo..=hi).collect());
        }
        let value = Self::parse_value(part, kind)?;
        Ok(BTreeSet::from([value]))
    }

    /// `base/step` where base is `*`, a range, or a single start value
    /// running through the end of the field's range. A step that selects
    /// fewer than two values (e.g. `59/2` over seconds) is rejected.
    fn parse_step(
        part: &str,
        base: &str,
        step: &str,
        kind: FieldKind,
    ) -> Result<BTreeSet<u32>, CronError> {
        let step: u32 = step.parse().map_err(|_| CronError::InvalidStep {
            field: kind.name(),
            token: part.to_string(),
        })?;
        if step == 0 {
            return Err(CronError::InvalidStep {
                field: kind.name(),
                token: part.to_string(),
            });
        }

        let (lo, hi) = if base == "*" {
            kind.range()
        } else if base.contains('-') {
            Self::parse_range(base, kind)?
        } else {
            (Self::parse_value(base, kind)?, kind.range().1)
        };

        let values: BTreeSet<u32> = (lo..=hi).filter(|v| (v - lo) % step == 0).collect();
        if values.len() < 2 {
            return Err(CronError::DegenerateStep {
                field: kind.name(),
                token: part.to_string(),
            });
        }
        Ok(values)
    }

    fn parse_range(text: &str, kind: FieldKind) -> Result<(u32, u32), CronError> {
        let (lo, hi) = text.split_once('-').ok_or_else(|| CronError::InvalidValue {
            field: kind.name(),
            token: text.to_string(),
        })?;
        let lo = Self::parse_value(lo, kind)?;
        let hi = Self::parse_value(hi, kind)?;
        if lo > hi {
            return Err(CronError::InvalidRange {
                field: kind.name(),
                token: text.to_string(),
            });
        }
        Ok((lo, hi))
    }

    fn parse_value(text: &str, kind: FieldKind) -> Result<u32, CronError> {
        let value = match kind.alias(text) {
            Some(v) => v,
            None => text.parse::<u32>().map_err(|_| CronError::InvalidValue {
                field: kind.name(),
                token: text.to_string(),
            })?,
        };
        let (min, max) = kind.range();
        if value < min || value > max {
            return Err(CronError::OutOfRange {
                field: kind.name(),
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    /// Whether the parsed predicate accepts `value`. Callers pass values
    /// inside the field's declared range.
    pub fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    /// Smallest value accepted by the predicate. Used to reset lower-order
    /// fields when a higher-order field advances.
    pub fn first_valid(&self) -> u32 {
        self.first
    }

    /// True only for `*` or a permitted `?`.
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }
}
