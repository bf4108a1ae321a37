use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use super::field::{CronField, FieldKind};
use crate::error::CronError;

/// Search budget for the joint month/day resolution: up to 10 years of
/// month advances before a schedule is declared unsatisfiable. Guards
/// against impossible dates such as `Feb 30` looping forever.
const MAX_MONTH_ADVANCES: u32 = 120;

/// A parsed 6-field cron expression:
/// `second minute hour day-of-month month day-of-week`.
///
/// Immutable and stateless after construction; safe to clone and share
/// across any number of scheduled tasks.
#[derive(Debug, Clone)]
pub struct CronExpression {
    expr: String,
    second: CronField,
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpression {
    /// Parse an expression such as `"0 0/1 * * * ?"`. All validation is
    /// done here; a malformed expression never produces a value.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != 6 {
            return Err(CronError::FieldCount {
                expr: expr.to_string(),
                found: tokens.len(),
            });
        }
        // `? ?` leaves no day field to decide on
        if tokens[3] == "?" && tokens[5] == "?" {
            return Err(CronError::AmbiguousDayFields);
        }

        Ok(Self {
            expr: tokens.join(" "),
            second: CronField::parse(tokens[0], FieldKind::Second)?,
            minute: CronField::parse(tokens[1], FieldKind::Minute)?,
            hour: CronField::parse(tokens[2], FieldKind::Hour)?,
            day_of_month: CronField::parse(tokens[3], FieldKind::DayOfMonth)?,
            month: CronField::parse(tokens[4], FieldKind::Month)?,
            day_of_week: CronField::parse(tokens[5], FieldKind::DayOfWeek)?,
        })
    }

    /// The earliest instant strictly after `after` satisfying all six
    /// fields, in `after`'s own timezone. Pure in `(self, after)`: the
    /// same input always yields the same output, and feeding the output
    /// back in strictly advances.
    pub fn next_execution_after<Tz: TimeZone>(
        &self,
        after: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, CronError> {
        let naive = after.naive_local();
        let naive = naive.with_nanosecond(0).unwrap_or(naive);
        let next = self.next_naive(naive, after)?;
        // Fixed-offset zones always map back uniquely; an ambiguous
        // mapping resolves to the earliest instant.
        after
            .timezone()
            .from_local_datetime(&next)
            .earliest()
            .ok_or_else(|| self.unsatisfiable(after))
    }

    /// Decompose an instant and test it against all six predicates,
    /// applying the day-of-month/day-of-week OR rule.
    pub fn matches_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let t = at.naive_local();
        self.second.matches(t.second())
            && self.minute.matches(t.minute())
            && self.hour.matches(t.hour())
            && self.month.matches(t.month())
            && self.day_matches(t.year(), t.month(), t.day())
    }

    fn next_naive<Tz: TimeZone>(
        &self,
        base: NaiveDateTime,
        after: &DateTime<Tz>,
    ) -> Result<NaiveDateTime, CronError> {
        let mut t = base + Duration::seconds(1);

        // Seconds, bounded to one full minute of advances.
        let mut steps = 0;
        while !self.second.matches(t.second()) && steps < 60 {
            t = t + Duration::seconds(1);
            steps += 1;
        }

        // Minutes, resetting seconds to their first valid value.
        steps = 0;
        while !self.minute.matches(t.minute()) && steps < 60 {
            t = t + Duration::minutes(1);
            t = set_time(t, t.hour(), t.minute(), self.second.first_valid());
            steps += 1;
        }

        // Hours, resetting minute and second.
        steps = 0;
        while !self.hour.matches(t.hour()) && steps < 24 {
            t = t + Duration::hours(1);
            t = set_time(
                t,
                t.hour(),
                self.minute.first_valid(),
                self.second.first_valid(),
            );
            steps += 1;
        }

        // Month and day are resolved jointly: day validity depends on the
        // month's actual length (and the year, for leap-year February).
        for _ in 0..MAX_MONTH_ADVANCES {
            if !self.month.matches(t.month()) {
                t = self
                    .first_of_next_month(t)
                    .ok_or_else(|| self.unsatisfiable(after))?;
                continue;
            }

            let last_day = days_in_month(t.year(), t.month());
            let found = (t.day()..=last_day).find(|d| self.day_matches(t.year(), t.month(), *d));
            match found {
                Some(day) if day == t.day() => return Ok(t),
                Some(day) => {
                    let date = NaiveDate::from_ymd_opt(t.year(), t.month(), day)
                        .ok_or_else(|| self.unsatisfiable(after))?;
                    return date
                        .and_hms_opt(
                            self.hour.first_valid(),
                            self.minute.first_valid(),
                            self.second.first_valid(),
                        )
                        .ok_or_else(|| self.unsatisfiable(after));
                }
                None => {
                    t = self
                        .first_of_next_month(t)
                        .ok_or_else(|| self.unsatisfiable(after))?;
                }
            }
        }

        Err(self.unsatisfiable(after))
    }

    /// OR semantics: with both day fields unrestricted every day matches;
    /// with exactly one restricted that predicate decides alone; with both
    /// restricted a day matches if either predicate accepts it.
    fn day_matches(&self, year: i32, month: u32, day: u32) -> bool {
        let weekday = NaiveDate::from_ymd_opt(year, month, day)
            .map(|d| d.weekday().num_days_from_sunday());
        let dom_hit = self.day_of_month.matches(day);
        let dow_hit = weekday.map(|w| self.day_of_week.matches(w)).unwrap_or(false);

        match (
            self.day_of_month.is_unrestricted(),
            self.day_of_week.is_unrestricted(),
        ) {
            (true, true) => true,
            (false, true) => dom_hit,
            (true, false) => dow_hit,
            (false, false) => dom_hit || dow_hit,
        }
    }

    /// First day of the month after `t`, with hour/minute/second reset to
    /// their fields' first valid values.
    fn first_of_next_month(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let (year, month) = if t.month() == 12 {
            (t.year() + 1, 1)
        } else {
            (t.year(), t.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(
            self.hour.first_valid(),
            self.minute.first_valid(),
            self.second.first_valid(),
        )
    }

    fn unsatisfiable<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> CronError {
        CronError::Unsatisfiable {
            expr: self.expr.clone(),
            after: after.naive_local().to_string(),
            months: MAX_MONTH_ADVANCES,
        }
    }
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

fn set_time(t: NaiveDateTime, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    t.date()
        .and_hms_opt(hour, minute, second)
        .unwrap_or(t)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn is_leap_year(year: i32) -> bool {
    if year % 400 == 0 {
        true
    } else if year % 100 == 0 {
        false
    } else {
        year % 4 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(
            CronExpression::parse("0 0 0 * *").unwrap_err(),
            CronError::FieldCount { found: 5, .. }
        ));
        assert!(matches!(
            CronExpression::parse("0 0 0 * * * 2024").unwrap_err(),
            CronError::FieldCount { found: 7, .. }
        ));
    }

    #[test]
    fn rejects_both_day_fields_question() {
        assert!(matches!(
            CronExpression::parse("? ? ? ? ? ?").unwrap_err(),
            CronError::AmbiguousDayFields
        ));
        assert!(matches!(
            CronExpression::parse("0 0 0 ? * ?").unwrap_err(),
            CronError::AmbiguousDayFields
        ));
    }

    #[test]
    fn rejects_out_of_range_second() {
        assert!(matches!(
            CronExpression::parse("60 0 0 1 1 ?").unwrap_err(),
            CronError::OutOfRange { value: 60, .. }
        ));
    }

    #[test]
    fn both_wildcard_day_fields_allowed() {
        let expr = CronExpression::parse("0 0 0 * * *").unwrap();
        let next = expr.next_execution_after(&utc(2025, 3, 10, 5, 30, 0)).unwrap();
        assert_eq!(next, utc(2025, 3, 11, 0, 0, 0));
    }

    #[test]
    fn top_of_every_minute() {
        let expr = CronExpression::parse("0 0/1 * * * ?").unwrap();
        let next = expr.next_execution_after(&utc(2025, 1, 1, 10, 0, 30)).unwrap();
        assert_eq!(next, utc(2025, 1, 1, 10, 1, 0));
    }

    #[test]
    fn every_fifteen_seconds() {
        let expr = CronExpression::parse("0/15 * * * * ?").unwrap();
        let next = expr.next_execution_after(&utc(2025, 1, 1, 10, 0, 30)).unwrap();
        assert_eq!(next, utc(2025, 1, 1, 10, 0, 45));
        let next = expr.next_execution_after(&next).unwrap();
        assert_eq!(next, utc(2025, 1, 1, 10, 1, 0));
    }

    #[test]
    fn midnight_january_first() {
        let expr = CronExpression::parse("0 0 0 1 1 ?").unwrap();
        let next = expr.next_execution_after(&utc(2024, 6, 15, 12, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 1, 1, 0, 0, 0));
    }

    #[test]
    fn leap_year_february_29() {
        let expr = CronExpression::parse("0 0 0 29 2 ?").unwrap();
        let next = expr.next_execution_after(&utc(2023, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 2, 29, 0, 0, 0));
        // and from just after it, the next one is four years out
        let next = expr.next_execution_after(&next).unwrap();
        assert_eq!(next, utc(2028, 2, 29, 0, 0, 0));
    }

    #[test]
    fn century_leap_rule() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2025, 4), 30);
    }

    #[test]
    fn impossible_date_is_unsatisfiable() {
        // April has 30 days; the search budget must end the hunt
        let expr = CronExpression::parse("0 0 0 31 4 ?").unwrap();
        assert!(matches!(
            expr.next_execution_after(&utc(2025, 1, 1, 0, 0, 0)).unwrap_err(),
            CronError::Unsatisfiable { .. }
        ));
    }

    #[test]
    fn day_or_semantics_fires_on_monday_not_the_first() {
        // noon on the 1st of any month OR any Monday
        let expr = CronExpression::parse("0 0 12 1 * MON").unwrap();
        // 2025-01-01 is a Wednesday; the next hit after it must be
        // Monday Jan 6, not Feb 1
        let next = expr.next_execution_after(&utc(2025, 1, 1, 13, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 1, 6, 12, 0, 0));
        // and from just before noon on the 1st, the 1st itself wins
        let next = expr.next_execution_after(&utc(2025, 2, 1, 11, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 2, 1, 12, 0, 0));
    }

    #[test]
    fn restricted_day_of_week_alone_decides() {
        let expr = CronExpression::parse("0 0 9 ? * MON").unwrap();
        // 2025-06-11 is a Wednesday
        let next = expr.next_execution_after(&utc(2025, 6, 11, 0, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 6, 16, 9, 0, 0));
    }

    #[test]
    fn restricted_day_of_month_alone_decides() {
        let expr = CronExpression::parse("0 30 8 15 * ?").unwrap();
        let next = expr.next_execution_after(&utc(2025, 6, 16, 0, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 7, 15, 8, 30, 0));
    }

    #[test]
    fn results_are_strictly_increasing_and_self_consistent() {
        let expr = CronExpression::parse("0/15 10-12 * * * ?").unwrap();
        let mut t = utc(2025, 1, 31, 11, 59, 50);
        for _ in 0..50 {
            let next = expr.next_execution_after(&t).unwrap();
            assert!(next > t);
            assert!(expr.matches_at(&next));
            t = next;
        }
    }

    #[test]
    fn deterministic() {
        let expr = CronExpression::parse("0 0 6 * * FRI").unwrap();
        let after = utc(2025, 5, 1, 0, 0, 0);
        assert_eq!(
            expr.next_execution_after(&after).unwrap(),
            expr.next_execution_after(&after).unwrap()
        );
    }

    #[test]
    fn month_rollover_resets_lower_fields() {
        let expr = CronExpression::parse("30 45 13 10 6 ?").unwrap();
        let next = expr.next_execution_after(&utc(2025, 6, 20, 0, 0, 0)).unwrap();
        assert_eq!(next, utc(2026, 6, 10, 13, 45, 30));
    }

    #[test]
    fn fixed_offset_zone_uses_local_calendar() {
        let zone = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let after = zone.with_ymd_and_hms(2025, 6, 15, 23, 30, 0).unwrap();
        let expr = CronExpression::parse("0 0 0 * * ?").unwrap();
        let next = expr.next_execution_after(&after).unwrap();
        assert_eq!(next, zone.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap());
        assert_eq!(next.offset(), after.offset());
    }

    #[test]
    fn sub_second_reference_truncates_to_whole_seconds() {
        let expr = CronExpression::parse("* * * * * ?").unwrap();
        let after = utc(2025, 1, 1, 10, 0, 0) + Duration::milliseconds(250);
        let next = expr.next_execution_after(&after).unwrap();
        assert_eq!(next, utc(2025, 1, 1, 10, 0, 1));
    }

    #[test]
    fn display_round_trips_normalized_text() {
        let expr = CronExpression::parse("  0 0/1 *   * * ?").unwrap();
        assert_eq!(expr.to_string(), "0 0/1 * * * ?");
        assert_eq!("0 0/1 * * * ?".parse::<CronExpression>().unwrap().to_string(), expr.to_string());
    }
}
