//! Cron expression parser with a seconds field.
//!
//! Six fields: `second minute hour day-of-month month day-of-week`.
//! Supports `*`, `*/N` (step), `N` (literal), `N-M` (range), `N,M` (list),
//! and stepped ranges `N-M/S`.

use chrono::{Datelike, Timelike};

use crate::ScheduleError;

/// A parsed 6-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    seconds: Vec<u32>,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>, // 0=Sun, 6=Sat
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let invalid = |reason: String| ScheduleError::InvalidExpression {
            expr: expr.to_string(),
            reason,
        };

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(invalid(format!(
                "expected 6 fields (second minute hour dom month dow), got {}",
                fields.len()
            )));
        }

        Ok(CronExpr {
            seconds: parse_field(fields[0], 0, 59).map_err(invalid)?,
            minutes: parse_field(fields[1], 0, 59).map_err(invalid)?,
            hours: parse_field(fields[2], 0, 23).map_err(invalid)?,
            days_of_month: parse_field(fields[3], 1, 31).map_err(invalid)?,
            months: parse_field(fields[4], 1, 12).map_err(invalid)?,
            days_of_week: parse_field(fields[5], 0, 6).map_err(invalid)?,
        })
    }

    /// Check if the given instant (to the second) matches this expression.
    pub fn matches<T: Datelike + Timelike>(&self, dt: &T) -> bool {
        self.seconds.contains(&dt.second())
            && self.minutes.contains(&dt.minute())
            && self.hours.contains(&dt.hour())
            && self.days_of_month.contains(&dt.day())
            && self.months.contains(&dt.month())
            && self.days_of_week.contains(&dt.weekday().num_days_from_sunday())
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
    let mut values = Vec::new();

    for part in field.split(',') {
        if let Some((base, step)) = part.split_once('/') {
            let step: u32 = step.parse().map_err(|_| format!("invalid step: {step}"))?;
            if step == 0 {
                return Err("step cannot be zero".into());
            }
            let (start, end) = if base == "*" {
                (min, max)
            } else if base.contains('-') {
                parse_range(base, min, max)?
            } else {
                (parse_value(base, min, max)?, max)
            };
            values.extend((start..=end).step_by(step as usize));
        } else if part.contains('-') {
            let (start, end) = parse_range(part, min, max)?;
            values.extend(start..=end);
        } else if part == "*" {
            values.extend(min..=max);
        } else {
            values.push(parse_value(part, min, max)?);
        }
    }

    values.sort_unstable();
    values.dedup();
    if values.is_empty() {
        return Err("field produced no values".into());
    }
    Ok(values)
}

fn parse_value(s: &str, min: u32, max: u32) -> Result<u32, String> {
    let v: u32 = s.parse().map_err(|_| format!("invalid number: {s}"))?;
    if v < min || v > max {
        return Err(format!("{v} out of range {min}-{max}"));
    }
    Ok(v)
}

fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| format!("invalid range: {s}"))?;
    let start = parse_value(start, min, max)?;
    let end = parse_value(end, min, max)?;
    if start > end {
        return Err(format!("range {start}-{end} is reversed"));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn every_second() {
        let expr = CronExpr::parse("* * * * * *").unwrap();
        assert_eq!(expr.seconds.len(), 60);
        assert!(expr.matches(&at(2026, 3, 1, 12, 0, 17)));
    }

    #[test]
    fn daily_at_half_past_eight() {
        let expr = CronExpr::parse("0 30 8 * * *").unwrap();
        assert!(expr.matches(&at(2026, 3, 1, 8, 30, 0)));
        assert!(!expr.matches(&at(2026, 3, 1, 8, 30, 1)));
        assert!(!expr.matches(&at(2026, 3, 1, 9, 30, 0)));
    }

    #[test]
    fn steps_and_stepped_ranges() {
        let expr = CronExpr::parse("*/15 0-30/10 * * * *").unwrap();
        assert_eq!(expr.seconds, vec![0, 15, 30, 45]);
        assert_eq!(expr.minutes, vec![0, 10, 20, 30]);
    }

    #[test]
    fn lists_are_sorted_and_deduplicated() {
        let expr = CronExpr::parse("5,1,5 * * * * 1-5").unwrap();
        assert_eq!(expr.seconds, vec![1, 5]);
        assert_eq!(expr.days_of_week, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn weekday_matching() {
        // 2026-10-17 is a Saturday
        let expr = CronExpr::parse("0 0 9 * * 6").unwrap();
        assert!(expr.matches(&at(2026, 10, 17, 9, 0, 0)));
        assert!(!expr.matches(&at(2026, 10, 18, 9, 0, 0)));
    }

    #[test]
    fn five_field_expression_rejected() {
        let err = CronExpr::parse("*/5 * * * *").unwrap_err();
        assert!(err.to_string().contains("expected 6 fields"));
    }

    #[test]
    fn invalid_fields_rejected() {
        assert!(CronExpr::parse("60 * * * * *").is_err());
        assert!(CronExpr::parse("* * 24 * * *").is_err());
        assert!(CronExpr::parse("* * * 0 * *").is_err());
        assert!(CronExpr::parse("*/0 * * * * *").is_err());
        assert!(CronExpr::parse("10-5 * * * * *").is_err());
        assert!(CronExpr::parse("a * * * * *").is_err());
    }
}
