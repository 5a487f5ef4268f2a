//! Canonical period keys.
//!
//! Keys sort lexically in chronological order within one granularity:
//! `YYYY`, `YYYY-MM`, `YYYY-Www` (ISO week, ISO week-year), `YYYY-MM-DD`,
//! `YYYY-MM-DDTHH`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::models::period::Granularity;

pub fn period_key(at: NaiveDateTime, granularity: Granularity) -> String {
    match granularity {
        Granularity::Hour => format!("{}T{:02}", at.date().format("%Y-%m-%d"), at.hour()),
        other => period_key_for_date(at.date(), other),
    }
}

/// Key for a calendar date; an hour key falls back to midnight.
pub fn period_key_for_date(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Year => format!("{:04}", date.year()),
        Granularity::Month => format!("{:04}-{:02}", date.year(), date.month()),
        Granularity::Week => iso_week_key(date),
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Hour => format!("{}T00", date.format("%Y-%m-%d")),
    }
}

/// Key for an instant, bucketed in the business timezone `tz`.
pub fn period_key_in<Tz: TimeZone>(at: &DateTime<Tz>, granularity: Granularity) -> String {
    period_key(at.naive_local(), granularity)
}

pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}
