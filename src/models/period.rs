use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Year,
    Month,
    Week,
    Day,
    Hour,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Year => "year",
            Granularity::Month => "month",
            Granularity::Week => "week",
            Granularity::Day => "day",
            Granularity::Hour => "hour",
        }
    }

    /// Granularities persisted in a hierarchical aggregate, coarsest first.
    pub fn persisted() -> [Granularity; 4] {
        [
            Granularity::Year,
            Granularity::Month,
            Granularity::Week,
            Granularity::Day,
        ]
    }
}

/// Inclusive business-date window for one aggregation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> AppResult<Self> {
        if from > to {
            return Err(AppError::validation(format!(
                "date range is inverted: {from} > {to}"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.to
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let a = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(DateRange::new(a, b).is_err());
        let range = DateRange::new(b, a).unwrap();
        assert!(range.contains(a));
        assert!(range.contains(b));
        assert_eq!(range.days(), 2);
    }
}
