use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::period::Granularity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Location,
    Product,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Location => "location",
            SubjectKind::Product => "product",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "location" => Some(SubjectKind::Location),
            "product" => Some(SubjectKind::Product),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct SubjectKey {
    pub kind: SubjectKind,
    pub id: String,
}

impl SubjectKey {
    pub fn location(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Location,
            id: id.into(),
        }
    }

    pub fn product(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Product,
            id: id.into(),
        }
    }
}

/// Additive totals carried by every period and location entry.
///
/// `quantity` is worked hours for location subjects and sold units for
/// product subjects.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub count: i64,
}

impl MetricTotals {
    pub fn new(quantity: f64, cost: f64, revenue: f64, count: i64) -> Self {
        Self {
            quantity,
            cost,
            revenue,
            count,
        }
    }

    pub fn add(&self, other: &MetricTotals) -> MetricTotals {
        MetricTotals {
            quantity: self.quantity + other.quantity,
            cost: self.cost + other.cost,
            revenue: self.revenue + other.revenue,
            count: self.count + other.count,
        }
    }

    pub fn sub(&self, other: &MetricTotals) -> MetricTotals {
        MetricTotals {
            quantity: self.quantity - other.quantity,
            cost: self.cost - other.cost,
            revenue: self.revenue - other.revenue,
            count: self.count - other.count,
        }
    }

    pub fn rounded(&self) -> MetricTotals {
        MetricTotals {
            quantity: round_metric(self.quantity),
            cost: round_metric(self.cost),
            revenue: round_metric(self.revenue),
            count: self.count,
        }
    }

    pub fn revenue_per_hour(&self) -> f64 {
        revenue_per_hour(self.revenue, self.quantity)
    }

    pub fn labor_cost_percentage(&self) -> f64 {
        labor_cost_percentage(self.cost, self.revenue)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationTotals {
    pub location_id: String,
    #[serde(default)]
    pub location_name: String,
    #[serde(flatten)]
    pub totals: MetricTotals,
}

/// One bucket of a hierarchical aggregate. `period` is the canonical
/// period key (`2024`, `2024-06`, `2024-W22`, `2024-06-01`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodEntry {
    pub period: String,
    #[serde(flatten)]
    pub totals: MetricTotals,
    #[serde(default)]
    pub by_location: Vec<LocationTotals>,
}

impl PeriodEntry {
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            totals: MetricTotals::default(),
            by_location: Vec::new(),
        }
    }

    /// Period totals are always the sum of the location breakdown.
    pub fn recompute_totals(&mut self) {
        self.by_location
            .sort_by(|a, b| a.location_id.cmp(&b.location_id));
        self.totals = self
            .by_location
            .iter()
            .fold(MetricTotals::default(), |acc, entry| acc.add(&entry.totals))
            .rounded();
    }

    pub fn location(&self, location_id: &str) -> Option<&LocationTotals> {
        self.by_location
            .iter()
            .find(|entry| entry.location_id == location_id)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.period, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalAggregate {
    pub subject: SubjectKey,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub by_year: Vec<PeriodEntry>,
    #[serde(default)]
    pub by_month: Vec<PeriodEntry>,
    #[serde(default)]
    pub by_week: Vec<PeriodEntry>,
    #[serde(default)]
    pub by_day: Vec<PeriodEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl HierarchicalAggregate {
    pub fn empty(subject: SubjectKey, subject_name: impl Into<String>) -> Self {
        Self {
            subject,
            subject_name: subject_name.into(),
            by_year: Vec::new(),
            by_month: Vec::new(),
            by_week: Vec::new(),
            by_day: Vec::new(),
            last_run_id: None,
            updated_at: None,
        }
    }

    pub fn entries(&self, granularity: Granularity) -> &[PeriodEntry] {
        match granularity {
            Granularity::Year => &self.by_year,
            Granularity::Month => &self.by_month,
            Granularity::Week => &self.by_week,
            Granularity::Day | Granularity::Hour => &self.by_day,
        }
    }

    pub fn entries_mut(&mut self, granularity: Granularity) -> &mut Vec<PeriodEntry> {
        match granularity {
            Granularity::Year => &mut self.by_year,
            Granularity::Month => &mut self.by_month,
            Granularity::Week => &mut self.by_week,
            Granularity::Day | Granularity::Hour => &mut self.by_day,
        }
    }

    pub fn find(&self, granularity: Granularity, period: &str) -> Option<&PeriodEntry> {
        self.entries(granularity)
            .iter()
            .find(|entry| entry.period == period)
    }

    pub fn is_empty(&self) -> bool {
        Granularity::persisted()
            .iter()
            .all(|granularity| self.entries(*granularity).is_empty())
    }

    /// Lists violated structural invariants: duplicate period keys and
    /// period totals that disagree with their location breakdown.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for granularity in Granularity::persisted() {
            let entries = self.entries(granularity);
            let mut seen = std::collections::HashSet::new();
            for entry in entries {
                if !seen.insert(entry.period.as_str()) {
                    violations.push(format!(
                        "duplicate {} key {}",
                        granularity.as_str(),
                        entry.period
                    ));
                }
                let summed = entry
                    .by_location
                    .iter()
                    .fold(MetricTotals::default(), |acc, loc| acc.add(&loc.totals))
                    .rounded();
                if !totals_close(&summed, &entry.totals) {
                    violations.push(format!(
                        "{} {} totals disagree with location breakdown",
                        granularity.as_str(),
                        entry.period
                    ));
                }
            }
        }
        violations
    }
}

pub fn revenue_per_hour(revenue: f64, hours: f64) -> f64 {
    if hours > 0.0 {
        revenue / hours
    } else {
        0.0
    }
}

pub fn labor_cost_percentage(wage_cost: f64, revenue: f64) -> f64 {
    if revenue == 0.0 || wage_cost == 0.0 {
        0.0
    } else {
        100.0 * wage_cost / revenue
    }
}

pub fn round_metric(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10_000.0).round() / 10_000.0
    } else {
        0.0
    }
}

pub fn totals_close(a: &MetricTotals, b: &MetricTotals) -> bool {
    const EPSILON: f64 = 1e-6;
    (a.quantity - b.quantity).abs() < EPSILON
        && (a.cost - b.cost).abs() < EPSILON
        && (a.revenue - b.revenue).abs() < EPSILON
        && a.count == b.count
}
