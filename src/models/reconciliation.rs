use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One normalized spreadsheet row. Rows carrying a worker name feed the
/// worker-level comparison; all others feed the daily comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRow {
    #[serde(default)]
    pub source_file: String,
    pub location_name: String,
    /// Date as it appeared in the sheet (`YYYY-MM-DD`, `DD/MM/YYYY`,
    /// `D-M-YYYY` or a serial day number).
    pub date: String,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub hours: Option<f64>,
    #[serde(default)]
    pub wage_cost: Option<f64>,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
}

impl ReferenceRow {
    pub fn is_worker_row(&self) -> bool {
        self.worker_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateFilter {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub location_ids: Option<Vec<String>>,
}

impl DateFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            location_ids: None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn allows_location(&self, location_id: &str) -> bool {
        self.location_ids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| id == location_id))
    }
}

/// Computed side of a daily comparison, read from persisted day entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputedDay {
    pub location_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub wage_cost: f64,
    pub revenue: f64,
}

/// Computed side of a worker comparison, read from persisted worker shares
/// and missing-wage entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputedWorker {
    pub location_id: String,
    pub date: NaiveDate,
    pub worker_name: String,
    pub team_name: String,
    pub hours: f64,
    /// Worked hours that were left out of revenue allocation.
    #[serde(default)]
    pub wage_missing: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    Hours,
    RevenuePerHour,
    LaborCostPercentage,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::Hours => "hours",
            Metric::RevenuePerHour => "revenue_per_hour",
            Metric::LaborCostPercentage => "labor_cost_percentage",
        }
    }

    pub fn mismatch_type(&self) -> DiscrepancyType {
        match self {
            Metric::Revenue => DiscrepancyType::RevenueMismatch,
            Metric::Hours => DiscrepancyType::HoursMismatch,
            Metric::RevenuePerHour => DiscrepancyType::ProductivityMismatch,
            Metric::LaborCostPercentage => DiscrepancyType::LaborCostMismatch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricComparison {
    pub metric: Metric,
    pub reference_value: f64,
    pub computed_value: f64,
    pub difference: f64,
    pub pct_difference: f64,
    pub is_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationVerification {
    /// None when the reference location name did not resolve.
    #[serde(default)]
    pub location_id: Option<String>,
    pub location_name: String,
    pub date: NaiveDate,
    pub source_files: Vec<String>,
    pub reference_rows: usize,
    /// False when no computed entry exists for the key.
    pub computed_found: bool,
    pub comparisons: Vec<MetricComparison>,
    pub is_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerVerification {
    #[serde(default)]
    pub location_id: Option<String>,
    pub location_name: String,
    pub date: NaiveDate,
    pub worker_name: String,
    pub team_name: String,
    pub reference_hours: f64,
    pub computed_hours: f64,
    pub difference: f64,
    pub pct_difference: f64,
    pub is_match: bool,
    pub found: bool,
    /// The worker exists in the computed data but had no usable wage.
    #[serde(default)]
    pub wage_missing: bool,
    /// Computed-side name when it was matched by similarity rather than
    /// exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    MissingLocation,
    MissingData,
    RevenueMismatch,
    HoursMismatch,
    ProductivityMismatch,
    LaborCostMismatch,
    WorkerNotFound,
    WorkerHoursMismatch,
}

impl DiscrepancyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyType::MissingLocation => "missing_location",
            DiscrepancyType::MissingData => "missing_data",
            DiscrepancyType::RevenueMismatch => "revenue_mismatch",
            DiscrepancyType::HoursMismatch => "hours_mismatch",
            DiscrepancyType::ProductivityMismatch => "productivity_mismatch",
            DiscrepancyType::LaborCostMismatch => "labor_cost_mismatch",
            DiscrepancyType::WorkerNotFound => "worker_not_found",
            DiscrepancyType::WorkerHoursMismatch => "worker_hours_mismatch",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            DiscrepancyType::MissingLocation
                | DiscrepancyType::MissingData
                | DiscrepancyType::WorkerNotFound
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    #[serde(rename = "type")]
    pub kind: DiscrepancyType,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    pub location_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub reference_value: f64,
    pub computed_value: f64,
    pub difference: f64,
    pub pct_difference: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub source_file: String,
    pub location_name: String,
    pub raw_date: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateSummary {
    pub date: NaiveDate,
    pub verified: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub missing: usize,
    pub unresolved: usize,
    pub workers_verified: usize,
    pub workers_matched: usize,
    pub workers_mismatched: usize,
    pub workers_not_found: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub total_verified: usize,
    pub match_count: usize,
    pub mismatch_count: usize,
    pub missing_count: usize,
    /// Reference keys, daily or worker, whose location name did not resolve.
    pub unresolved_count: usize,
    /// Equals the length of the report's discrepancy list.
    pub discrepancy_count: usize,
    /// Percentage of daily keys that matched, with unresolved worker keys
    /// counted as failures; 100 when there was nothing to verify.
    pub match_rate: f64,
    pub worker_total: usize,
    pub worker_match_count: usize,
    pub worker_mismatch_count: usize,
    pub worker_not_found_count: usize,
    pub by_date: Vec<DateSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub verifications: Vec<ReconciliationVerification>,
    pub worker_verifications: Vec<WorkerVerification>,
    pub discrepancies: Vec<Discrepancy>,
    pub skipped: Vec<SkippedRow>,
    pub summary: ReconcileSummary,
}
