//! Cross-source reconciliation of reference rows against computed data.
//!
//! Everything here is a pure transform: the service layer loads the
//! computed side once per run and hands it in already indexed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::models::aggregate::{labor_cost_percentage, revenue_per_hour, round_metric};
use crate::models::directory::LocationDirectory;
use crate::models::reconciliation::{
    ComputedDay, ComputedWorker, DateFilter, DateSummary, Discrepancy, DiscrepancyType, Metric,
    MetricComparison, ReconcileSummary, ReconciliationVerification, ReferenceRow, Severity,
    SkippedRow, WorkerVerification,
};
use crate::models::settings::{EngineSettings, SeveritySettings, ToleranceSettings};
use crate::utils::text::{collapse_whitespace, normalize_key, normalize_person_name};

/// Largest spreadsheet serial accepted as a date (9999-12-31).
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

pub type ComputedDayIndex = HashMap<(String, NaiveDate), ComputedDay>;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileRules {
    pub tolerances: ToleranceSettings,
    pub severity: SeveritySettings,
    pub worker_name_similarity: f64,
}

impl ReconcileRules {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            tolerances: settings.tolerances.clone(),
            severity: settings.severity.clone(),
            worker_name_similarity: settings.worker_name_similarity,
        }
    }

    fn pct_threshold(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Revenue => self.tolerances.revenue_pct,
            Metric::Hours => self.tolerances.hours_pct,
            Metric::RevenuePerHour => self.tolerances.productivity_pct,
            Metric::LaborCostPercentage => self.tolerances.labor_cost_pct,
        }
    }

    pub fn severity_for(&self, pct_difference: f64) -> Severity {
        if pct_difference < self.severity.minor_pct {
            Severity::Minor
        } else if pct_difference < self.severity.major_pct {
            Severity::Major
        } else {
            Severity::Critical
        }
    }
}

impl Default for ReconcileRules {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyOutcome {
    pub verifications: Vec<ReconciliationVerification>,
    pub discrepancies: Vec<Discrepancy>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerOutcome {
    pub verifications: Vec<WorkerVerification>,
    pub discrepancies: Vec<Discrepancy>,
    pub skipped: Vec<SkippedRow>,
}

/// Parses a reference date: `YYYY-MM-DD`, `DD/MM/YYYY`, `D-M-YYYY`, a
/// date followed by a time part, or a spreadsheet serial day number
/// (days since 1899-12-30).
pub fn parse_reference_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(serial) = text.parse::<f64>() {
        if serial.is_finite() && serial >= 1.0 && serial <= MAX_SERIAL_DAY {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            return epoch.checked_add_signed(Duration::days(serial.floor() as i64));
        }
        return None;
    }

    let date_part = text
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(text);
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Percentage difference relative to the reference value.
pub fn pct_difference(reference: f64, computed: f64) -> f64 {
    if reference == 0.0 {
        if computed == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (computed - reference).abs() / reference.abs() * 100.0
    }
}

/// A metric matches when the absolute difference is under the floor or
/// the relative difference is under the metric's threshold.
pub fn compare_metric(metric: Metric, reference: f64, computed: f64, rules: &ReconcileRules) -> MetricComparison {
    let difference = computed - reference;
    let pct = pct_difference(reference, computed);
    let is_match =
        difference.abs() < rules.tolerances.absolute_floor || pct < rules.pct_threshold(metric);
    MetricComparison {
        metric,
        reference_value: round_metric(reference),
        computed_value: round_metric(computed),
        difference: round_metric(difference),
        pct_difference: round_metric(pct),
        is_match,
    }
}

/// Reference rows whose location name matched no known location, summed
/// per (name, date, worker).
#[derive(Debug, Default)]
struct UnresolvedReference {
    location_name: String,
    revenue: f64,
    hours: f64,
    worker_name: Option<String>,
    team_name: Option<String>,
    files: BTreeSet<String>,
    rows: usize,
}

type UnresolvedIndex = BTreeMap<(String, NaiveDate, String), UnresolvedReference>;

enum Resolved<'a> {
    Row(NaiveDate, &'a str, &'a str),
    Skip,
}

/// Shared first step: parse the date, resolve the location, apply the
/// filter. Unparseable dates go to `skipped`; unknown locations become
/// `missing_location` discrepancies, once per (name, date, worker).
fn resolve_row<'a>(
    row: &ReferenceRow,
    locations: &'a LocationDirectory,
    filter: &DateFilter,
    skipped: &mut Vec<SkippedRow>,
    unresolved: &mut UnresolvedIndex,
) -> Resolved<'a> {
    let Some(date) = parse_reference_date(&row.date) else {
        warn!(
            target: "app::reconcile",
            source_file = %row.source_file,
            raw_date = %row.date,
            "reference row with unreadable date skipped"
        );
        skipped.push(SkippedRow {
            source_file: row.source_file.clone(),
            location_name: row.location_name.clone(),
            raw_date: row.date.clone(),
            reason: "unreadable date".to_string(),
        });
        return Resolved::Skip;
    };
    if !filter.contains(date) {
        return Resolved::Skip;
    }

    match locations.resolve(&row.location_name) {
        Some(location) if filter.allows_location(&location.id) => {
            Resolved::Row(date, location.id.as_str(), location.name.as_str())
        }
        Some(_) => Resolved::Skip,
        None => {
            let worker_key = row
                .worker_name
                .as_deref()
                .map(normalize_person_name)
                .unwrap_or_default();
            let slot = unresolved
                .entry((normalize_key(&row.location_name), date, worker_key))
                .or_insert_with(|| UnresolvedReference {
                    location_name: collapse_whitespace(&row.location_name),
                    worker_name: row.worker_name.as_deref().map(collapse_whitespace),
                    team_name: row.team_name.as_deref().map(collapse_whitespace),
                    ..UnresolvedReference::default()
                });
            slot.revenue += row.revenue.unwrap_or(0.0);
            slot.hours += row.hours.unwrap_or(0.0);
            if !row.source_file.is_empty() {
                slot.files.insert(row.source_file.clone());
            }
            slot.rows += 1;
            Resolved::Skip
        }
    }
}

fn missing_location_discrepancy(date: NaiveDate, reference: &UnresolvedReference) -> Discrepancy {
    let name = &reference.location_name;
    warn!(target: "app::reconcile", location = %name, %date, "reference location not found");
    let reference_value = if reference.worker_name.is_some() {
        reference.hours
    } else {
        reference.revenue
    };
    Discrepancy {
        kind: DiscrepancyType::MissingLocation,
        severity: Severity::Critical,
        location_id: None,
        location_name: name.clone(),
        date: Some(date),
        worker_name: reference.worker_name.clone(),
        team_name: reference.team_name.clone(),
        reference_value: round_metric(reference_value),
        computed_value: 0.0,
        difference: round_metric(-reference_value),
        pct_difference: 100.0,
        message: format!("location '{name}' on {date} is not a known location"),
    }
}

fn add_optional(current: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (current, value) {
        (Some(a), Some(b)) => Some(a + b),
        (None, Some(b)) => Some(b),
        (a, None) => a,
    }
}

#[derive(Debug, Default)]
struct ReferenceDay {
    location_name: String,
    revenue: Option<f64>,
    hours: Option<f64>,
    wage_cost: Option<f64>,
    files: BTreeSet<String>,
    rows: usize,
}

/// Earliest and latest in-filter dates among `rows`, for batch loading
/// the computed side.
pub fn reference_span(rows: &[ReferenceRow], filter: &DateFilter) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = rows
        .iter()
        .filter_map(|row| parse_reference_date(&row.date))
        .filter(|date| filter.contains(*date));
    let first = dates.next()?;
    Some(dates.fold((first, first), |(min, max), date| (min.min(date), max.max(date))))
}

pub fn index_computed_days(days: impl IntoIterator<Item = ComputedDay>) -> ComputedDayIndex {
    let mut index = ComputedDayIndex::new();
    for day in days {
        let slot = index
            .entry((day.location_id.clone(), day.date))
            .or_insert_with(|| ComputedDay {
                location_id: day.location_id.clone(),
                date: day.date,
                ..ComputedDay::default()
            });
        slot.hours += day.hours;
        slot.wage_cost += day.wage_cost;
        slot.revenue += day.revenue;
    }
    index
}

/// Daily comparison. Reference rows are summed per (location, date)
/// across files before they are compared with the single computed entry.
pub fn reconcile_daily(
    rows: &[ReferenceRow],
    locations: &LocationDirectory,
    computed: &ComputedDayIndex,
    filter: &DateFilter,
    rules: &ReconcileRules,
) -> DailyOutcome {
    let mut outcome = DailyOutcome::default();
    let mut unresolved = BTreeMap::new();
    let mut grouped: BTreeMap<(String, NaiveDate), ReferenceDay> = BTreeMap::new();

    for row in rows.iter().filter(|row| !row.is_worker_row()) {
        let Resolved::Row(date, location_id, location_name) =
            resolve_row(row, locations, filter, &mut outcome.skipped, &mut unresolved)
        else {
            continue;
        };
        let day = grouped.entry((location_id.to_string(), date)).or_default();
        day.location_name = location_name.to_string();
        day.revenue = add_optional(day.revenue, row.revenue);
        day.hours = add_optional(day.hours, row.hours);
        day.wage_cost = add_optional(day.wage_cost, row.wage_cost);
        if !row.source_file.is_empty() {
            day.files.insert(row.source_file.clone());
        }
        day.rows += 1;
    }
    for ((_, date, _), reference) in unresolved {
        outcome
            .discrepancies
            .push(missing_location_discrepancy(date, &reference));
        outcome.verifications.push(ReconciliationVerification {
            location_id: None,
            location_name: reference.location_name,
            date,
            source_files: reference.files.into_iter().collect(),
            reference_rows: reference.rows,
            computed_found: false,
            comparisons: Vec::new(),
            is_match: false,
        });
    }

    for ((location_id, date), reference) in grouped {
        let Some(found) = computed.get(&(location_id.clone(), date)) else {
            let reference_value = reference.revenue.or(reference.hours).unwrap_or(0.0);
            outcome.discrepancies.push(Discrepancy {
                kind: DiscrepancyType::MissingData,
                severity: Severity::Critical,
                location_id: Some(location_id.clone()),
                location_name: reference.location_name.clone(),
                date: Some(date),
                worker_name: None,
                team_name: None,
                reference_value: round_metric(reference_value),
                computed_value: 0.0,
                difference: round_metric(-reference_value),
                pct_difference: pct_difference(reference_value, 0.0),
                message: format!(
                    "no computed data for {} on {date}",
                    reference.location_name
                ),
            });
            outcome.verifications.push(ReconciliationVerification {
                location_id: Some(location_id),
                location_name: reference.location_name,
                date,
                source_files: reference.files.into_iter().collect(),
                reference_rows: reference.rows,
                computed_found: false,
                comparisons: Vec::new(),
                is_match: false,
            });
            continue;
        };

        let mut comparisons = Vec::new();
        if let Some(revenue) = reference.revenue {
            comparisons.push(compare_metric(Metric::Revenue, revenue, found.revenue, rules));
        }
        if let Some(hours) = reference.hours {
            comparisons.push(compare_metric(Metric::Hours, hours, found.hours, rules));
        }
        if let (Some(revenue), Some(hours)) = (reference.revenue, reference.hours) {
            if hours > 0.0 {
                comparisons.push(compare_metric(
                    Metric::RevenuePerHour,
                    revenue_per_hour(revenue, hours),
                    revenue_per_hour(found.revenue, found.hours),
                    rules,
                ));
            }
        }
        if let (Some(revenue), Some(cost)) = (reference.revenue, reference.wage_cost) {
            comparisons.push(compare_metric(
                Metric::LaborCostPercentage,
                labor_cost_percentage(cost, revenue),
                labor_cost_percentage(found.wage_cost, found.revenue),
                rules,
            ));
        }

        for comparison in comparisons.iter().filter(|comparison| !comparison.is_match) {
            let kind = comparison.metric.mismatch_type();
            outcome.discrepancies.push(Discrepancy {
                kind,
                severity: rules.severity_for(comparison.pct_difference),
                location_id: Some(location_id.clone()),
                location_name: reference.location_name.clone(),
                date: Some(date),
                worker_name: None,
                team_name: None,
                reference_value: comparison.reference_value,
                computed_value: comparison.computed_value,
                difference: comparison.difference,
                pct_difference: comparison.pct_difference,
                message: format!(
                    "{} for {} on {date}: reference {:.2}, computed {:.2} ({:.2}%)",
                    kind.as_str().replace('_', " "),
                    reference.location_name,
                    comparison.reference_value,
                    comparison.computed_value,
                    comparison.pct_difference
                ),
            });
        }

        let is_match = comparisons.iter().all(|comparison| comparison.is_match);
        outcome.verifications.push(ReconciliationVerification {
            location_id: Some(location_id),
            location_name: reference.location_name,
            date,
            source_files: reference.files.into_iter().collect(),
            reference_rows: reference.rows,
            computed_found: true,
            comparisons,
            is_match,
        });
    }

    debug!(
        target: "app::reconcile",
        verified = outcome.verifications.len(),
        discrepancies = outcome.discrepancies.len(),
        skipped = outcome.skipped.len(),
        "daily reconciliation finished"
    );
    outcome
}

type WorkerKey = (String, NaiveDate, String, String);

#[derive(Debug)]
struct ReferenceWorker {
    location_name: String,
    worker_name: String,
    team_name: String,
    hours: f64,
}

#[derive(Debug)]
struct CandidateWorker {
    worker_name: String,
    hours: f64,
    wage_missing: bool,
}

fn worker_key(location_id: &str, date: NaiveDate, worker: &str, team: &str) -> WorkerKey {
    (
        location_id.to_string(),
        date,
        normalize_person_name(worker),
        normalize_key(team),
    )
}

/// Best unused candidate at `location_id`/`date` by Jaro-Winkler
/// similarity, preferring the same team.
fn fuzzy_candidate(
    key: &WorkerKey,
    by_day: &HashMap<(String, NaiveDate), Vec<WorkerKey>>,
    used: &HashSet<WorkerKey>,
    threshold: f64,
) -> Option<WorkerKey> {
    let candidates = by_day.get(&(key.0.clone(), key.1))?;
    let best_of = |same_team: bool| {
        candidates
            .iter()
            .filter(|candidate| !used.contains(*candidate))
            .filter(|candidate| !same_team || candidate.3 == key.3)
            .map(|candidate| (strsim::jaro_winkler(&key.2, &candidate.2), candidate))
            .filter(|(score, _)| *score >= threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone())
    };
    best_of(true).or_else(|| best_of(false))
}

/// Worker comparison keyed by (location, date, worker, team). Every
/// reference worker appears in the output; duplicate reference rows keep
/// the maximum hours.
pub fn reconcile_workers(
    rows: &[ReferenceRow],
    locations: &LocationDirectory,
    computed: &[ComputedWorker],
    filter: &DateFilter,
    rules: &ReconcileRules,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome::default();
    let mut unresolved = BTreeMap::new();
    let mut reference: BTreeMap<WorkerKey, ReferenceWorker> = BTreeMap::new();

    for row in rows.iter().filter(|row| row.is_worker_row()) {
        let Resolved::Row(date, location_id, location_name) =
            resolve_row(row, locations, filter, &mut outcome.skipped, &mut unresolved)
        else {
            continue;
        };
        let worker_name = collapse_whitespace(row.worker_name.as_deref().unwrap_or_default());
        let team_name = collapse_whitespace(row.team_name.as_deref().unwrap_or_default());
        let hours = row.hours.unwrap_or(0.0);
        let key = worker_key(location_id, date, &worker_name, &team_name);

        match reference.get_mut(&key) {
            Some(existing) => {
                warn!(
                    target: "app::reconcile",
                    worker = %worker_name,
                    team = %team_name,
                    %date,
                    kept = existing.hours.max(hours),
                    "duplicate reference worker row, keeping maximum hours"
                );
                existing.hours = existing.hours.max(hours);
            }
            None => {
                reference.insert(
                    key,
                    ReferenceWorker {
                        location_name: location_name.to_string(),
                        worker_name,
                        team_name,
                        hours,
                    },
                );
            }
        }
    }
    for ((_, date, _), reference) in unresolved {
        outcome
            .discrepancies
            .push(missing_location_discrepancy(date, &reference));
        outcome.verifications.push(WorkerVerification {
            location_id: None,
            location_name: reference.location_name,
            date,
            worker_name: reference.worker_name.unwrap_or_default(),
            team_name: reference.team_name.unwrap_or_default(),
            reference_hours: round_metric(reference.hours),
            computed_hours: 0.0,
            difference: round_metric(-reference.hours),
            pct_difference: pct_difference(reference.hours, 0.0),
            is_match: false,
            found: false,
            wage_missing: false,
            matched_name: None,
        });
    }

    let mut candidates: HashMap<WorkerKey, CandidateWorker> = HashMap::new();
    for worker in computed {
        let key = worker_key(&worker.location_id, worker.date, &worker.worker_name, &worker.team_name);
        let slot = candidates.entry(key).or_insert_with(|| CandidateWorker {
            worker_name: collapse_whitespace(&worker.worker_name),
            hours: 0.0,
            wage_missing: false,
        });
        slot.hours += worker.hours;
        slot.wage_missing |= worker.wage_missing;
    }
    let mut by_day: HashMap<(String, NaiveDate), Vec<WorkerKey>> = HashMap::new();
    for key in candidates.keys() {
        by_day.entry((key.0.clone(), key.1)).or_default().push(key.clone());
    }
    for keys in by_day.values_mut() {
        keys.sort();
    }

    let mut used: HashSet<WorkerKey> = reference
        .keys()
        .filter(|key| candidates.contains_key(*key))
        .cloned()
        .collect();

    for (key, worker) in reference {
        let (matched_key, fuzzy) = if candidates.contains_key(&key) {
            (Some(key.clone()), false)
        } else {
            let found = fuzzy_candidate(&key, &by_day, &used, rules.worker_name_similarity);
            if let Some(found) = &found {
                used.insert(found.clone());
            }
            (found, true)
        };

        let (location_id, date) = (key.0.clone(), key.1);
        let Some(candidate) = matched_key.as_ref().and_then(|k| candidates.get(k)) else {
            outcome.discrepancies.push(Discrepancy {
                kind: DiscrepancyType::WorkerNotFound,
                severity: Severity::Critical,
                location_id: Some(location_id.clone()),
                location_name: worker.location_name.clone(),
                date: Some(date),
                worker_name: Some(worker.worker_name.clone()),
                team_name: Some(worker.team_name.clone()),
                reference_value: round_metric(worker.hours),
                computed_value: 0.0,
                difference: round_metric(-worker.hours),
                pct_difference: pct_difference(worker.hours, 0.0),
                message: format!(
                    "worker {} ({}) at {} on {date} not found in computed data: reference {:.2}h, computed 0.00h",
                    worker.worker_name, worker.team_name, worker.location_name, worker.hours
                ),
            });
            outcome.verifications.push(WorkerVerification {
                location_id: Some(location_id),
                location_name: worker.location_name,
                date,
                worker_name: worker.worker_name,
                team_name: worker.team_name,
                reference_hours: round_metric(worker.hours),
                computed_hours: 0.0,
                difference: round_metric(-worker.hours),
                pct_difference: pct_difference(worker.hours, 0.0),
                is_match: false,
                found: false,
                wage_missing: false,
                matched_name: None,
            });
            continue;
        };

        let comparison = compare_metric(Metric::Hours, worker.hours, candidate.hours, rules);
        let wage_note = if candidate.wage_missing {
            ", no wage on record"
        } else {
            ""
        };
        if !comparison.is_match {
            outcome.discrepancies.push(Discrepancy {
                kind: DiscrepancyType::WorkerHoursMismatch,
                severity: rules.severity_for(comparison.pct_difference),
                location_id: Some(location_id.clone()),
                location_name: worker.location_name.clone(),
                date: Some(date),
                worker_name: Some(worker.worker_name.clone()),
                team_name: Some(worker.team_name.clone()),
                reference_value: comparison.reference_value,
                computed_value: comparison.computed_value,
                difference: comparison.difference,
                pct_difference: comparison.pct_difference,
                message: format!(
                    "worker hours mismatch for {} ({}) at {} on {date}: reference {:.2}h, computed {:.2}h{wage_note}",
                    worker.worker_name,
                    worker.team_name,
                    worker.location_name,
                    comparison.reference_value,
                    comparison.computed_value
                ),
            });
        }
        outcome.verifications.push(WorkerVerification {
            location_id: Some(location_id),
            location_name: worker.location_name,
            date,
            worker_name: worker.worker_name,
            team_name: worker.team_name,
            reference_hours: comparison.reference_value,
            computed_hours: comparison.computed_value,
            difference: comparison.difference,
            pct_difference: comparison.pct_difference,
            is_match: comparison.is_match,
            found: true,
            wage_missing: candidate.wage_missing,
            matched_name: fuzzy.then(|| candidate.worker_name.clone()),
        });
    }

    debug!(
        target: "app::reconcile",
        verified = outcome.verifications.len(),
        discrepancies = outcome.discrepancies.len(),
        "worker reconciliation finished"
    );
    outcome
}

/// Summary statistics derived from the verification lists alone. Every
/// discrepancy the reconcilers emit corresponds to one failing comparison,
/// missing key or unresolved key here, so `discrepancy_count` agrees with
/// the discrepancy list.
pub fn summarize(
    verifications: &[ReconciliationVerification],
    worker_verifications: &[WorkerVerification],
) -> ReconcileSummary {
    let mut by_date: BTreeMap<NaiveDate, DateSummary> = BTreeMap::new();
    let mut summary = ReconcileSummary {
        total_verified: verifications.len(),
        worker_total: worker_verifications.len(),
        ..ReconcileSummary::default()
    };
    let mut failing_comparisons = 0;
    let mut unresolved_workers = 0;

    for verification in verifications {
        let day = by_date.entry(verification.date).or_insert_with(|| DateSummary {
            date: verification.date,
            ..DateSummary::default()
        });
        day.verified += 1;
        if verification.location_id.is_none() {
            summary.unresolved_count += 1;
            day.unresolved += 1;
        } else if verification.is_match {
            summary.match_count += 1;
            day.matched += 1;
        } else if verification.computed_found {
            summary.mismatch_count += 1;
            day.mismatched += 1;
            failing_comparisons += verification
                .comparisons
                .iter()
                .filter(|comparison| !comparison.is_match)
                .count();
        } else {
            summary.missing_count += 1;
            day.missing += 1;
        }
    }

    for verification in worker_verifications {
        let day = by_date.entry(verification.date).or_insert_with(|| DateSummary {
            date: verification.date,
            ..DateSummary::default()
        });
        day.workers_verified += 1;
        if verification.location_id.is_none() {
            summary.unresolved_count += 1;
            day.unresolved += 1;
            unresolved_workers += 1;
        } else if verification.is_match {
            summary.worker_match_count += 1;
            day.workers_matched += 1;
        } else if verification.found {
            summary.worker_mismatch_count += 1;
            day.workers_mismatched += 1;
        } else {
            summary.worker_not_found_count += 1;
            day.workers_not_found += 1;
        }
    }

    summary.discrepancy_count = failing_comparisons
        + summary.missing_count
        + summary.unresolved_count
        + summary.worker_mismatch_count
        + summary.worker_not_found_count;
    let rated = summary.total_verified + unresolved_workers;
    summary.match_rate = if rated == 0 {
        100.0
    } else {
        round_metric(summary.match_count as f64 / rated as f64 * 100.0)
    };
    summary.by_date = by_date.into_values().collect();
    summary
}
