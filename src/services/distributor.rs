//! Proportional allocation of location revenue over categories, teams and
//! workers.
//!
//! Three stages, each consuming the previous one's output:
//! 1. categorize every sub-entity of the winning labor record,
//! 2. sum hours and cost per (category, team) bucket,
//! 3. allocate the location's revenue by hour share.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::aggregate::{labor_cost_percentage, revenue_per_hour, round_metric};
use crate::models::category::{ShareCategory, ALL_LABEL, UNASSIGNED_LABEL};
use crate::models::directory::WorkerDirectory;
use crate::models::period::Granularity;
use crate::models::raw::RawLaborRecord;
pub use crate::models::share::{
    CategorizedShare, Distribution, DivisionTotals, MissingWage, WorkerShare,
};
use crate::services::categorizer::{categorize_team, CategoryRules};
use crate::services::freshness::freshest_labor;
use crate::services::location_aggregator::LocationDayBucket;
use crate::services::period_key::period_key_for_date;

/// Stage 1 output: one classified, wage-resolved sub-entity.
#[derive(Debug, Clone)]
struct CategorizedEntity {
    entity_id: String,
    name: String,
    team_name: String,
    category: ShareCategory,
    hours: f64,
    cost: f64,
    hourly_wage: f64,
    is_worker: bool,
}

/// Stage 2 output: hours and cost per (category, team).
#[derive(Debug, Clone)]
struct HourBucket {
    category: ShareCategory,
    team_name: String,
    hours: f64,
    cost: f64,
}

fn resolve_wage(cost: f64, hours: f64, directory_wage: Option<f64>) -> Option<(f64, f64)> {
    if cost > 0.0 {
        let hourly = if hours > 0.0 { cost / hours } else { 0.0 };
        return Some((cost, hourly));
    }
    directory_wage
        .filter(|wage| *wage > 0.0)
        .map(|wage| (wage * hours, wage))
}

fn categorize_entities(
    record: &RawLaborRecord,
    rules: &CategoryRules,
    workers: &WorkerDirectory,
    missing: &mut Vec<MissingWage>,
) -> Vec<CategorizedEntity> {
    if !record.by_worker.is_empty() {
        return record
            .by_worker
            .iter()
            .filter_map(|worker| {
                let known = workers.get(&worker.entity_id);
                let team_raw = worker
                    .team_name
                    .clone()
                    .or_else(|| known.and_then(|w| w.team_name.clone()))
                    .unwrap_or_default();
                let team = categorize_team(&team_raw, rules);
                let name = if worker.name.is_empty() {
                    known.map(|w| w.name.clone()).unwrap_or_else(|| worker.entity_id.clone())
                } else {
                    worker.name.clone()
                };

                match resolve_wage(worker.cost, worker.hours, workers.hourly_wage(&worker.entity_id)) {
                    Some((cost, hourly_wage)) => Some(CategorizedEntity {
                        entity_id: worker.entity_id.clone(),
                        name,
                        team_name: team.name,
                        category: team.category.into(),
                        hours: worker.hours,
                        cost,
                        hourly_wage,
                        is_worker: true,
                    }),
                    None => {
                        warn!(
                            target: "app::distribute",
                            location_id = %record.location_id,
                            date = %record.date,
                            worker_id = %worker.entity_id,
                            hours = worker.hours,
                            "no positive wage for worker, excluded from allocation"
                        );
                        missing.push(MissingWage {
                            date: record.date,
                            location_id: record.location_id.clone(),
                            worker_id: worker.entity_id.clone(),
                            worker_name: name,
                            team_name: team.name,
                            hours: worker.hours,
                        });
                        None
                    }
                }
            })
            .collect();
    }

    record
        .by_team
        .iter()
        .map(|line| {
            let team = categorize_team(&line.name, rules);
            CategorizedEntity {
                entity_id: line.entity_id.clone(),
                name: team.name.clone(),
                team_name: team.name,
                category: team.category.into(),
                hours: line.hours,
                cost: line.cost,
                hourly_wage: if line.hours > 0.0 { line.cost / line.hours } else { 0.0 },
                is_worker: false,
            }
        })
        .collect()
}

fn sum_hours(entities: &[CategorizedEntity]) -> (Vec<HourBucket>, f64) {
    let mut buckets: BTreeMap<(ShareCategory, String), HourBucket> = BTreeMap::new();
    for entity in entities {
        let bucket = buckets
            .entry((entity.category, entity.team_name.clone()))
            .or_insert_with(|| HourBucket {
                category: entity.category,
                team_name: entity.team_name.clone(),
                hours: 0.0,
                cost: 0.0,
            });
        bucket.hours += entity.hours;
        bucket.cost += entity.cost;
    }
    let total = entities.iter().map(|entity| entity.hours).sum();
    (buckets.into_values().collect(), total)
}

/// Hours the breakdown leaves unaccounted for, as an `Other` entity
/// carrying the location cost not already attributed. Gaps below one
/// hundredth of an hour are rounding noise.
fn unassigned_remainder(
    bucket: &LocationDayBucket,
    breakdown_hours: f64,
    entities: &[CategorizedEntity],
) -> Option<CategorizedEntity> {
    let gap = bucket.hours - breakdown_hours;
    if gap < 0.01 {
        return None;
    }
    let attributed_cost: f64 = entities.iter().map(|entity| entity.cost).sum();
    let cost = (bucket.wage_cost - attributed_cost).max(0.0);
    warn!(
        target: "app::distribute",
        location_id = %bucket.location_id,
        date = %bucket.date,
        location_hours = bucket.hours,
        breakdown_hours,
        unassigned_hours = gap,
        "breakdown covers only part of the location hours"
    );
    Some(CategorizedEntity {
        entity_id: UNASSIGNED_LABEL.to_string(),
        name: UNASSIGNED_LABEL.to_string(),
        team_name: UNASSIGNED_LABEL.to_string(),
        category: ShareCategory::Other,
        hours: gap,
        cost,
        hourly_wage: cost / gap,
        is_worker: false,
    })
}

fn allocate(hours: f64, total_hours: f64, revenue: f64) -> f64 {
    if total_hours > 0.0 {
        hours / total_hours * revenue
    } else {
        0.0
    }
}

fn all_share(bucket: &LocationDayBucket, hours: f64) -> CategorizedShare {
    CategorizedShare {
        granularity: Granularity::Day,
        period: period_key_for_date(bucket.date, Granularity::Day),
        location_id: bucket.location_id.clone(),
        location_name: bucket.location_name.clone(),
        category: ShareCategory::All,
        team_name: ALL_LABEL.to_string(),
        hours: round_metric(hours),
        wage_cost: round_metric(bucket.wage_cost),
        allocated_revenue: round_metric(bucket.revenue),
    }
}

/// Day-level shares for every bucket.
///
/// `labor` may hold several snapshots per day; only the freshest one is
/// distributed. Buckets without a labor record (sales-only days) get an
/// `All` share so allocated revenue always adds up to location revenue.
pub fn distribute(
    buckets: &[LocationDayBucket],
    labor: &[RawLaborRecord],
    rules: &CategoryRules,
    workers: &WorkerDirectory,
) -> Distribution {
    let records: HashMap<(String, NaiveDate), RawLaborRecord> = freshest_labor(labor.to_vec())
        .into_iter()
        .map(|record| ((record.location_id.clone(), record.date), record))
        .collect();

    let mut distribution = Distribution::default();

    for bucket in buckets {
        let Some(record) = records.get(&(bucket.location_id.clone(), bucket.date)) else {
            distribution.shares.push(all_share(bucket, bucket.hours));
            continue;
        };

        let breakdown_hours: f64 = if record.by_worker.is_empty() {
            record.by_team.iter().map(|team| team.hours).sum()
        } else {
            record.by_worker.iter().map(|worker| worker.hours).sum()
        };
        if breakdown_hours <= 0.0 {
            distribution.shares.push(all_share(bucket, bucket.hours));
            continue;
        }

        let mut missing = Vec::new();
        let mut entities = categorize_entities(record, rules, workers, &mut missing);
        let excluded_hours: f64 = missing.iter().map(|entry| entry.hours).sum();
        distribution.missing_wages.extend(missing);

        if entities.iter().map(|entity| entity.hours).sum::<f64>() <= 0.0 {
            // Every worker lacked a wage; keep the revenue on the location.
            distribution
                .shares
                .push(all_share(bucket, (bucket.hours - excluded_hours).max(0.0)));
            continue;
        }
        if let Some(remainder) = unassigned_remainder(bucket, breakdown_hours, &entities) {
            entities.push(remainder);
        }
        let (hour_buckets, total_hours) = sum_hours(&entities);

        let period = period_key_for_date(bucket.date, Granularity::Day);
        for hour_bucket in hour_buckets {
            distribution.shares.push(CategorizedShare {
                granularity: Granularity::Day,
                period: period.clone(),
                location_id: bucket.location_id.clone(),
                location_name: bucket.location_name.clone(),
                category: hour_bucket.category,
                team_name: hour_bucket.team_name,
                hours: round_metric(hour_bucket.hours),
                wage_cost: round_metric(hour_bucket.cost),
                allocated_revenue: round_metric(allocate(
                    hour_bucket.hours,
                    total_hours,
                    bucket.revenue,
                )),
            });
        }

        for entity in entities.iter().filter(|entity| entity.is_worker) {
            distribution.worker_shares.push(WorkerShare {
                date: bucket.date,
                location_id: bucket.location_id.clone(),
                location_name: bucket.location_name.clone(),
                worker_id: entity.entity_id.clone(),
                worker_name: entity.name.clone(),
                team_name: entity.team_name.clone(),
                category: entity.category,
                hours: round_metric(entity.hours),
                wage_cost: round_metric(entity.cost),
                hourly_wage: round_metric(entity.hourly_wage),
                allocated_revenue: round_metric(allocate(entity.hours, total_hours, bucket.revenue)),
            });
        }
    }

    debug!(
        target: "app::distribute",
        shares = distribution.shares.len(),
        worker_shares = distribution.worker_shares.len(),
        missing_wages = distribution.missing_wages.len(),
        "distribution computed"
    );
    distribution
}

/// Rolls day-level shares up to a coarser granularity. Shares that are
/// not day-level are passed over.
pub fn rollup_shares(shares: &[CategorizedShare], granularity: Granularity) -> Vec<CategorizedShare> {
    let mut rolled: BTreeMap<(String, String, ShareCategory, String), CategorizedShare> =
        BTreeMap::new();

    for share in shares {
        if share.granularity != Granularity::Day {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(&share.period, "%Y-%m-%d") else {
            debug!(target: "app::distribute", period = %share.period, "unreadable share period");
            continue;
        };
        let period = period_key_for_date(date, granularity);
        let entry = rolled
            .entry((
                period.clone(),
                share.location_id.clone(),
                share.category,
                share.team_name.clone(),
            ))
            .or_insert_with(|| CategorizedShare {
                granularity,
                period,
                location_id: share.location_id.clone(),
                location_name: share.location_name.clone(),
                category: share.category,
                team_name: share.team_name.clone(),
                hours: 0.0,
                wage_cost: 0.0,
                allocated_revenue: 0.0,
            });
        entry.hours += share.hours;
        entry.wage_cost += share.wage_cost;
        entry.allocated_revenue += share.allocated_revenue;
    }

    rolled
        .into_values()
        .map(|mut share| {
            share.hours = round_metric(share.hours);
            share.wage_cost = round_metric(share.wage_cost);
            share.allocated_revenue = round_metric(share.allocated_revenue);
            share
        })
        .collect()
}

/// Groups shares by revenue division (Food, Beverage, Management, Other,
/// and All for undistributed locations).
pub fn division_totals(shares: &[CategorizedShare]) -> Vec<DivisionTotals> {
    let mut sums: BTreeMap<&'static str, (f64, f64, f64)> = BTreeMap::new();
    for share in shares {
        let slot = sums.entry(share.category.division_label()).or_default();
        slot.0 += share.hours;
        slot.1 += share.wage_cost;
        slot.2 += share.allocated_revenue;
    }

    sums.into_iter()
        .map(|(division, (hours, wage_cost, revenue))| DivisionTotals {
            division: division.to_string(),
            hours: round_metric(hours),
            wage_cost: round_metric(wage_cost),
            allocated_revenue: round_metric(revenue),
            revenue_per_hour: round_metric(revenue_per_hour(revenue, hours)),
            labor_cost_percentage: round_metric(labor_cost_percentage(wage_cost, revenue)),
        })
        .collect()
}
