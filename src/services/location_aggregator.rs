//! Folds raw labor and sales records into per-location day buckets and
//! hierarchical fragments ready for merging.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::aggregate::{
    labor_cost_percentage, revenue_per_hour, HierarchicalAggregate, LocationTotals, MetricTotals,
    PeriodEntry, SubjectKey,
};
use crate::models::directory::LocationDirectory;
use crate::models::period::Granularity;
use crate::models::raw::{RawLaborRecord, RawSalesRecord};
use crate::services::freshness::{freshest_labor, freshest_sales};
use crate::services::period_key::period_key_for_date;

/// One location on one business day, after freshness precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDayBucket {
    pub location_id: String,
    pub location_name: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub wage_cost: f64,
    pub revenue: f64,
    pub transaction_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labor_record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_record_id: Option<String>,
}

impl LocationDayBucket {
    fn empty(location_id: &str, location_name: String, date: NaiveDate) -> Self {
        Self {
            location_id: location_id.to_string(),
            location_name,
            date,
            hours: 0.0,
            wage_cost: 0.0,
            revenue: 0.0,
            transaction_count: 0,
            labor_record_id: None,
            sales_record_id: None,
        }
    }

    pub fn revenue_per_hour(&self) -> f64 {
        revenue_per_hour(self.revenue, self.hours)
    }

    pub fn labor_cost_percentage(&self) -> f64 {
        labor_cost_percentage(self.wage_cost, self.revenue)
    }

    pub fn totals(&self) -> MetricTotals {
        MetricTotals::new(self.hours, self.wage_cost, self.revenue, self.transaction_count)
    }
}

fn display_name(directory: &LocationDirectory, location_id: &str, recorded: Option<&str>) -> String {
    directory
        .name_of(location_id)
        .map(str::to_string)
        .or_else(|| recorded.map(str::to_string))
        .unwrap_or_else(|| location_id.to_string())
}

/// Builds one bucket per (location, day).
///
/// Hours and wage cost are taken from the freshest labor record, never
/// summed across snapshots. Revenue comes from that labor record when it
/// carries any; otherwise the freshest sales record fills it.
pub fn aggregate_locations(
    labor: &[RawLaborRecord],
    sales: &[RawSalesRecord],
    directory: &LocationDirectory,
) -> Vec<LocationDayBucket> {
    let mut buckets: BTreeMap<(String, NaiveDate), LocationDayBucket> = BTreeMap::new();

    for record in freshest_labor(labor.to_vec()) {
        let name = display_name(directory, &record.location_id, record.location_name.as_deref());
        let bucket = buckets
            .entry((record.location_id.clone(), record.date))
            .or_insert_with(|| LocationDayBucket::empty(&record.location_id, name, record.date));

        bucket.hours = record.hours;
        bucket.wage_cost = record.wage_cost;
        if bucket.wage_cost == 0.0 {
            let team_cost = record.team_cost_total();
            if team_cost != 0.0 {
                debug!(
                    target: "app::aggregate",
                    record_id = %record.id,
                    team_cost,
                    "wage cost taken from team breakdown"
                );
                bucket.wage_cost = team_cost;
            }
        }
        if record.revenue != 0.0 {
            bucket.revenue = record.revenue;
        }
        bucket.labor_record_id = Some(record.id.clone());

        if bucket.hours > 0.0 && bucket.wage_cost == 0.0 {
            warn!(
                target: "app::aggregate",
                location_id = %record.location_id,
                date = %record.date,
                hours = bucket.hours,
                "labor record has hours but no wage cost"
            );
        }
    }

    for record in freshest_sales(sales.to_vec()) {
        let name = display_name(directory, &record.location_id, record.location_name.as_deref());
        let bucket = buckets
            .entry((record.location_id.clone(), record.date))
            .or_insert_with(|| LocationDayBucket::empty(&record.location_id, name, record.date));

        if bucket.revenue == 0.0 {
            bucket.revenue = record.revenue;
        }
        bucket.transaction_count = record.transaction_count;
        bucket.sales_record_id = Some(record.id.clone());
    }

    buckets.into_values().collect()
}

/// Folds day-level location totals into every persisted granularity.
/// Entries come out sorted by period key and with totals equal to the sum
/// of their location breakdown.
pub fn fold_days(
    subject: SubjectKey,
    subject_name: impl Into<String>,
    days: impl IntoIterator<Item = (NaiveDate, LocationTotals)>,
) -> HierarchicalAggregate {
    let mut aggregate = HierarchicalAggregate::empty(subject, subject_name);
    let days: Vec<(NaiveDate, LocationTotals)> = days.into_iter().collect();

    for granularity in Granularity::persisted() {
        let mut periods: BTreeMap<String, BTreeMap<String, LocationTotals>> = BTreeMap::new();
        for (date, location) in &days {
            let key = period_key_for_date(*date, granularity);
            let slot = periods
                .entry(key)
                .or_default()
                .entry(location.location_id.clone())
                .or_insert_with(|| LocationTotals {
                    location_id: location.location_id.clone(),
                    location_name: location.location_name.clone(),
                    totals: MetricTotals::default(),
                });
            slot.totals = slot.totals.add(&location.totals);
        }

        let entries = aggregate.entries_mut(granularity);
        for (period, locations) in periods {
            let mut entry = PeriodEntry::new(period);
            entry.by_location = locations
                .into_values()
                .map(|mut location| {
                    location.totals = location.totals.rounded();
                    location
                })
                .collect();
            entry.recompute_totals();
            entries.push(entry);
        }
    }

    aggregate
}

/// One fragment per location present in `buckets`.
pub fn build_location_fragments(buckets: &[LocationDayBucket]) -> Vec<HierarchicalAggregate> {
    let mut per_location: BTreeMap<&str, Vec<&LocationDayBucket>> = BTreeMap::new();
    for bucket in buckets {
        per_location
            .entry(bucket.location_id.as_str())
            .or_default()
            .push(bucket);
    }

    per_location
        .into_iter()
        .map(|(location_id, days)| {
            let name = days
                .first()
                .map(|bucket| bucket.location_name.clone())
                .unwrap_or_default();
            fold_days(
                SubjectKey::location(location_id),
                name,
                days.into_iter().map(|bucket| {
                    (
                        bucket.date,
                        LocationTotals {
                            location_id: bucket.location_id.clone(),
                            location_name: bucket.location_name.clone(),
                            totals: bucket.totals(),
                        },
                    )
                }),
            )
        })
        .collect()
}

/// One fragment per product sold in the freshest sales records. Quantity
/// is units sold and count is the number of product lines.
pub fn build_product_fragments(
    sales: &[RawSalesRecord],
    directory: &LocationDirectory,
) -> Vec<HierarchicalAggregate> {
    let mut names: HashMap<String, String> = HashMap::new();
    let mut per_product: BTreeMap<String, Vec<(NaiveDate, LocationTotals)>> = BTreeMap::new();

    for record in freshest_sales(sales.to_vec()) {
        let location_name =
            display_name(directory, &record.location_id, record.location_name.as_deref());
        for line in &record.by_product {
            names.insert(line.product_id.clone(), line.name.clone());
            per_product
                .entry(line.product_id.clone())
                .or_default()
                .push((
                    record.date,
                    LocationTotals {
                        location_id: record.location_id.clone(),
                        location_name: location_name.clone(),
                        totals: MetricTotals::new(line.quantity, 0.0, line.revenue, 1),
                    },
                ));
        }
    }

    per_product
        .into_iter()
        .map(|(product_id, days)| {
            let name = names.remove(&product_id).unwrap_or_else(|| product_id.clone());
            fold_days(SubjectKey::product(product_id), name, days)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::directory::Location;
    use crate::models::raw::{ProductLine, SubEntityHours};
    use chrono::{TimeZone, Utc};

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn directory() -> LocationDirectory {
        LocationDirectory::new(vec![Location {
            id: "bar-bea".into(),
            name: "Bar Bea".into(),
        }])
    }

    fn labor(id: &str, day: u32, hour: u32, hours: f64, cost: f64) -> RawLaborRecord {
        RawLaborRecord {
            id: id.into(),
            location_id: "bar-bea".into(),
            location_name: None,
            date: june(day),
            created_at: Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
            hours,
            wage_cost: cost,
            revenue: 0.0,
            by_team: Vec::new(),
            by_worker: Vec::new(),
        }
    }

    fn sales(id: &str, day: u32, hour: u32, revenue: f64) -> RawSalesRecord {
        RawSalesRecord {
            id: id.into(),
            location_id: "bar-bea".into(),
            location_name: None,
            date: june(day),
            created_at: Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
            revenue,
            transaction_count: 10,
            by_product: Vec::new(),
        }
    }

    #[test]
    fn freshest_labor_snapshot_is_set_not_summed() {
        let buckets = aggregate_locations(
            &[labor("early", 1, 9, 8.0, 80.0), labor("late", 1, 14, 9.0, 90.0)],
            &[],
            &directory(),
        );
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].location_name, "Bar Bea");
        assert_eq!(buckets[0].hours, 9.0);
        assert_eq!(buckets[0].wage_cost, 90.0);
        assert_eq!(buckets[0].labor_record_id.as_deref(), Some("late"));
    }

    #[test]
    fn zero_wage_cost_falls_back_to_team_costs() {
        let mut record = labor("r1", 1, 9, 6.0, 0.0);
        record.by_team = vec![
            SubEntityHours {
                entity_id: "t1".into(),
                name: "Keuken".into(),
                hours: 4.0,
                cost: 60.0,
                team_name: None,
            },
            SubEntityHours {
                entity_id: "t2".into(),
                name: "Bar".into(),
                hours: 2.0,
                cost: 25.0,
                team_name: None,
            },
        ];
        let buckets = aggregate_locations(&[record], &[], &directory());
        assert_eq!(buckets[0].wage_cost, 85.0);
    }

    #[test]
    fn labor_revenue_takes_precedence_over_sales() {
        let mut with_revenue = labor("r1", 1, 9, 8.0, 80.0);
        with_revenue.revenue = 700.0;
        let buckets = aggregate_locations(
            &[with_revenue, labor("r2", 2, 9, 8.0, 80.0)],
            &[sales("s1", 1, 22, 650.0), sales("s2", 2, 22, 400.0)],
            &directory(),
        );

        assert_eq!(buckets[0].revenue, 700.0);
        assert_eq!(buckets[1].revenue, 400.0);
        assert_eq!(buckets[1].transaction_count, 10);
        assert_eq!(buckets[1].revenue_per_hour(), 50.0);
        assert_eq!(buckets[1].labor_cost_percentage(), 20.0);
    }

    #[test]
    fn sales_only_days_are_kept() {
        let buckets = aggregate_locations(&[], &[sales("s1", 3, 20, 120.0)], &directory());
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].hours, 0.0);
        assert_eq!(buckets[0].revenue, 120.0);
        assert_eq!(buckets[0].revenue_per_hour(), 0.0);
    }

    #[test]
    fn location_fragment_rolls_days_into_coarser_periods() {
        let buckets = aggregate_locations(
            &[labor("a", 1, 9, 8.0, 80.0), labor("b", 3, 9, 4.0, 40.0)],
            &[sales("s1", 1, 22, 500.0)],
            &directory(),
        );
        let fragments = build_location_fragments(&buckets);
        assert_eq!(fragments.len(), 1);

        let fragment = &fragments[0];
        assert_eq!(fragment.subject, SubjectKey::location("bar-bea"));
        assert_eq!(fragment.by_day.len(), 2);
        assert_eq!(fragment.by_month.len(), 1);
        // 2024-06-01 is a Saturday, 2024-06-03 a Monday.
        assert_eq!(fragment.by_week.len(), 2);

        let month = fragment.find(Granularity::Month, "2024-06").unwrap();
        assert_eq!(month.totals.quantity, 12.0);
        assert_eq!(month.totals.cost, 120.0);
        assert_eq!(month.totals.revenue, 500.0);
        assert!(fragment.invariant_violations().is_empty());
    }

    #[test]
    fn product_fragments_break_down_by_location() {
        let mut record = sales("s1", 1, 22, 50.0);
        record.by_product = vec![ProductLine {
            product_id: "esp".into(),
            name: "Espresso".into(),
            quantity: 10.0,
            revenue: 30.0,
        }];
        let fragments = build_product_fragments(&[record], &directory());
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].subject_name, "Espresso");

        let day = fragments[0].find(Granularity::Day, "2024-06-01").unwrap();
        assert_eq!(day.totals.quantity, 10.0);
        assert_eq!(day.by_location[0].location_name, "Bar Bea");
    }
}
