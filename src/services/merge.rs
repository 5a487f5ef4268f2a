//! Incremental merge of a freshly computed fragment into a persisted
//! aggregate: replace-on-recompute, sum-on-read.
//!
//! Day-level (period, location) entries are the facts a run recomputes;
//! a fragment day replaces the persisted one. Week, month and year
//! entries are shifted by the difference between the new day and the day
//! it replaced, so coarse buckets that extend beyond the run's window keep
//! the contribution of days the run never saw. Period totals are always
//! re-derived from the merged location breakdown.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::models::aggregate::{HierarchicalAggregate, LocationTotals, MetricTotals, PeriodEntry};
use crate::models::period::Granularity;
use crate::services::period_key::period_key_for_date;

type Breakdown = BTreeMap<String, BTreeMap<String, LocationTotals>>;

const COARSE: [Granularity; 3] = [Granularity::Year, Granularity::Month, Granularity::Week];

fn index(entries: &[PeriodEntry]) -> Breakdown {
    let mut breakdown = Breakdown::new();
    for entry in entries {
        let locations = breakdown.entry(entry.period.clone()).or_default();
        for location in &entry.by_location {
            // Duplicate keys in a stored document collapse into one entry.
            let slot = locations
                .entry(location.location_id.clone())
                .or_insert_with(|| LocationTotals {
                    location_id: location.location_id.clone(),
                    location_name: location.location_name.clone(),
                    totals: MetricTotals::default(),
                });
            slot.totals = slot.totals.add(&location.totals);
        }
    }
    breakdown
}

fn into_entries(breakdown: Breakdown) -> Vec<PeriodEntry> {
    breakdown
        .into_iter()
        .map(|(period, locations)| {
            let mut entry = PeriodEntry::new(period);
            entry.by_location = locations
                .into_values()
                .map(|mut location| {
                    location.totals = location.totals.rounded();
                    location
                })
                .collect();
            entry.recompute_totals();
            entry
        })
        .collect()
}

/// Merges `fragment` into `persisted`. Pure and infallible; without a
/// persisted document the fragment is merged into an empty aggregate.
pub fn merge_aggregates(
    persisted: Option<&HierarchicalAggregate>,
    fragment: &HierarchicalAggregate,
) -> HierarchicalAggregate {
    let base = match persisted {
        Some(existing) => {
            if existing.subject != fragment.subject {
                warn!(
                    target: "app::merge",
                    persisted = %existing.subject.id,
                    fragment = %fragment.subject.id,
                    "merging fragments of different subjects"
                );
            }
            existing.clone()
        }
        None => HierarchicalAggregate::empty(fragment.subject.clone(), fragment.subject_name.clone()),
    };

    let mut days = index(&base.by_day);
    let mut coarse: [Breakdown; 3] = [
        index(&base.by_year),
        index(&base.by_month),
        index(&base.by_week),
    ];
    let mut covered: HashSet<(Granularity, String, String)> = HashSet::new();

    for entry in &fragment.by_day {
        let Some(date) = entry.date() else {
            warn!(target: "app::merge", period = %entry.period, "fragment day with unreadable key skipped");
            continue;
        };
        for (location_id, incoming) in index(std::slice::from_ref(entry))
            .into_values()
            .flat_map(BTreeMap::into_iter)
        {
            let previous = days
                .get(&entry.period)
                .and_then(|locations| locations.get(&location_id))
                .map(|location| location.totals)
                .unwrap_or_default();
            let delta = incoming.totals.sub(&previous);

            for (slot_index, granularity) in COARSE.iter().enumerate() {
                let key = period_key_for_date(date, *granularity);
                covered.insert((*granularity, key.clone(), location_id.clone()));
                let slot = coarse[slot_index]
                    .entry(key)
                    .or_default()
                    .entry(location_id.clone())
                    .or_insert_with(|| LocationTotals {
                        location_id: location_id.clone(),
                        location_name: incoming.location_name.clone(),
                        totals: MetricTotals::default(),
                    });
                slot.totals = slot.totals.add(&delta).rounded();
                if !incoming.location_name.is_empty() {
                    slot.location_name = incoming.location_name.clone();
                }
            }

            days.entry(entry.period.clone())
                .or_default()
                .insert(location_id, incoming);
        }
    }

    for (slot_index, granularity) in COARSE.iter().enumerate() {
        for entry in fragment.entries(*granularity) {
            for location in &entry.by_location {
                let key = (*granularity, entry.period.clone(), location.location_id.clone());
                if covered.contains(&key) {
                    continue;
                }
                debug!(
                    target: "app::merge",
                    granularity = granularity.as_str(),
                    period = %entry.period,
                    location_id = %location.location_id,
                    "coarse fragment entry without day backing replaces persisted entry"
                );
                coarse[slot_index]
                    .entry(entry.period.clone())
                    .or_default()
                    .insert(location.location_id.clone(), location.clone());
            }
        }
    }

    let [years, months, weeks] = coarse;
    HierarchicalAggregate {
        subject: fragment.subject.clone(),
        subject_name: if fragment.subject_name.is_empty() {
            base.subject_name
        } else {
            fragment.subject_name.clone()
        },
        by_year: into_entries(years),
        by_month: into_entries(months),
        by_week: into_entries(weeks),
        by_day: into_entries(days),
        last_run_id: fragment.last_run_id.clone().or(base.last_run_id),
        updated_at: fragment.updated_at.clone().or(base.updated_at),
    }
}
