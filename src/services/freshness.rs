//! Freshness precedence shared by every raw record type.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::raw::{RawLaborRecord, RawSalesRecord};

/// Keeps one item per key: the one with the latest creation timestamp.
///
/// Ties are broken by input order, the later item wins. The result is
/// ordered by key.
pub fn pick_freshest<T, K, KF, CF>(items: impl IntoIterator<Item = T>, key_fn: KF, created_fn: CF) -> Vec<T>
where
    K: Eq + Hash + Ord + Clone,
    KF: Fn(&T) -> K,
    CF: Fn(&T) -> DateTime<Utc>,
{
    let mut winners: HashMap<K, T> = HashMap::new();
    for item in items {
        let key = key_fn(&item);
        match winners.get(&key) {
            Some(current) if created_fn(current) > created_fn(&item) => {}
            _ => {
                winners.insert(key, item);
            }
        }
    }

    let mut picked: Vec<(K, T)> = winners.into_iter().collect();
    picked.sort_by(|a, b| a.0.cmp(&b.0));
    picked.into_iter().map(|(_, item)| item).collect()
}

pub fn freshest_labor(records: Vec<RawLaborRecord>) -> Vec<RawLaborRecord> {
    pick_freshest(records, labor_key, |record| record.created_at)
}

pub fn freshest_sales(records: Vec<RawSalesRecord>) -> Vec<RawSalesRecord> {
    pick_freshest(records, sales_key, |record| record.created_at)
}

fn labor_key(record: &RawLaborRecord) -> (String, NaiveDate) {
    (record.location_id.clone(), record.date)
}

fn sales_key(record: &RawSalesRecord) -> (String, NaiveDate) {
    (record.location_id.clone(), record.date)
}
