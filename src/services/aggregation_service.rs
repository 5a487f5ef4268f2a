use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use rusqlite::TransactionBehavior;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::repositories::aggregate_repository::AggregateRepository;
use crate::db::repositories::directory_repository::DirectoryRepository;
use crate::db::repositories::raw_event_repository::{RawEventQuery, RawEventRepository};
use crate::db::repositories::share_repository::ShareRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::aggregate::HierarchicalAggregate;
use crate::models::directory::{LocationDirectory, WorkerDirectory};
use crate::models::period::DateRange;
use crate::models::raw::{RawEventKind, RawLaborRecord, RawSalesRecord};
use crate::models::settings::EngineSettings;
use crate::models::share::Distribution;
use crate::services::categorizer::CategoryRules;
use crate::services::distributor::distribute;
use crate::services::field_rules::{parse_labor_payload, parse_sales_payload};
use crate::services::location_aggregator::{
    aggregate_locations, build_location_fragments, build_product_fragments,
};
use crate::services::merge::merge_aggregates;
use crate::services::settings_service::{parse_timezone, validate};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOutcome {
    /// Subjects whose merged document was written.
    pub updated: usize,
    pub errors: Vec<String>,
    pub run_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Default)]
struct ProgressCounters {
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressCounters {
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
    }

    fn advance(&self, by: usize) -> usize {
        self.processed.fetch_add(by, Ordering::SeqCst) + by
    }

    fn snapshot(&self) -> ProgressSnapshot {
        let processed = self.processed.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        let percentage = if total == 0 {
            0.0
        } else {
            ((processed as f64 / total as f64) * 1000.0).round() / 10.0
        };
        ProgressSnapshot {
            processed,
            total,
            percentage,
        }
    }
}

/// Everything one run reads from the store before computing.
#[derive(Debug, Default)]
struct RunInputs {
    labor: Vec<RawLaborRecord>,
    sales: Vec<RawSalesRecord>,
    errors: Vec<String>,
    locations: LocationDirectory,
    workers: WorkerDirectory,
}

pub struct AggregationService {
    db: DbPool,
    settings: EngineSettings,
    rules: CategoryRules,
    progress: Arc<ProgressCounters>,
}

impl AggregationService {
    pub fn new(db: DbPool, settings: EngineSettings) -> AppResult<Self> {
        validate(&settings)?;
        let rules = CategoryRules::from_settings(&settings.category_rules);
        Ok(Self {
            db,
            settings,
            rules,
            progress: Arc::new(ProgressCounters::default()),
        })
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Recomputes `range` for `locations` (all when `None`) and merges the
    /// result into the persisted aggregates.
    ///
    /// Record-level and subject-level problems end up in `errors`; only an
    /// unreachable store fails the call.
    pub async fn aggregate(
        &self,
        range: DateRange,
        locations: Option<Vec<String>>,
    ) -> AppResult<AggregateOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let tz = parse_timezone(&self.settings.timezone)?;
        info!(
            target: "app::aggregate",
            %run_id,
            from = %range.from,
            to = %range.to,
            locations = ?locations,
            "aggregation run started"
        );

        let health = {
            let db = self.db.clone();
            tokio::task::spawn_blocking(move || db.health_check())
                .await
                .map_err(|err| AppError::other(format!("store health task failed: {err}")))??
        };
        debug!(
            target: "app::aggregate",
            %run_id,
            raw_events = health.raw_events,
            aggregates = health.aggregates,
            "store reachable"
        );

        let inputs = {
            let db = self.db.clone();
            let progress = Arc::clone(&self.progress);
            let batch_size = self.settings.batch_size;
            let locations = locations.clone();
            tokio::task::spawn_blocking(move || {
                load_inputs(&db, range, locations.as_deref(), tz, batch_size, &progress)
            })
            .await
            .map_err(|err| AppError::other(format!("raw event load task failed: {err}")))??
        };
        let RunInputs {
            labor,
            sales,
            mut errors,
            locations: location_directory,
            workers,
        } = inputs;

        let buckets = aggregate_locations(&labor, &sales, &location_directory);
        let distribution = distribute(&buckets, &labor, &self.rules, &workers);
        debug!(
            target: "app::aggregate",
            %run_id,
            buckets = buckets.len(),
            shares = distribution.shares.len(),
            worker_shares = distribution.worker_shares.len(),
            missing_wages = distribution.missing_wages.len(),
            "distribution computed"
        );

        let updated_at = Utc::now().to_rfc3339();
        let mut fragments = build_location_fragments(&buckets);
        fragments.extend(build_product_fragments(&sales, &location_directory));
        for fragment in &mut fragments {
            fragment.last_run_id = Some(run_id.clone());
            fragment.updated_at = Some(updated_at.clone());
        }

        let updated = self.merge_subjects(fragments, &mut errors).await?;

        let mut covered: BTreeSet<String> = match &locations {
            Some(ids) => ids.iter().cloned().collect(),
            None => location_directory.ids().into_iter().collect(),
        };
        covered.extend(buckets.iter().map(|bucket| bucket.location_id.clone()));
        if let Err(err) = self
            .replace_shares(range, covered, distribution, run_id.clone())
            .await
        {
            if err.is_fatal() {
                return Err(err);
            }
            errors.push(format!("shares: {err}"));
        }

        info!(
            target: "app::aggregate",
            %run_id,
            updated,
            errors = errors.len(),
            "aggregation run finished"
        );
        Ok(AggregateOutcome {
            updated,
            errors,
            run_id,
        })
    }

    /// Merges every fragment into its persisted document, at most
    /// `max_concurrent_subjects` at a time. Each subject commits on its own.
    async fn merge_subjects(
        &self,
        fragments: Vec<HierarchicalAggregate>,
        errors: &mut Vec<String>,
    ) -> AppResult<usize> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_subjects));
        let mut tasks = Vec::with_capacity(fragments.len());

        for fragment in fragments {
            let semaphore = Arc::clone(&semaphore);
            let db = self.db.clone();
            let label = format!("{}/{}", fragment.subject.kind.as_str(), fragment.subject.id);

            let task = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| AppError::other(format!("subject scheduler closed: {err}")))?;
                tokio::task::spawn_blocking(move || merge_and_put(&db, &fragment))
                    .await
                    .map_err(|err| AppError::other(format!("merge task failed: {err}")))?
            });
            tasks.push((label, task));
        }

        let mut updated = 0;
        let mut fatal = None;
        for (label, task) in tasks {
            match task.await {
                Ok(Ok(())) => updated += 1,
                Ok(Err(err)) if err.is_fatal() => {
                    error!(target: "app::aggregate", subject = %label, error = %err, "store unavailable");
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
                Ok(Err(err)) => {
                    warn!(target: "app::aggregate", subject = %label, error = %err, "subject not updated");
                    errors.push(format!("{label}: {err}"));
                }
                Err(err) => {
                    error!(target: "app::aggregate", subject = %label, error = %err, "failed to join merge task");
                    errors.push(format!("{label}: {err}"));
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(updated),
        }
    }

    /// Replaces day shares of `covered` locations inside `range` in one
    /// transaction.
    async fn replace_shares(
        &self,
        range: DateRange,
        covered: BTreeSet<String>,
        distribution: Distribution,
        run_id: String,
    ) -> AppResult<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let tx_conn = tx.deref();

            for location_id in &covered {
                ShareRepository::clear_location(tx_conn, &range, location_id)?;
            }
            for share in &distribution.shares {
                ShareRepository::insert_share(tx_conn, share, &run_id)?;
            }
            for share in &distribution.worker_shares {
                ShareRepository::insert_worker_share(tx_conn, share, &run_id)?;
            }
            for missing in &distribution.missing_wages {
                ShareRepository::insert_missing_wage(tx_conn, missing, &run_id)?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|err| AppError::other(format!("share write task failed: {err}")))?
    }
}

/// Reads the persisted document and writes the merged one inside a single
/// transaction, so a subject is either fully updated or left as it was.
fn merge_and_put(db: &DbPool, fragment: &HierarchicalAggregate) -> AppResult<()> {
    let mut conn = db.get_connection()?;
    // Take the write lock up front; a deferred read-then-write upgrade can
    // fail outright while another subject commits.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tx_conn = tx.deref();

    let persisted = AggregateRepository::get(tx_conn, &fragment.subject)?;
    let merged = merge_aggregates(persisted.as_ref(), fragment);
    AggregateRepository::put(tx_conn, &merged)?;

    tx.commit()?;
    debug!(
        target: "app::aggregate",
        subject = %fragment.subject.id,
        kind = fragment.subject.kind.as_str(),
        days = merged.by_day.len(),
        "subject merged"
    );
    Ok(())
}

fn load_inputs(
    db: &DbPool,
    range: DateRange,
    locations: Option<&[String]>,
    tz: Tz,
    batch_size: usize,
    progress: &ProgressCounters,
) -> AppResult<RunInputs> {
    let conn = db.get_connection()?;
    let mut inputs = RunInputs {
        locations: DirectoryRepository::location_directory(&conn)?,
        workers: DirectoryRepository::worker_directory(&conn)?,
        ..RunInputs::default()
    };

    let query = RawEventQuery { range, locations };
    let total = RawEventRepository::count(&conn, &query)?;
    progress.reset(total);

    let allowed = |location_id: &str| {
        locations.map_or(true, |ids| ids.iter().any(|id| id == location_id))
    };

    let mut offset = 0;
    loop {
        let window = RawEventRepository::fetch_window(&conn, &query, batch_size, offset)?;
        if window.is_empty() {
            break;
        }
        let fetched = window.len();

        for row in window {
            let envelope = match row.into_envelope() {
                Ok(envelope) => envelope,
                Err(err) => {
                    inputs.errors.push(err.to_string());
                    continue;
                }
            };
            match envelope.kind {
                RawEventKind::Labor => match parse_labor_payload(&envelope, tz) {
                    Ok(record) if range.contains(record.date) && allowed(&record.location_id) => {
                        inputs.labor.push(record)
                    }
                    Ok(record) => {
                        debug!(target: "app::aggregate", record_id = %record.id, "labor record outside run window");
                    }
                    Err(err) => inputs.errors.push(err.to_string()),
                },
                RawEventKind::Sales => match parse_sales_payload(&envelope, tz) {
                    Ok(record) if range.contains(record.date) && allowed(&record.location_id) => {
                        inputs.sales.push(record)
                    }
                    Ok(record) => {
                        debug!(target: "app::aggregate", record_id = %record.id, "sales record outside run window");
                    }
                    Err(err) => inputs.errors.push(err.to_string()),
                },
            }
        }

        offset += fetched;
        let processed = progress.advance(fetched);
        let snapshot = progress.snapshot();
        info!(
            target: "app::aggregate",
            processed,
            total,
            percentage = snapshot.percentage,
            "raw event window processed"
        );
        if fetched < batch_size {
            break;
        }
    }

    Ok(inputs)
}
