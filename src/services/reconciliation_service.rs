use std::ops::Deref;

use tracing::info;

use crate::db::repositories::aggregate_repository::AggregateRepository;
use crate::db::repositories::directory_repository::DirectoryRepository;
use crate::db::repositories::reference_repository::ReferenceRepository;
use crate::db::repositories::share_repository::ShareRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::period::DateRange;
use crate::models::reconciliation::{DateFilter, ReconcileReport, ReferenceRow};
use crate::models::settings::EngineSettings;
use crate::services::reconciler::{
    index_computed_days, reconcile_daily, reconcile_workers, reference_span, summarize,
    ComputedDayIndex, ReconcileRules,
};

/// Read-only comparison of stored reference rows with persisted aggregates
/// and worker shares.
pub struct ReconciliationService {
    db: DbPool,
    rules: ReconcileRules,
}

impl ReconciliationService {
    pub fn new(db: DbPool, settings: &EngineSettings) -> Self {
        Self {
            db,
            rules: ReconcileRules::from_settings(settings),
        }
    }

    /// Stores reference rows in one transaction.
    pub fn import_rows(&self, rows: &[ReferenceRow]) -> AppResult<usize> {
        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction()?;
        let inserted = ReferenceRepository::insert_rows(tx.deref(), rows)?;
        tx.commit()?;
        info!(target: "app::reconcile", inserted, "reference rows imported");
        Ok(inserted)
    }

    /// Re-imports one spreadsheet: rows previously stored for
    /// `source_file` are dropped and `rows` take their place, so a corrected
    /// file never double counts. Rows are stamped with `source_file`.
    pub fn replace_source(&self, source_file: &str, rows: &[ReferenceRow]) -> AppResult<usize> {
        let stamped: Vec<ReferenceRow> = rows
            .iter()
            .map(|row| ReferenceRow {
                source_file: source_file.to_string(),
                ..row.clone()
            })
            .collect();

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction()?;
        let removed = ReferenceRepository::delete_source(tx.deref(), source_file)?;
        let inserted = ReferenceRepository::insert_rows(tx.deref(), &stamped)?;
        tx.commit()?;
        info!(
            target: "app::reconcile",
            source_file,
            removed,
            inserted,
            "reference source replaced"
        );
        Ok(inserted)
    }

    pub fn reconcile(&self, filter: &DateFilter) -> AppResult<ReconcileReport> {
        self.db.with_connection(|conn| {
            let locations = DirectoryRepository::location_directory(conn)?;
            let rows = ReferenceRepository::list_rows(conn)?;

            // Computed data is read once for the whole span the reference touches.
            let (days, workers) = match reference_span(&rows, filter) {
                Some((from, to)) => {
                    let span = DateRange::new(from, to)?;
                    (
                        index_computed_days(AggregateRepository::load_location_days(conn, from, to)?),
                        ShareRepository::computed_workers(conn, &span)?,
                    )
                }
                None => (ComputedDayIndex::new(), Vec::new()),
            };

            let daily = reconcile_daily(&rows, &locations, &days, filter, &self.rules);
            let worker = reconcile_workers(&rows, &locations, &workers, filter, &self.rules);

            let summary = summarize(&daily.verifications, &worker.verifications);
            let mut discrepancies = daily.discrepancies;
            discrepancies.extend(worker.discrepancies);
            let mut skipped = daily.skipped;
            skipped.extend(worker.skipped);

            info!(
                target: "app::reconcile",
                verified = summary.total_verified,
                workers = summary.worker_total,
                discrepancies = discrepancies.len(),
                skipped = skipped.len(),
                match_rate = summary.match_rate,
                "reconciliation finished"
            );

            Ok(ReconcileReport {
                verifications: daily.verifications,
                worker_verifications: worker.verifications,
                discrepancies,
                skipped,
                summary,
            })
        })
    }
}
