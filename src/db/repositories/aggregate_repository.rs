use std::convert::TryFrom;

use chrono::{NaiveDate, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::aggregate::{HierarchicalAggregate, SubjectKey, SubjectKind};
use crate::models::reconciliation::ComputedDay;

#[derive(Debug, Clone)]
pub struct AggregateRow {
    pub subject_kind: String,
    pub subject_id: String,
    pub subject_name: String,
    pub document: String,
    pub last_run_id: Option<String>,
    pub updated_at: String,
}

impl AggregateRow {
    pub fn from_aggregate(aggregate: &HierarchicalAggregate) -> AppResult<Self> {
        Ok(Self {
            subject_kind: aggregate.subject.kind.as_str().to_string(),
            subject_id: aggregate.subject.id.clone(),
            subject_name: aggregate.subject_name.clone(),
            document: serde_json::to_string(aggregate)?,
            last_run_id: aggregate.last_run_id.clone(),
            updated_at: aggregate
                .updated_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        })
    }

    pub fn into_aggregate(self) -> AppResult<HierarchicalAggregate> {
        let aggregate: HierarchicalAggregate = serde_json::from_str(&self.document)?;
        if aggregate.subject.id != self.subject_id
            || aggregate.subject.kind.as_str() != self.subject_kind
        {
            return Err(AppError::conflict(format!(
                "stored document for {}/{} names a different subject",
                self.subject_kind, self.subject_id
            )));
        }
        Ok(aggregate)
    }
}

impl TryFrom<&Row<'_>> for AggregateRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            subject_kind: row.get("subject_kind")?,
            subject_id: row.get("subject_id")?,
            subject_name: row.get("subject_name")?,
            document: row.get("document")?,
            last_run_id: row.get("last_run_id")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct AggregateRepository;

impl AggregateRepository {
    pub fn get(conn: &Connection, subject: &SubjectKey) -> AppResult<Option<HierarchicalAggregate>> {
        let row = conn
            .query_row(
                r#"
                    SELECT subject_kind, subject_id, subject_name, document, last_run_id, updated_at
                    FROM aggregates
                    WHERE subject_kind = :subject_kind AND subject_id = :subject_id
                "#,
                named_params! {
                    ":subject_kind": subject.kind.as_str(),
                    ":subject_id": subject.id,
                },
                |row| AggregateRow::try_from(row),
            )
            .optional()?;

        row.map(AggregateRow::into_aggregate).transpose()
    }

    pub fn put(conn: &Connection, aggregate: &HierarchicalAggregate) -> AppResult<()> {
        let row = AggregateRow::from_aggregate(aggregate)?;
        conn.execute(
            r#"
                INSERT INTO aggregates (
                    subject_kind, subject_id, subject_name, document, last_run_id, updated_at
                ) VALUES (
                    :subject_kind, :subject_id, :subject_name, :document, :last_run_id, :updated_at
                )
                ON CONFLICT(subject_kind, subject_id) DO UPDATE SET
                    subject_name = excluded.subject_name,
                    document = excluded.document,
                    last_run_id = excluded.last_run_id,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":subject_kind": row.subject_kind,
                ":subject_id": row.subject_id,
                ":subject_name": row.subject_name,
                ":document": row.document,
                ":last_run_id": row.last_run_id,
                ":updated_at": row.updated_at,
            },
        )?;
        Ok(())
    }

    pub fn list_subjects(conn: &Connection, kind: SubjectKind) -> AppResult<Vec<SubjectKey>> {
        let mut stmt = conn.prepare(
            "SELECT subject_id FROM aggregates WHERE subject_kind = :subject_kind ORDER BY subject_id",
        )?;
        let rows = stmt.query_map(named_params! { ":subject_kind": kind.as_str() }, |row| {
            row.get::<_, String>(0)
        })?;

        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(SubjectKey {
                kind,
                id: row?,
            });
        }
        Ok(subjects)
    }

    /// Day entries of every location document between `from` and `to`,
    /// flattened to one value per (location, date). Documents that fail
    /// to decode are logged and passed over.
    pub fn load_location_days(
        conn: &Connection,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ComputedDay>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT subject_kind, subject_id, subject_name, document, last_run_id, updated_at
                FROM aggregates
                WHERE subject_kind = 'location'
                ORDER BY subject_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| AggregateRow::try_from(row))?;

        let mut days = Vec::new();
        for row in rows {
            let row = row?;
            let subject_id = row.subject_id.clone();
            let aggregate = match row.into_aggregate() {
                Ok(aggregate) => aggregate,
                Err(err) => {
                    warn!(target: "app::db", %subject_id, error = %err, "unreadable aggregate document");
                    continue;
                }
            };
            for entry in &aggregate.by_day {
                let Some(date) = entry.date() else { continue };
                if date < from || date > to {
                    continue;
                }
                for location in &entry.by_location {
                    days.push(ComputedDay {
                        location_id: location.location_id.clone(),
                        date,
                        hours: location.totals.quantity,
                        wage_cost: location.totals.cost,
                        revenue: location.totals.revenue,
                    });
                }
            }
        }
        Ok(days)
    }
}
