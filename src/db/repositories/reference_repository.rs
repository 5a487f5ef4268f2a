use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::reconciliation::ReferenceRow;

#[derive(Debug, Clone)]
pub struct ReferenceRowRecord {
    pub source_file: String,
    pub location_name: String,
    pub raw_date: String,
    pub revenue: Option<f64>,
    pub hours: Option<f64>,
    pub wage_cost: Option<f64>,
    pub worker_name: Option<String>,
    pub team_name: Option<String>,
}

impl ReferenceRowRecord {
    pub fn into_model(self) -> ReferenceRow {
        ReferenceRow {
            source_file: self.source_file,
            location_name: self.location_name,
            date: self.raw_date,
            revenue: self.revenue,
            hours: self.hours,
            wage_cost: self.wage_cost,
            worker_name: self.worker_name,
            team_name: self.team_name,
        }
    }
}

impl TryFrom<&Row<'_>> for ReferenceRowRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            source_file: row.get("source_file")?,
            location_name: row.get("location_name")?,
            raw_date: row.get("raw_date")?,
            revenue: row.get("revenue")?,
            hours: row.get("hours")?,
            wage_cost: row.get("wage_cost")?,
            worker_name: row.get("worker_name")?,
            team_name: row.get("team_name")?,
        })
    }
}

pub struct ReferenceRepository;

impl ReferenceRepository {
    pub fn insert_rows(conn: &Connection, rows: &[ReferenceRow]) -> AppResult<usize> {
        let imported_at = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            r#"
                INSERT INTO reference_rows (
                    source_file, location_name, raw_date, revenue, hours, wage_cost,
                    worker_name, team_name, imported_at
                ) VALUES (
                    :source_file, :location_name, :raw_date, :revenue, :hours, :wage_cost,
                    :worker_name, :team_name, :imported_at
                )
            "#,
        )?;

        for row in rows {
            stmt.execute(named_params! {
                ":source_file": row.source_file,
                ":location_name": row.location_name,
                ":raw_date": row.date,
                ":revenue": row.revenue,
                ":hours": row.hours,
                ":wage_cost": row.wage_cost,
                ":worker_name": row.worker_name,
                ":team_name": row.team_name,
                ":imported_at": imported_at,
            })?;
        }
        Ok(rows.len())
    }

    /// All stored rows. Dates are free text in several formats, so date
    /// filtering happens after parsing.
    pub fn list_rows(conn: &Connection) -> AppResult<Vec<ReferenceRow>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT source_file, location_name, raw_date, revenue, hours, wage_cost,
                       worker_name, team_name
                FROM reference_rows
                ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| ReferenceRowRecord::try_from(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_model());
        }
        Ok(records)
    }

    pub fn delete_source(conn: &Connection, source_file: &str) -> AppResult<usize> {
        let removed = conn.execute(
            "DELETE FROM reference_rows WHERE source_file = :source_file",
            named_params! { ":source_file": source_file },
        )?;
        Ok(removed)
    }
}
