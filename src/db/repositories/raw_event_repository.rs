use std::convert::TryFrom;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{named_params, params_from_iter, Connection, Row};

use crate::error::{AppError, AppResult};
use crate::models::period::DateRange;
use crate::models::raw::{RawEventEnvelope, RawEventKind};

#[derive(Debug, Clone)]
pub struct RawEventRow {
    pub id: String,
    pub kind: String,
    pub location_id: Option<String>,
    pub business_date: Option<String>,
    pub created_at: String,
    pub payload: String,
}

impl RawEventRow {
    pub fn from_envelope(envelope: &RawEventEnvelope) -> AppResult<Self> {
        Ok(Self {
            id: envelope.id.clone(),
            kind: envelope.kind.as_str().to_string(),
            location_id: envelope.location_id.clone(),
            business_date: envelope
                .business_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
            created_at: envelope.created_at.to_rfc3339(),
            payload: serde_json::to_string(&envelope.payload)?,
        })
    }

    pub fn into_envelope(self) -> AppResult<RawEventEnvelope> {
        let kind = match self.kind.as_str() {
            "labor" => RawEventKind::Labor,
            "sales" => RawEventKind::Sales,
            other => {
                return Err(AppError::invalid_record(
                    &self.id,
                    format!("unknown event kind {other}"),
                ))
            }
        };
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| AppError::invalid_record(&self.id, "unreadable created_at"))?
            .with_timezone(&Utc);
        let business_date = match self.business_date.as_deref() {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| AppError::invalid_record(&self.id, "unreadable business_date"))?,
            ),
            None => None,
        };
        let payload = serde_json::from_str(&self.payload)
            .map_err(|err| AppError::invalid_record(&self.id, format!("payload is not JSON: {err}")))?;

        Ok(RawEventEnvelope {
            id: self.id,
            kind,
            location_id: self.location_id,
            business_date,
            created_at,
            payload,
        })
    }
}

impl TryFrom<&Row<'_>> for RawEventRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            location_id: row.get("location_id")?,
            business_date: row.get("business_date")?,
            created_at: row.get("created_at")?,
            payload: row.get("payload")?,
        })
    }
}

/// Window of raw events for one aggregation run. Events without a
/// business date or location column are always included; the payload
/// decides for them.
#[derive(Debug, Clone)]
pub struct RawEventQuery<'a> {
    pub range: DateRange,
    pub locations: Option<&'a [String]>,
}

impl RawEventQuery<'_> {
    fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from(
            "(business_date IS NULL OR (business_date >= ? AND business_date <= ?))",
        );
        let mut params = vec![
            SqlValue::Text(self.range.from.format("%Y-%m-%d").to_string()),
            SqlValue::Text(self.range.to.format("%Y-%m-%d").to_string()),
        ];
        if let Some(locations) = self.locations {
            if locations.is_empty() {
                sql.push_str(" AND location_id IS NULL");
            } else {
                let placeholders = vec!["?"; locations.len()].join(", ");
                sql.push_str(&format!(
                    " AND (location_id IS NULL OR location_id IN ({placeholders}))"
                ));
                params.extend(locations.iter().cloned().map(SqlValue::Text));
            }
        }
        (sql, params)
    }
}

pub struct RawEventRepository;

impl RawEventRepository {
    pub fn insert(conn: &Connection, envelope: &RawEventEnvelope) -> AppResult<()> {
        let row = RawEventRow::from_envelope(envelope)?;
        conn.execute(
            r#"
                INSERT INTO raw_events (
                    id, kind, location_id, business_date, created_at, payload, inserted_at
                ) VALUES (
                    :id, :kind, :location_id, :business_date, :created_at, :payload, :inserted_at
                )
            "#,
            named_params! {
                ":id": row.id,
                ":kind": row.kind,
                ":location_id": row.location_id,
                ":business_date": row.business_date,
                ":created_at": row.created_at,
                ":payload": row.payload,
                ":inserted_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn count(conn: &Connection, query: &RawEventQuery<'_>) -> AppResult<usize> {
        let (clause, params) = query.where_clause();
        let sql = format!("SELECT COUNT(*) FROM raw_events WHERE {clause}");
        let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// One page of events in a stable order (business date, creation time, id).
    pub fn fetch_window(
        conn: &Connection,
        query: &RawEventQuery<'_>,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<RawEventRow>> {
        let (clause, mut params) = query.where_clause();
        let sql = format!(
            r#"
                SELECT id, kind, location_id, business_date, created_at, payload
                FROM raw_events
                WHERE {clause}
                ORDER BY business_date, created_at, id
                LIMIT ? OFFSET ?
            "#
        );
        params.push(SqlValue::Integer(limit as i64));
        params.push(SqlValue::Integer(offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| RawEventRow::try_from(row))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}
