use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, Row};

use crate::error::{AppError, AppResult};
use crate::models::category::ShareCategory;
use crate::models::period::{DateRange, Granularity};
use crate::models::reconciliation::ComputedWorker;
use crate::models::share::{CategorizedShare, MissingWage, WorkerShare};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_category(value: &str) -> AppResult<ShareCategory> {
    ShareCategory::parse(value)
        .ok_or_else(|| AppError::validation(format!("unknown share category {value}")))
}

fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| AppError::validation(format!("unreadable share date {value}")))
}

#[derive(Debug, Clone)]
pub struct CategorizedShareRow {
    pub share_date: String,
    pub location_id: String,
    pub location_name: String,
    pub category: String,
    pub team_name: String,
    pub hours: f64,
    pub wage_cost: f64,
    pub allocated_revenue: f64,
}

impl CategorizedShareRow {
    pub fn into_model(self) -> AppResult<CategorizedShare> {
        Ok(CategorizedShare {
            granularity: Granularity::Day,
            period: self.share_date,
            location_id: self.location_id,
            location_name: self.location_name,
            category: parse_category(&self.category)?,
            team_name: self.team_name,
            hours: self.hours,
            wage_cost: self.wage_cost,
            allocated_revenue: self.allocated_revenue,
        })
    }
}

impl TryFrom<&Row<'_>> for CategorizedShareRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            share_date: row.get("share_date")?,
            location_id: row.get("location_id")?,
            location_name: row.get("location_name")?,
            category: row.get("category")?,
            team_name: row.get("team_name")?,
            hours: row.get("hours")?,
            wage_cost: row.get("wage_cost")?,
            allocated_revenue: row.get("allocated_revenue")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkerShareRow {
    pub share_date: String,
    pub location_id: String,
    pub location_name: String,
    pub worker_id: String,
    pub worker_name: String,
    pub team_name: String,
    pub category: String,
    pub hours: f64,
    pub wage_cost: f64,
    pub hourly_wage: f64,
    pub allocated_revenue: f64,
}

impl WorkerShareRow {
    pub fn into_model(self) -> AppResult<WorkerShare> {
        Ok(WorkerShare {
            date: parse_date(&self.share_date)?,
            location_id: self.location_id,
            location_name: self.location_name,
            worker_id: self.worker_id,
            worker_name: self.worker_name,
            team_name: self.team_name,
            category: parse_category(&self.category)?,
            hours: self.hours,
            wage_cost: self.wage_cost,
            hourly_wage: self.hourly_wage,
            allocated_revenue: self.allocated_revenue,
        })
    }
}

impl TryFrom<&Row<'_>> for WorkerShareRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            share_date: row.get("share_date")?,
            location_id: row.get("location_id")?,
            location_name: row.get("location_name")?,
            worker_id: row.get("worker_id")?,
            worker_name: row.get("worker_name")?,
            team_name: row.get("team_name")?,
            category: row.get("category")?,
            hours: row.get("hours")?,
            wage_cost: row.get("wage_cost")?,
            hourly_wage: row.get("hourly_wage")?,
            allocated_revenue: row.get("allocated_revenue")?,
        })
    }
}

/// Derived share tables. Shares are recomputed from scratch per run, so
/// writes replace everything for the covered (day, location) pairs.
pub struct ShareRepository;

impl ShareRepository {
    /// Deletes shares of `location_id` inside `range` from all three tables.
    pub fn clear_location(conn: &Connection, range: &DateRange, location_id: &str) -> AppResult<usize> {
        let mut removed = 0;
        for table in ["categorized_shares", "worker_shares", "missing_wages"] {
            let sql = format!(
                "DELETE FROM {table} WHERE location_id = :location_id AND share_date >= :from AND share_date <= :to"
            );
            removed += conn.execute(
                &sql,
                named_params! {
                    ":location_id": location_id,
                    ":from": range.from.format(DATE_FORMAT).to_string(),
                    ":to": range.to.format(DATE_FORMAT).to_string(),
                },
            )?;
        }
        Ok(removed)
    }

    pub fn insert_share(conn: &Connection, share: &CategorizedShare, run_id: &str) -> AppResult<()> {
        if share.granularity != Granularity::Day {
            return Err(AppError::validation("only day-level shares are stored"));
        }
        conn.execute(
            r#"
                INSERT INTO categorized_shares (
                    share_date, location_id, location_name, category, team_name,
                    hours, wage_cost, allocated_revenue, run_id
                ) VALUES (
                    :share_date, :location_id, :location_name, :category, :team_name,
                    :hours, :wage_cost, :allocated_revenue, :run_id
                )
            "#,
            named_params! {
                ":share_date": share.period,
                ":location_id": share.location_id,
                ":location_name": share.location_name,
                ":category": share.category.as_str(),
                ":team_name": share.team_name,
                ":hours": share.hours,
                ":wage_cost": share.wage_cost,
                ":allocated_revenue": share.allocated_revenue,
                ":run_id": run_id,
            },
        )?;
        Ok(())
    }

    pub fn insert_worker_share(conn: &Connection, share: &WorkerShare, run_id: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO worker_shares (
                    share_date, location_id, location_name, worker_id, worker_name, team_name,
                    category, hours, wage_cost, hourly_wage, allocated_revenue, run_id
                ) VALUES (
                    :share_date, :location_id, :location_name, :worker_id, :worker_name, :team_name,
                    :category, :hours, :wage_cost, :hourly_wage, :allocated_revenue, :run_id
                )
            "#,
            named_params! {
                ":share_date": share.date.format(DATE_FORMAT).to_string(),
                ":location_id": share.location_id,
                ":location_name": share.location_name,
                ":worker_id": share.worker_id,
                ":worker_name": share.worker_name,
                ":team_name": share.team_name,
                ":category": share.category.as_str(),
                ":hours": share.hours,
                ":wage_cost": share.wage_cost,
                ":hourly_wage": share.hourly_wage,
                ":allocated_revenue": share.allocated_revenue,
                ":run_id": run_id,
            },
        )?;
        Ok(())
    }

    pub fn insert_missing_wage(conn: &Connection, missing: &MissingWage, run_id: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO missing_wages (
                    share_date, location_id, worker_id, worker_name, team_name, hours, run_id
                ) VALUES (
                    :share_date, :location_id, :worker_id, :worker_name, :team_name, :hours, :run_id
                )
            "#,
            named_params! {
                ":share_date": missing.date.format(DATE_FORMAT).to_string(),
                ":location_id": missing.location_id,
                ":worker_id": missing.worker_id,
                ":worker_name": missing.worker_name,
                ":team_name": missing.team_name,
                ":hours": missing.hours,
                ":run_id": run_id,
            },
        )?;
        Ok(())
    }

    pub fn shares_between(conn: &Connection, range: &DateRange) -> AppResult<Vec<CategorizedShare>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT share_date, location_id, location_name, category, team_name,
                       hours, wage_cost, allocated_revenue
                FROM categorized_shares
                WHERE share_date >= :from AND share_date <= :to
                ORDER BY share_date, location_id, category, team_name
            "#,
        )?;
        let rows = stmt.query_map(
            named_params! {
                ":from": range.from.format(DATE_FORMAT).to_string(),
                ":to": range.to.format(DATE_FORMAT).to_string(),
            },
            |row| CategorizedShareRow::try_from(row),
        )?;

        let mut shares = Vec::new();
        for row in rows {
            shares.push(row?.into_model()?);
        }
        Ok(shares)
    }

    pub fn worker_shares_between(conn: &Connection, range: &DateRange) -> AppResult<Vec<WorkerShare>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT share_date, location_id, location_name, worker_id, worker_name, team_name,
                       category, hours, wage_cost, hourly_wage, allocated_revenue
                FROM worker_shares
                WHERE share_date >= :from AND share_date <= :to
                ORDER BY share_date, location_id, worker_name
            "#,
        )?;
        let rows = stmt.query_map(
            named_params! {
                ":from": range.from.format(DATE_FORMAT).to_string(),
                ":to": range.to.format(DATE_FORMAT).to_string(),
            },
            |row| WorkerShareRow::try_from(row),
        )?;

        let mut shares = Vec::new();
        for row in rows {
            shares.push(row?.into_model()?);
        }
        Ok(shares)
    }

    /// Worker hours in the shape the reconciler compares against. Workers
    /// left out of allocation for lack of a wage still worked their hours,
    /// so they are included and flagged.
    pub fn computed_workers(conn: &Connection, range: &DateRange) -> AppResult<Vec<ComputedWorker>> {
        let allocated = Self::worker_shares_between(conn, range)?
            .into_iter()
            .map(|share| ComputedWorker {
                location_id: share.location_id,
                date: share.date,
                worker_name: share.worker_name,
                team_name: share.team_name,
                hours: share.hours,
                wage_missing: false,
            });
        let unpaid = Self::missing_wages_between(conn, range)?
            .into_iter()
            .map(|missing| ComputedWorker {
                location_id: missing.location_id,
                date: missing.date,
                worker_name: missing.worker_name,
                team_name: missing.team_name,
                hours: missing.hours,
                wage_missing: true,
            });
        Ok(allocated.chain(unpaid).collect())
    }

    pub fn missing_wages_between(conn: &Connection, range: &DateRange) -> AppResult<Vec<MissingWage>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT share_date, location_id, worker_id, worker_name, team_name, hours
                FROM missing_wages
                WHERE share_date >= :from AND share_date <= :to
                ORDER BY share_date, location_id, worker_id
            "#,
        )?;
        let rows = stmt.query_map(
            named_params! {
                ":from": range.from.format(DATE_FORMAT).to_string(),
                ":to": range.to.format(DATE_FORMAT).to_string(),
            },
            |row| {
                Ok((
                    row.get::<_, String>("share_date")?,
                    row.get::<_, String>("location_id")?,
                    row.get::<_, String>("worker_id")?,
                    row.get::<_, String>("worker_name")?,
                    row.get::<_, String>("team_name")?,
                    row.get::<_, f64>("hours")?,
                ))
            },
        )?;

        let mut missing = Vec::new();
        for row in rows {
            let (share_date, location_id, worker_id, worker_name, team_name, hours) = row?;
            missing.push(MissingWage {
                date: parse_date(&share_date)?,
                location_id,
                worker_id,
                worker_name,
                team_name,
                hours,
            });
        }
        Ok(missing)
    }
}
