use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::directory::{Location, LocationDirectory, Worker, WorkerDirectory};

#[derive(Debug, Clone)]
pub struct LocationRow {
    pub id: String,
    pub name: String,
}

impl LocationRow {
    pub fn into_model(self) -> Location {
        Location {
            id: self.id,
            name: self.name,
        }
    }
}

impl TryFrom<&Row<'_>> for LocationRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkerRow {
    pub id: String,
    pub name: String,
    pub hourly_wage: Option<f64>,
    pub team_name: Option<String>,
}

impl WorkerRow {
    pub fn into_model(self) -> Worker {
        Worker {
            id: self.id,
            name: self.name,
            hourly_wage: self.hourly_wage,
            team_name: self.team_name,
        }
    }
}

impl TryFrom<&Row<'_>> for WorkerRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            hourly_wage: row.get("hourly_wage")?,
            team_name: row.get("team_name")?,
        })
    }
}

pub struct DirectoryRepository;

impl DirectoryRepository {
    pub fn upsert_location(conn: &Connection, location: &Location) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO locations (id, name, updated_at)
                VALUES (:id, :name, :updated_at)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":id": location.id,
                ":name": location.name,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn upsert_worker(conn: &Connection, worker: &Worker) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO workers (id, name, hourly_wage, team_name, updated_at)
                VALUES (:id, :name, :hourly_wage, :team_name, :updated_at)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    hourly_wage = excluded.hourly_wage,
                    team_name = excluded.team_name,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":id": worker.id,
                ":name": worker.name,
                ":hourly_wage": worker.hourly_wage,
                ":team_name": worker.team_name,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn list_locations(conn: &Connection) -> AppResult<Vec<LocationRow>> {
        let mut stmt = conn.prepare("SELECT id, name FROM locations ORDER BY id")?;
        let rows = stmt.query_map([], |row| LocationRow::try_from(row))?;

        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    pub fn list_workers(conn: &Connection) -> AppResult<Vec<WorkerRow>> {
        let mut stmt =
            conn.prepare("SELECT id, name, hourly_wage, team_name FROM workers ORDER BY id")?;
        let rows = stmt.query_map([], |row| WorkerRow::try_from(row))?;

        let mut workers = Vec::new();
        for row in rows {
            workers.push(row?);
        }
        Ok(workers)
    }

    pub fn location_directory(conn: &Connection) -> AppResult<LocationDirectory> {
        let locations = Self::list_locations(conn)?
            .into_iter()
            .map(LocationRow::into_model)
            .collect();
        Ok(LocationDirectory::new(locations))
    }

    pub fn worker_directory(conn: &Connection) -> AppResult<WorkerDirectory> {
        let workers = Self::list_workers(conn)?
            .into_iter()
            .map(WorkerRow::into_model)
            .collect();
        Ok(WorkerDirectory::new(workers))
    }
}
