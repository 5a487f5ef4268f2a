// Error handling and edge case tests

use chrono::{NaiveDate, TimeZone, Utc};
use opsledger_lib::db::repositories::aggregate_repository::AggregateRepository;
use opsledger_lib::db::repositories::directory_repository::DirectoryRepository;
use opsledger_lib::db::repositories::raw_event_repository::RawEventRepository;
use opsledger_lib::db::DbPool;
use opsledger_lib::error::AppError;
use opsledger_lib::models::aggregate::SubjectKey;
use opsledger_lib::models::directory::Location;
use opsledger_lib::models::period::DateRange;
use opsledger_lib::models::raw::{RawEventEnvelope, RawEventKind};
use opsledger_lib::models::settings::EngineSettings;
use opsledger_lib::services::aggregation_service::AggregationService;
use serde_json::{json, Value};
use tempfile::tempdir;

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

fn envelope(id: &str, kind: RawEventKind, location: Option<&str>, payload: Value) -> RawEventEnvelope {
    RawEventEnvelope {
        id: id.into(),
        kind,
        location_id: location.map(str::to_string),
        business_date: None,
        created_at: Utc
            .with_ymd_and_hms(2024, 6, 1, 22, 0, 0)
            .single()
            .expect("timestamp"),
        payload,
    }
}

fn seeded_pool(dir: &tempfile::TempDir) -> DbPool {
    let pool = DbPool::new(dir.path().join("ledger.sqlite")).expect("db pool");
    pool.with_connection(|conn| {
        DirectoryRepository::upsert_location(
            conn,
            &Location {
                id: "bar-bea".into(),
                name: "Bar Bea".into(),
            },
        )
    })
    .expect("seed location");
    pool
}

#[tokio::test]
async fn test_invalid_records_are_collected_not_fatal() {
    let dir = tempdir().expect("temp dir");
    let pool = seeded_pool(&dir);

    pool.with_connection(|conn| {
        RawEventRepository::insert(
            conn,
            &envelope(
                "good",
                RawEventKind::Labor,
                Some("bar-bea"),
                json!({"date": "2024-06-01", "hours": 9, "wageCost": 90}),
            ),
        )?;
        RawEventRepository::insert(
            conn,
            &envelope("no-date", RawEventKind::Labor, Some("bar-bea"), json!({"hours": 4})),
        )?;
        RawEventRepository::insert(
            conn,
            &envelope(
                "no-location",
                RawEventKind::Sales,
                None,
                json!({"date": "2024-06-01", "revenue": 120}),
            ),
        )?;
        RawEventRepository::insert(
            conn,
            &envelope(
                "no-revenue",
                RawEventKind::Sales,
                Some("bar-bea"),
                json!({"date": "2024-06-01"}),
            ),
        )
    })
    .expect("seed events");

    let service = AggregationService::new(pool.clone(), EngineSettings::default()).expect("service");
    let outcome = service
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("run completes");

    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.errors.len(), 3, "errors: {:?}", outcome.errors);
    assert!(outcome.errors.iter().any(|message| message.contains("no-date")));
    assert!(outcome.errors.iter().any(|message| message.contains("no-location")));
    assert!(outcome.errors.iter().any(|message| message.contains("missing revenue")));

    let stored = pool
        .with_connection(|conn| AggregateRepository::get(conn, &SubjectKey::location("bar-bea")))
        .expect("lookup")
        .expect("aggregate written");
    assert_eq!(stored.by_day.len(), 1);
    assert_eq!(stored.by_day[0].totals.quantity, 9.0);
}

#[tokio::test]
async fn test_unreadable_document_fails_only_its_subject() {
    let dir = tempdir().expect("temp dir");
    let pool = seeded_pool(&dir);

    pool.with_connection(|conn| {
        DirectoryRepository::upsert_location(
            conn,
            &Location {
                id: "cafe-centraal".into(),
                name: "Cafe Centraal".into(),
            },
        )?;
        conn.execute(
            "INSERT INTO aggregates (subject_kind, subject_id, subject_name, document, updated_at)
             VALUES ('location', 'bar-bea', 'Bar Bea', '{not json', ?1)",
            [Utc::now().to_rfc3339()],
        )?;
        for location in ["bar-bea", "cafe-centraal"] {
            RawEventRepository::insert(
                conn,
                &envelope(
                    &format!("labor-{location}"),
                    RawEventKind::Labor,
                    Some(location),
                    json!({"date": "2024-06-01", "hours": 5, "wageCost": 50}),
                ),
            )?;
        }
        Ok(())
    })
    .expect("seed");

    let service = AggregationService::new(pool.clone(), EngineSettings::default()).expect("service");
    let outcome = service
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("run completes");

    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("location/bar-bea"));

    let document: String = pool
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT document FROM aggregates WHERE subject_id = 'bar-bea'",
                [],
                |row| row.get(0),
            )?)
        })
        .expect("raw document");
    assert_eq!(document, "{not json");
}

#[tokio::test]
async fn test_unreachable_store_aborts_the_run() {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("ledger.sqlite");
    let pool = DbPool::new(&db_path).expect("db pool");
    let service = AggregationService::new(pool, EngineSettings::default()).expect("service");

    for suffix in ["", "-wal", "-shm"] {
        let path = dir.path().join(format!("ledger.sqlite{suffix}"));
        if path.exists() {
            std::fs::remove_file(&path).expect("remove db file");
        }
    }
    std::fs::create_dir(&db_path).expect("block db path");

    let error = service
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect_err("store is unreachable");
    assert!(error.is_fatal());
    assert!(matches!(error, AppError::Database { .. }));
}

#[test]
fn test_inverted_range_is_rejected() {
    let later = NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date");
    let result = DateRange::new(later, june_first());
    assert!(matches!(result, Err(AppError::Validation { .. })));
}
