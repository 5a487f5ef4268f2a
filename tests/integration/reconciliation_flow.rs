use chrono::{NaiveDate, TimeZone, Utc};
use opsledger_lib::db::repositories::directory_repository::DirectoryRepository;
use opsledger_lib::db::repositories::raw_event_repository::RawEventRepository;
use opsledger_lib::db::repositories::reference_repository::ReferenceRepository;
use opsledger_lib::db::DbPool;
use opsledger_lib::models::directory::Location;
use opsledger_lib::models::period::DateRange;
use opsledger_lib::models::raw::{RawEventEnvelope, RawEventKind};
use opsledger_lib::models::reconciliation::{DateFilter, DiscrepancyType, ReferenceRow, Severity};
use opsledger_lib::models::settings::EngineSettings;
use opsledger_lib::services::aggregation_service::AggregationService;
use opsledger_lib::services::reconciliation_service::ReconciliationService;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

struct Harness {
    pool: DbPool,
    aggregation: AggregationService,
    reconciliation: ReconciliationService,
    _dir: TempDir,
}

fn setup() -> Harness {
    let dir = tempdir().expect("temp dir");
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

    let settings = EngineSettings::default();
    Harness {
        aggregation: AggregationService::new(pool.clone(), settings.clone()).expect("aggregation"),
        reconciliation: ReconciliationService::new(pool.clone(), &settings),
        pool,
        _dir: dir,
    }
}

fn insert_labor(pool: &DbPool, id: &str, payload: Value) {
    let envelope = RawEventEnvelope {
        id: id.into(),
        kind: RawEventKind::Labor,
        location_id: Some("bar-bea".into()),
        business_date: Some(june_first()),
        created_at: Utc
            .with_ymd_and_hms(2024, 6, 1, 23, 0, 0)
            .single()
            .expect("timestamp"),
        payload,
    };
    pool.with_connection(|conn| RawEventRepository::insert(conn, &envelope))
        .expect("insert raw event");
}

fn daily_row(file: &str, location: &str, date: &str, revenue: f64) -> ReferenceRow {
    ReferenceRow {
        source_file: file.into(),
        location_name: location.into(),
        date: date.into(),
        revenue: Some(revenue),
        ..ReferenceRow::default()
    }
}

fn worker_row(name: &str, team: &str, hours: f64) -> ReferenceRow {
    ReferenceRow {
        source_file: "uren.xlsx".into(),
        location_name: "Bar Bea".into(),
        date: "2024-06-01".into(),
        hours: Some(hours),
        worker_name: Some(name.into()),
        team_name: Some(team.into()),
        ..ReferenceRow::default()
    }
}

fn june_filter() -> DateFilter {
    DateFilter::between(june_first(), june_first())
}

#[tokio::test]
async fn exact_agreement_reports_full_match() {
    let harness = setup();
    insert_labor(
        &harness.pool,
        "labor-1",
        json!({
            "locationId": "bar-bea",
            "date": "2024-06-01",
            "hours": 9,
            "wageCost": 90,
            "revenue": 900,
            "workers": [
                {"id": "w-jane", "name": "Jane Doe", "hours": 6, "cost": 60, "teamName": "Keuken"},
                {"id": "w-kees", "name": "Kees", "hours": 3, "cost": 30, "teamName": "Bediening"}
            ]
        }),
    );
    harness
        .aggregation
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("aggregate");

    harness
        .reconciliation
        .import_rows(&[
            ReferenceRow {
                hours: Some(9.0),
                wage_cost: Some(90.0),
                ..daily_row("omzet.xlsx", "bar bea", "01/06/2024", 900.0)
            },
            worker_row("Jane  Doe", "keuken", 6.0),
            worker_row("Kees", "Bediening", 3.0),
        ])
        .expect("import");

    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");
    assert!(report.discrepancies.is_empty(), "{:?}", report.discrepancies);
    assert_eq!(report.summary.total_verified, 1);
    assert_eq!(report.summary.match_rate, 100.0);
    assert_eq!(report.summary.worker_match_count, 2);
    assert_eq!(report.verifications[0].comparisons.len(), 4);
}

#[tokio::test]
async fn rows_split_across_files_are_summed_before_comparison() {
    let harness = setup();
    insert_labor(
        &harness.pool,
        "labor-1",
        json!({"hours": 8, "wageCost": 80, "revenue": 800}),
    );
    harness
        .aggregation
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("aggregate");

    harness
        .reconciliation
        .import_rows(&[
            daily_row("file-a.xlsx", "Bar Bea", "01/06/2024", 500.0),
            daily_row("file-b.xlsx", "Bar Bea", "2024-06-01", 300.0),
        ])
        .expect("import");

    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");
    assert_eq!(report.verifications.len(), 1);
    let verification = &report.verifications[0];
    assert_eq!(verification.reference_rows, 2);
    assert_eq!(verification.source_files.len(), 2);
    assert_eq!(verification.comparisons[0].reference_value, 800.0);
    assert!(verification.is_match);

    let removed = harness
        .pool
        .with_connection(|conn| ReferenceRepository::delete_source(conn, "file-b.xlsx"))
        .expect("delete source");
    assert_eq!(removed, 1);
    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");
    assert_eq!(report.verifications[0].reference_rows, 1);
    assert!(!report.verifications[0].is_match);
}

#[tokio::test]
async fn data_quality_problems_become_discrepancies() {
    let harness = setup();
    insert_labor(
        &harness.pool,
        "labor-1",
        json!({"hours": 10, "wageCost": 100, "revenue": 1050}),
    );
    harness
        .aggregation
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("aggregate");

    harness
        .reconciliation
        .import_rows(&[
            daily_row("omzet.xlsx", "Bar Bea", "2024-06-01", 1000.0),
            daily_row("omzet.xlsx", "Bistro Onbekend", "2024-06-01", 400.0),
            daily_row("omzet.xlsx", "Bar Bea", "gisteren", 10.0),
            worker_row("Jane Doe", "Keuken", 6.5),
        ])
        .expect("import");

    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");

    let revenue = report
        .discrepancies
        .iter()
        .find(|d| d.kind == DiscrepancyType::RevenueMismatch)
        .expect("revenue mismatch");
    assert_eq!(revenue.severity, Severity::Major);
    assert_eq!(revenue.pct_difference, 5.0);

    let unknown = report
        .discrepancies
        .iter()
        .find(|d| d.kind == DiscrepancyType::MissingLocation)
        .expect("missing location");
    assert_eq!(unknown.location_name, "Bistro Onbekend");
    assert_eq!(unknown.severity, Severity::Critical);

    let jane = report
        .discrepancies
        .iter()
        .find(|d| d.kind == DiscrepancyType::WorkerNotFound)
        .expect("worker not found");
    assert_eq!(jane.reference_value, 6.5);
    assert_eq!(jane.computed_value, 0.0);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].raw_date, "gisteren");
    assert_eq!(report.summary.mismatch_count, 1);
    assert_eq!(report.summary.worker_not_found_count, 1);
    assert_eq!(report.summary.unresolved_count, 1);
    assert_eq!(report.summary.discrepancy_count, report.discrepancies.len());
    assert_eq!(report.summary.match_rate, 0.0);
}

#[test]
fn unresolved_locations_are_not_reported_as_success() {
    let harness = setup();
    harness
        .reconciliation
        .import_rows(&[daily_row("omzet.xlsx", "Bar Unknown", "01/06/2024", 750.0)])
        .expect("import");

    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");
    assert_eq!(report.discrepancies.len(), 1);
    assert_eq!(report.discrepancies[0].kind, DiscrepancyType::MissingLocation);
    assert_eq!(report.summary.discrepancy_count, 1);
    assert_eq!(report.summary.unresolved_count, 1);
    assert!(report.summary.match_rate < 100.0);

    let verification = &report.verifications[0];
    assert_eq!(verification.location_id, None);
    assert_eq!(verification.location_name, "Bar Unknown");
    assert!(!verification.computed_found);
}

#[tokio::test]
async fn worker_without_wage_is_matched_not_missing() {
    let harness = setup();
    insert_labor(
        &harness.pool,
        "labor-1",
        json!({
            "hours": 9,
            "wageCost": 60,
            "revenue": 900,
            "workers": [
                {"id": "w-jane", "name": "Jane Doe", "hours": 6, "cost": 60, "teamName": "Keuken"},
                {"id": "w-kees", "name": "Kees", "hours": 3, "teamName": "Bediening"}
            ]
        }),
    );
    let outcome = harness
        .aggregation
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("aggregate");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    harness
        .reconciliation
        .import_rows(&[worker_row("Kees", "Bediening", 3.0), worker_row("Jane Doe", "Keuken", 6.0)])
        .expect("import");

    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");
    assert!(
        report
            .discrepancies
            .iter()
            .all(|d| d.kind != DiscrepancyType::WorkerNotFound),
        "{:?}",
        report.discrepancies
    );
    let kees = report
        .worker_verifications
        .iter()
        .find(|w| w.worker_name == "Kees")
        .expect("kees verification");
    assert!(kees.found);
    assert!(kees.is_match);
    assert!(kees.wage_missing);
    assert_eq!(kees.computed_hours, 3.0);

    let jane = report
        .worker_verifications
        .iter()
        .find(|w| w.worker_name == "Jane Doe")
        .expect("jane verification");
    assert!(!jane.wage_missing);
    assert_eq!(report.summary.worker_match_count, 2);
}

#[tokio::test]
async fn replacing_a_source_file_does_not_double_count() {
    let harness = setup();
    insert_labor(
        &harness.pool,
        "labor-1",
        json!({"hours": 8, "wageCost": 80, "revenue": 800}),
    );
    harness
        .aggregation
        .aggregate(DateRange::single(june_first()), None)
        .await
        .expect("aggregate");

    harness
        .reconciliation
        .replace_source("omzet.xlsx", &[daily_row("", "Bar Bea", "2024-06-01", 700.0)])
        .expect("first import");
    let inserted = harness
        .reconciliation
        .replace_source("omzet.xlsx", &[daily_row("", "Bar Bea", "2024-06-01", 800.0)])
        .expect("corrected import");
    assert_eq!(inserted, 1);

    let stored = harness
        .pool
        .with_connection(|conn| ReferenceRepository::list_rows(conn))
        .expect("list rows");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source_file, "omzet.xlsx");

    let report = harness.reconciliation.reconcile(&june_filter()).expect("reconcile");
    assert_eq!(report.verifications[0].reference_rows, 1);
    assert!(report.verifications[0].is_match);
}

#[test]
fn empty_reference_reports_nothing_to_verify() {
    let harness = setup();
    let report = harness
        .reconciliation
        .reconcile(&DateFilter::default())
        .expect("reconcile");
    assert!(report.verifications.is_empty());
    assert!(report.discrepancies.is_empty());
    assert_eq!(report.summary.match_rate, 100.0);
}
