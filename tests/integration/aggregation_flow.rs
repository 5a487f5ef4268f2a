use chrono::{NaiveDate, TimeZone, Utc};
use opsledger_lib::db::repositories::aggregate_repository::AggregateRepository;
use opsledger_lib::db::repositories::directory_repository::DirectoryRepository;
use opsledger_lib::db::repositories::raw_event_repository::RawEventRepository;
use opsledger_lib::db::repositories::share_repository::ShareRepository;
use opsledger_lib::db::DbPool;
use opsledger_lib::models::aggregate::{HierarchicalAggregate, SubjectKey, SubjectKind};
use opsledger_lib::models::category::ShareCategory;
use opsledger_lib::models::directory::{Location, Worker};
use opsledger_lib::models::period::{DateRange, Granularity};
use opsledger_lib::models::raw::{RawEventEnvelope, RawEventKind};
use opsledger_lib::models::settings::EngineSettings;
use opsledger_lib::services::aggregation_service::AggregationService;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
}

fn setup() -> (DbPool, AggregationService, TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("ledger.sqlite")).expect("db pool");

    pool.with_connection(|conn| {
        DirectoryRepository::upsert_location(
            conn,
            &Location {
                id: "bar-bea".into(),
                name: "Bar Bea".into(),
            },
        )?;
        DirectoryRepository::upsert_location(
            conn,
            &Location {
                id: "cafe-centraal".into(),
                name: "Cafe Centraal".into(),
            },
        )?;
        DirectoryRepository::upsert_worker(
            conn,
            &Worker {
                id: "w-jane".into(),
                name: "Jane Doe".into(),
                hourly_wage: Some(15.0),
                team_name: Some("Keuken".into()),
            },
        )?;
        DirectoryRepository::upsert_worker(
            conn,
            &Worker {
                id: "w-piet".into(),
                name: "Piet Bakker".into(),
                hourly_wage: None,
                team_name: Some("Keuken".into()),
            },
        )?;
        Ok(())
    })
    .expect("seed directory");

    let service = AggregationService::new(pool.clone(), EngineSettings::default()).expect("service");
    (pool, service, dir)
}

fn insert_event(pool: &DbPool, id: &str, kind: RawEventKind, created_hour: u32, payload: Value) {
    let envelope = RawEventEnvelope {
        id: id.into(),
        kind,
        location_id: payload
            .get("locationId")
            .and_then(Value::as_str)
            .map(str::to_string),
        business_date: payload
            .get("date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()),
        created_at: Utc
            .with_ymd_and_hms(2024, 6, 30, created_hour, 0, 0)
            .single()
            .expect("timestamp"),
        payload,
    };
    pool.with_connection(|conn| RawEventRepository::insert(conn, &envelope))
        .expect("insert raw event");
}

fn load(pool: &DbPool, subject: SubjectKey) -> HierarchicalAggregate {
    pool.with_connection(|conn| AggregateRepository::get(conn, &subject))
        .expect("load aggregate")
        .expect("aggregate exists")
}

fn day_totals(aggregate: &HierarchicalAggregate, period: &str) -> (f64, f64, f64) {
    let entry = aggregate
        .find(Granularity::Day, period)
        .unwrap_or_else(|| panic!("missing day {period}"));
    (entry.totals.quantity, entry.totals.cost, entry.totals.revenue)
}

#[tokio::test]
async fn freshest_snapshot_wins_and_reruns_do_not_double_count() {
    let (pool, service, _dir) = setup();

    insert_event(
        &pool,
        "labor-0900",
        RawEventKind::Labor,
        9,
        json!({"locationId": "bar-bea", "date": "2024-06-01", "hours": 8, "wageCost": 80}),
    );
    insert_event(
        &pool,
        "labor-1400",
        RawEventKind::Labor,
        14,
        json!({"locationId": "bar-bea", "date": "2024-06-01", "hours": 9, "wageCost": 90}),
    );
    insert_event(
        &pool,
        "sales-1",
        RawEventKind::Sales,
        15,
        json!({
            "locationId": "bar-bea",
            "date": "2024-06-01",
            "omzet": "900,00",
            "transactions": 42,
            "products": [
                {"productId": "p-bier", "name": "Bier", "quantity": 40, "revenue": 200}
            ]
        }),
    );

    let range = DateRange::single(day(6, 1));
    let first = service.aggregate(range, None).await.expect("first run");
    assert!(first.errors.is_empty(), "unexpected errors: {:?}", first.errors);
    assert_eq!(first.updated, 2);

    let location = load(&pool, SubjectKey::location("bar-bea"));
    assert_eq!(day_totals(&location, "2024-06-01"), (9.0, 90.0, 900.0));
    assert_eq!(location.by_day[0].totals.count, 42);
    assert_eq!(location.last_run_id.as_deref(), Some(first.run_id.as_str()));
    assert_eq!(
        location
            .find(Granularity::Month, "2024-06")
            .expect("month entry")
            .totals
            .quantity,
        9.0
    );
    assert!(location.find(Granularity::Week, "2024-W22").is_some());

    let products = pool
        .with_connection(|conn| AggregateRepository::list_subjects(conn, SubjectKind::Product))
        .expect("list products");
    assert_eq!(products, vec![SubjectKey::product("p-bier")]);

    let product = load(&pool, SubjectKey::product("p-bier"));
    assert_eq!(product.subject_name, "Bier");
    assert_eq!(day_totals(&product, "2024-06-01"), (40.0, 0.0, 200.0));

    let second = service.aggregate(range, None).await.expect("second run");
    assert_ne!(first.run_id, second.run_id);
    let rerun = load(&pool, SubjectKey::location("bar-bea"));
    assert_eq!(rerun.by_day, location.by_day);
    assert_eq!(rerun.by_week, location.by_week);
    assert_eq!(rerun.by_month, location.by_month);
    assert_eq!(rerun.by_year, location.by_year);
    assert_eq!(rerun.last_run_id.as_deref(), Some(second.run_id.as_str()));

    let progress = service.progress();
    assert_eq!(progress.processed, 3);
    assert_eq!(progress.percentage, 100.0);
}

#[tokio::test]
async fn disjoint_windows_accumulate_without_dropping_keys() {
    let (pool, service, _dir) = setup();

    insert_event(
        &pool,
        "labor-a",
        RawEventKind::Labor,
        10,
        json!({"locationId": "bar-bea", "date": "2024-06-01", "hours": 9, "wageCost": 90, "revenue": 900}),
    );
    insert_event(
        &pool,
        "labor-b",
        RawEventKind::Labor,
        10,
        json!({"locationId": "bar-bea", "date": "2024-06-10", "hours": 7, "wageCost": 70, "revenue": 650}),
    );

    service
        .aggregate(DateRange::single(day(6, 1)), None)
        .await
        .expect("first window");
    service
        .aggregate(DateRange::single(day(6, 10)), None)
        .await
        .expect("second window");

    let location = load(&pool, SubjectKey::location("bar-bea"));
    assert_eq!(day_totals(&location, "2024-06-01"), (9.0, 90.0, 900.0));
    assert_eq!(day_totals(&location, "2024-06-10"), (7.0, 70.0, 650.0));

    let month = location.find(Granularity::Month, "2024-06").expect("month");
    assert_eq!(month.totals.quantity, 16.0);
    assert_eq!(month.totals.revenue, 1550.0);
    assert!(location.find(Granularity::Week, "2024-W22").is_some());
    assert!(location.find(Granularity::Week, "2024-W24").is_some());
    assert_eq!(
        location.find(Granularity::Year, "2024").expect("year").totals.cost,
        160.0
    );
    assert!(location.invariant_violations().is_empty());
}

#[tokio::test]
async fn location_filter_limits_the_run() {
    let (pool, service, _dir) = setup();

    insert_event(
        &pool,
        "labor-bea",
        RawEventKind::Labor,
        10,
        json!({"locationId": "bar-bea", "date": "2024-06-01", "hours": 9, "wageCost": 90}),
    );
    insert_event(
        &pool,
        "labor-centraal",
        RawEventKind::Labor,
        10,
        json!({"locationId": "cafe-centraal", "date": "2024-06-01", "hours": 5, "wageCost": 60}),
    );

    let outcome = service
        .aggregate(DateRange::single(day(6, 1)), Some(vec!["cafe-centraal".into()]))
        .await
        .expect("filtered run");
    assert_eq!(outcome.updated, 1);

    let missing = pool
        .with_connection(|conn| AggregateRepository::get(conn, &SubjectKey::location("bar-bea")))
        .expect("lookup");
    assert!(missing.is_none());
    let centraal = load(&pool, SubjectKey::location("cafe-centraal"));
    assert_eq!(day_totals(&centraal, "2024-06-01"), (5.0, 60.0, 0.0));
}

#[tokio::test]
async fn worker_shares_conserve_revenue_and_exclude_missing_wages() {
    let (pool, service, _dir) = setup();

    insert_event(
        &pool,
        "labor-workers",
        RawEventKind::Labor,
        12,
        json!({
            "locationId": "bar-bea",
            "date": "2024-06-01",
            "hours": 12,
            "wageCost": 168,
            "workers": [
                {"id": "w-jane", "name": "Jane Doe", "hours": 6, "teamName": "Keuken"},
                {"id": "w-piet", "name": "Piet Bakker", "hours": 2, "teamName": "Keuken"},
                {"id": "w-kees", "name": "Kees", "hours": 4, "cost": 78, "teamName": "Bediening"}
            ]
        }),
    );
    insert_event(
        &pool,
        "sales-workers",
        RawEventKind::Sales,
        13,
        json!({"locationId": "bar-bea", "date": "2024-06-01", "revenue": 1000}),
    );

    let range = DateRange::single(day(6, 1));
    for _ in 0..2 {
        let outcome = service.aggregate(range, None).await.expect("run");
        assert!(outcome.errors.is_empty());
    }

    let (shares, worker_shares, missing) = pool
        .with_connection(|conn| {
            Ok((
                ShareRepository::shares_between(conn, &range)?,
                ShareRepository::worker_shares_between(conn, &range)?,
                ShareRepository::missing_wages_between(conn, &range)?,
            ))
        })
        .expect("load shares");

    let allocated: f64 = shares.iter().map(|share| share.allocated_revenue).sum();
    assert!((allocated - 1000.0).abs() < 0.01);
    let hours: f64 = shares.iter().map(|share| share.hours).sum();
    assert_eq!(hours, 10.0);
    assert!(shares.iter().any(|share| share.category == ShareCategory::Kitchen));
    assert!(shares.iter().any(|share| share.category == ShareCategory::Service));

    assert_eq!(worker_shares.len(), 2);
    let jane = worker_shares
        .iter()
        .find(|share| share.worker_id == "w-jane")
        .expect("jane share");
    assert_eq!(jane.wage_cost, 90.0);
    assert_eq!(jane.hourly_wage, 15.0);
    assert_eq!(jane.allocated_revenue, 600.0);

    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].worker_id, "w-piet");
    assert_eq!(missing[0].hours, 2.0);
    assert_eq!(missing[0].team_name, "Keuken");
}
