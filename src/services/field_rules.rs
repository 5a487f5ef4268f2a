//! Extraction rules for raw collaborator payloads.
//!
//! Source platforms spell the same logical field in several ways. Each
//! logical field is declared once below as a prioritized list of source
//! names; the first name present with a non-null value wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::raw::{
    ProductLine, RawEventEnvelope, RawEventKind, RawLaborRecord, RawSalesRecord, SubEntityHours,
};

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub sources: &'static [&'static str],
}

impl FieldRule {
    pub const fn new(field: &'static str, sources: &'static [&'static str]) -> Self {
        Self { field, sources }
    }

    pub fn find<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        self.sources
            .iter()
            .filter_map(|name| payload.get(*name))
            .find(|value| !value.is_null())
    }

    pub fn number(&self, payload: &Value) -> Option<f64> {
        self.find(payload).and_then(parse_number)
    }

    pub fn text(&self, payload: &Value) -> Option<String> {
        match self.find(payload)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn array<'a>(&self, payload: &'a Value) -> &'a [Value] {
        self.find(payload)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub const LOCATION_ID: FieldRule = FieldRule::new(
    "locationId",
    &["locationId", "location_id", "locatieId", "vestigingId", "locationUuid"],
);
pub const LOCATION_NAME: FieldRule = FieldRule::new(
    "locationName",
    &["locationName", "location_name", "locatie", "vestiging", "location"],
);
pub const BUSINESS_DATE: FieldRule = FieldRule::new(
    "date",
    &["date", "businessDate", "business_date", "datum", "day", "startDate", "timestamp"],
);
pub const HOURS: FieldRule = FieldRule::new(
    "hours",
    &["hours", "workedHours", "hoursWorked", "totalHours", "uren", "gewerkteUren"],
);
pub const WAGE_COST: FieldRule = FieldRule::new(
    "wageCost",
    &["wageCost", "wage_cost", "laborCost", "loonkosten", "cost", "costs"],
);
pub const REVENUE: FieldRule = FieldRule::new(
    "revenue",
    &["revenue", "omzet", "totaal", "total", "turnover", "netRevenue"],
);
pub const TRANSACTION_COUNT: FieldRule = FieldRule::new(
    "transactionCount",
    &["transactionCount", "transactions", "aantalTransacties", "ticketCount"],
);
pub const BY_TEAM: FieldRule = FieldRule::new("byTeam", &["byTeam", "teams", "afdelingen"]);
pub const BY_WORKER: FieldRule = FieldRule::new(
    "byWorker",
    &["byWorker", "workers", "employees", "medewerkers"],
);
pub const BY_PRODUCT: FieldRule = FieldRule::new("byProduct", &["byProduct", "products", "items"]);

pub const ENTITY_ID: FieldRule = FieldRule::new(
    "id",
    &["id", "entityId", "teamId", "workerId", "employeeId", "userId"],
);
pub const ENTITY_NAME: FieldRule = FieldRule::new(
    "name",
    &["name", "naam", "teamName", "workerName", "employeeName"],
);
pub const TEAM_NAME: FieldRule = FieldRule::new("teamName", &["teamName", "team", "afdeling"]);

pub const PRODUCT_ID: FieldRule = FieldRule::new("productId", &["productId", "sku", "id"]);
pub const PRODUCT_NAME: FieldRule = FieldRule::new("name", &["name", "productName", "naam"]);
pub const QUANTITY: FieldRule = FieldRule::new("quantity", &["quantity", "qty", "aantal", "count"]);

/// Reads a JSON number or a numeric string with `.` or `,` as decimal
/// separator. When both separators appear, the last one is the decimal.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_numeric_text(s),
        _ => None,
    }
}

fn parse_numeric_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€' && *c != '\'')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Resolves a payload date to a business date. Timestamps with an offset
/// are converted to the calendar date in `tz`.
pub fn parse_business_date(value: &Value, tz: Tz) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&tz).date_naive());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.date());
    }
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn location_of(envelope: &RawEventEnvelope) -> AppResult<(String, Option<String>)> {
    let payload = &envelope.payload;
    let name = LOCATION_NAME.text(payload);
    let id = LOCATION_ID
        .text(payload)
        .or_else(|| envelope.location_id.clone())
        .ok_or_else(|| AppError::invalid_record(&envelope.id, "missing location"))?;
    Ok((id, name))
}

fn date_of(envelope: &RawEventEnvelope, tz: Tz) -> AppResult<NaiveDate> {
    BUSINESS_DATE
        .find(&envelope.payload)
        .and_then(|value| parse_business_date(value, tz))
        .or(envelope.business_date)
        .ok_or_else(|| AppError::invalid_record(&envelope.id, "missing or unreadable date"))
}

fn ensure_kind(envelope: &RawEventEnvelope, expected: RawEventKind) -> AppResult<()> {
    if envelope.kind != expected {
        return Err(AppError::invalid_record(
            &envelope.id,
            format!("expected {} event, got {}", expected.as_str(), envelope.kind.as_str()),
        ));
    }
    Ok(())
}

fn sub_entities(values: &[Value], fallback_prefix: &str) -> Vec<SubEntityHours> {
    values
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.is_object())
        .map(|(index, entry)| {
            let name = ENTITY_NAME.text(entry).unwrap_or_default();
            let entity_id = ENTITY_ID
                .text(entry)
                .or_else(|| (!name.is_empty()).then(|| name.clone()))
                .unwrap_or_else(|| format!("{fallback_prefix}-{index}"));
            SubEntityHours {
                entity_id,
                name,
                hours: HOURS.number(entry).unwrap_or(0.0),
                cost: WAGE_COST.number(entry).unwrap_or(0.0),
                team_name: TEAM_NAME.text(entry),
            }
        })
        .collect()
}

pub fn parse_labor_payload(envelope: &RawEventEnvelope, tz: Tz) -> AppResult<RawLaborRecord> {
    ensure_kind(envelope, RawEventKind::Labor)?;
    let payload = &envelope.payload;
    let (location_id, location_name) = location_of(envelope)?;
    let date = date_of(envelope, tz)?;

    let by_team = sub_entities(BY_TEAM.array(payload), "team");
    let by_worker = sub_entities(BY_WORKER.array(payload), "worker");

    let hours = match HOURS.number(payload) {
        Some(hours) => hours,
        None if !by_team.is_empty() => by_team.iter().map(|team| team.hours).sum(),
        None if !by_worker.is_empty() => by_worker.iter().map(|worker| worker.hours).sum(),
        None => return Err(AppError::invalid_record(&envelope.id, "missing hours")),
    };

    Ok(RawLaborRecord {
        id: envelope.id.clone(),
        location_id,
        location_name,
        date,
        created_at: envelope.created_at,
        hours,
        wage_cost: WAGE_COST.number(payload).unwrap_or(0.0),
        revenue: REVENUE.number(payload).unwrap_or(0.0),
        by_team,
        by_worker,
    })
}

pub fn parse_sales_payload(envelope: &RawEventEnvelope, tz: Tz) -> AppResult<RawSalesRecord> {
    ensure_kind(envelope, RawEventKind::Sales)?;
    let payload = &envelope.payload;
    let (location_id, location_name) = location_of(envelope)?;
    let date = date_of(envelope, tz)?;

    let by_product: Vec<ProductLine> = BY_PRODUCT
        .array(payload)
        .iter()
        .filter_map(|line| {
            let product_id = PRODUCT_ID.text(line)?;
            Some(ProductLine {
                name: PRODUCT_NAME.text(line).unwrap_or_else(|| product_id.clone()),
                product_id,
                quantity: QUANTITY.number(line).unwrap_or(0.0),
                revenue: REVENUE.number(line).unwrap_or(0.0),
            })
        })
        .collect();

    let revenue = match REVENUE.number(payload) {
        Some(revenue) => revenue,
        None if !by_product.is_empty() => by_product.iter().map(|line| line.revenue).sum(),
        None => return Err(AppError::invalid_record(&envelope.id, "missing revenue")),
    };

    Ok(RawSalesRecord {
        id: envelope.id.clone(),
        location_id,
        location_name,
        date,
        created_at: envelope.created_at,
        revenue,
        transaction_count: TRANSACTION_COUNT
            .number(payload)
            .map(|count| count.round() as i64)
            .unwrap_or(0),
        by_product,
    })
}
