use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RawEventKind {
    Labor,
    Sales,
}

impl RawEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawEventKind::Labor => "labor",
            RawEventKind::Sales => "sales",
        }
    }
}

/// One team or worker line inside a labor snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubEntityHours {
    pub entity_id: String,
    pub name: String,
    pub hours: f64,
    #[serde(default)]
    pub cost: f64,
    /// Team the worker booked hours on; unset for team lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawLaborRecord {
    pub id: String,
    pub location_id: String,
    #[serde(default)]
    pub location_name: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub hours: f64,
    #[serde(default)]
    pub wage_cost: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub by_team: Vec<SubEntityHours>,
    #[serde(default)]
    pub by_worker: Vec<SubEntityHours>,
}

impl RawLaborRecord {
    pub fn team_cost_total(&self) -> f64 {
        self.by_team.iter().map(|team| team.cost).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawSalesRecord {
    pub id: String,
    pub location_id: String,
    #[serde(default)]
    pub location_name: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub revenue: f64,
    #[serde(default)]
    pub transaction_count: i64,
    #[serde(default)]
    pub by_product: Vec<ProductLine>,
}

/// Verbatim payload as written by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEventEnvelope {
    pub id: String,
    pub kind: RawEventKind,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub business_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}
