use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::aggregate::{labor_cost_percentage, revenue_per_hour};
use crate::models::category::ShareCategory;
use crate::models::period::Granularity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedShare {
    pub granularity: Granularity,
    pub period: String,
    pub location_id: String,
    pub location_name: String,
    pub category: ShareCategory,
    pub team_name: String,
    pub hours: f64,
    pub wage_cost: f64,
    pub allocated_revenue: f64,
}

impl CategorizedShare {
    pub fn revenue_per_hour(&self) -> f64 {
        revenue_per_hour(self.allocated_revenue, self.hours)
    }

    pub fn labor_cost_percentage(&self) -> f64 {
        labor_cost_percentage(self.wage_cost, self.allocated_revenue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerShare {
    pub date: NaiveDate,
    pub location_id: String,
    pub location_name: String,
    pub worker_id: String,
    pub worker_name: String,
    pub team_name: String,
    pub category: ShareCategory,
    pub hours: f64,
    pub wage_cost: f64,
    pub hourly_wage: f64,
    pub allocated_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingWage {
    pub date: NaiveDate,
    pub location_id: String,
    pub worker_id: String,
    pub worker_name: String,
    #[serde(default)]
    pub team_name: String,
    pub hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub shares: Vec<CategorizedShare>,
    pub worker_shares: Vec<WorkerShare>,
    pub missing_wages: Vec<MissingWage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionTotals {
    pub division: String,
    pub hours: f64,
    pub wage_cost: f64,
    pub allocated_revenue: f64,
    pub revenue_per_hour: f64,
    pub labor_cost_percentage: f64,
}

