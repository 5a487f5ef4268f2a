use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEZONE: &str = "Europe/Amsterdam";
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_CONCURRENT_SUBJECTS: usize = 4;
pub const DEFAULT_WORKER_NAME_SIMILARITY: f64 = 0.92;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ToleranceSettings {
    /// Absolute difference below which any metric matches.
    pub absolute_floor: f64,
    pub revenue_pct: f64,
    pub hours_pct: f64,
    pub productivity_pct: f64,
    pub labor_cost_pct: f64,
}

impl Default for ToleranceSettings {
    fn default() -> Self {
        Self {
            absolute_floor: 1.0,
            revenue_pct: 1.0,
            hours_pct: 1.0,
            productivity_pct: 2.5,
            labor_cost_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeveritySettings {
    pub minor_pct: f64,
    pub major_pct: f64,
}

impl Default for SeveritySettings {
    fn default() -> Self {
        Self {
            minor_pct: 5.0,
            major_pct: 15.0,
        }
    }
}

/// Extra team-name synonyms, keyed by category label
/// (`kitchen`, `service`, `management`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryRuleSettings {
    pub synonyms: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub timezone: String,
    pub batch_size: usize,
    pub max_concurrent_subjects: usize,
    pub tolerances: ToleranceSettings,
    pub severity: SeveritySettings,
    pub worker_name_similarity: f64,
    pub category_rules: CategoryRuleSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_subjects: DEFAULT_MAX_CONCURRENT_SUBJECTS,
            tolerances: ToleranceSettings::default(),
            severity: SeveritySettings::default(),
            worker_name_similarity: DEFAULT_WORKER_NAME_SIMILARITY,
            category_rules: CategoryRuleSettings::default(),
        }
    }
}
