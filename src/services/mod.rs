pub mod aggregation_service;
pub mod categorizer;
pub mod distributor;
pub mod field_rules;
pub mod freshness;
pub mod location_aggregator;
pub mod merge;
pub mod period_key;
pub mod reconciler;
pub mod reconciliation_service;
pub mod settings_service;
