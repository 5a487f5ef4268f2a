use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::text::normalize_key;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hourly_wage: Option<f64>,
    #[serde(default)]
    pub team_name: Option<String>,
}

/// Snapshot of known locations, indexed by id and by normalized name.
#[derive(Debug, Clone, Default)]
pub struct LocationDirectory {
    by_id: HashMap<String, Location>,
    by_name: HashMap<String, String>,
}

impl LocationDirectory {
    pub fn new(locations: Vec<Location>) -> Self {
        let mut directory = Self::default();
        for location in locations {
            directory
                .by_name
                .insert(normalize_key(&location.name), location.id.clone());
            directory.by_id.insert(location.id.clone(), location);
        }
        directory
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.by_id.get(id)
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(|location| location.name.as_str())
    }

    /// Case and whitespace insensitive name lookup; an id is accepted too.
    pub fn resolve(&self, name_or_id: &str) -> Option<&Location> {
        self.by_name
            .get(&normalize_key(name_or_id))
            .and_then(|id| self.by_id.get(id))
            .or_else(|| self.by_id.get(name_or_id.trim()))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerDirectory {
    by_id: HashMap<String, Worker>,
}

impl WorkerDirectory {
    pub fn new(workers: Vec<Worker>) -> Self {
        Self {
            by_id: workers
                .into_iter()
                .map(|worker| (worker.id.clone(), worker))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Worker> {
        self.by_id.get(id)
    }

    pub fn hourly_wage(&self, id: &str) -> Option<f64> {
        self.by_id
            .get(id)
            .and_then(|worker| worker.hourly_wage)
            .filter(|wage| wage.is_finite() && *wage > 0.0)
    }
}
