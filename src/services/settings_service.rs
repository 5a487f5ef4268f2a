use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono_tz::Tz;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::settings::EngineSettings;

pub struct SettingsService {
    source: Option<PathBuf>,
    cache: RwLock<EngineSettings>,
}

impl SettingsService {
    /// Validated defaults, no backing file.
    pub fn new() -> Self {
        Self {
            source: None,
            cache: RwLock::new(EngineSettings::default()),
        }
    }

    pub fn with_settings(settings: EngineSettings) -> AppResult<Self> {
        validate(&settings)?;
        Ok(Self {
            source: None,
            cache: RwLock::new(settings),
        })
    }

    /// Loads settings from a YAML file. A missing file yields defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = load_file(&path)?;
        Ok(Self {
            source: Some(path),
            cache: RwLock::new(settings),
        })
    }

    /// File-backed settings when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::new()),
        }
    }

    pub fn current(&self) -> EngineSettings {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-reads the backing file, keeping the previous settings on failure.
    pub fn reload(&self) -> AppResult<EngineSettings> {
        let Some(path) = self.source.as_ref() else {
            return Ok(self.current());
        };
        let settings = load_file(path)?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = settings.clone();
        }
        Ok(settings)
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        parse_timezone(&self.current().timezone)
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>().map_err(|err| {
        AppError::validation_with_details(
            "unknown timezone",
            json!({"timezone": name, "error": err.to_string()}),
        )
    })
}

fn load_file(path: &Path) -> AppResult<EngineSettings> {
    if !path.exists() {
        warn!(target: "app::settings", path = %path.display(), "settings file missing, using defaults");
        return Ok(EngineSettings::default());
    }

    let raw = std::fs::read_to_string(path)?;
    let settings: EngineSettings = if raw.trim().is_empty() {
        EngineSettings::default()
    } else {
        serde_yaml::from_str(&raw)?
    };
    validate(&settings)?;
    info!(
        target: "app::settings",
        path = %path.display(),
        timezone = %settings.timezone,
        batch_size = settings.batch_size,
        "engine settings loaded"
    );
    Ok(settings)
}

pub fn validate(settings: &EngineSettings) -> AppResult<()> {
    parse_timezone(&settings.timezone)?;

    if settings.batch_size == 0 {
        return Err(AppError::validation("batchSize must be positive"));
    }
    if settings.max_concurrent_subjects == 0 {
        return Err(AppError::validation("maxConcurrentSubjects must be positive"));
    }

    let tolerances = &settings.tolerances;
    let values = [
        ("absoluteFloor", tolerances.absolute_floor),
        ("revenuePct", tolerances.revenue_pct),
        ("hoursPct", tolerances.hours_pct),
        ("productivityPct", tolerances.productivity_pct),
        ("laborCostPct", tolerances.labor_cost_pct),
    ];
    for (name, value) in values {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::validation_with_details(
                "tolerance must be a non-negative number",
                json!({"field": name, "value": value}),
            ));
        }
    }

    if settings.severity.minor_pct >= settings.severity.major_pct {
        return Err(AppError::validation(
            "severity.minorPct must be below severity.majorPct",
        ));
    }

    let similarity = settings.worker_name_similarity;
    if !(similarity > 0.0 && similarity <= 1.0) {
        return Err(AppError::validation(
            "workerNameSimilarity must lie in (0, 1]",
        ));
    }

    for label in settings.category_rules.synonyms.keys() {
        if !matches!(label.as_str(), "kitchen" | "service" | "management") {
            return Err(AppError::validation_with_details(
                "unknown category in categoryRules",
                json!({"category": label}),
            ));
        }
    }

    Ok(())
}
