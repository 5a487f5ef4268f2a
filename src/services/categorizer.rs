//! Team and division classification.
//!
//! One rule decides the category of a team name; the labor view reports
//! `Kitchen`/`Service`/`Management`/`Other`, the revenue-division view
//! relabels the same category as `Food`/`Beverage`/`Management`/`Other`.

use serde::{Deserialize, Serialize};

pub use crate::models::category::{Division, TeamCategory};
use crate::models::settings::CategoryRuleSettings;
use crate::utils::text::{collapse_whitespace, normalize_key};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedTeam {
    /// Display name with whitespace collapsed, or `Unknown` for blank input.
    pub name: String,
    /// Case-folded lookup key for the team.
    pub key: String,
    pub category: TeamCategory,
}

const KITCHEN_TERMS: &[&str] = &[
    "kitchen", "keuken", "kok", "koks", "chef", "cook", "cooks", "afwas", "spoel", "dishwash",
    "prep", "bakery", "patisserie",
];
const SERVICE_TERMS: &[&str] = &[
    "service", "bediening", "zaal", "bar", "floor", "runner", "runners", "host", "hostess",
    "waiter", "waiters", "terras", "barista", "front",
];
const MANAGEMENT_TERMS: &[&str] = &[
    "management", "manager", "managers", "leidinggevende", "leiding", "bedrijfsleider",
    "mgmt", "supervisor", "directie", "office", "admin",
];

/// Snapshot of the matching vocabulary. Built once per run and passed
/// explicitly, so classification has no process-wide state.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    terms: Vec<(String, TeamCategory)>,
}

impl CategoryRules {
    pub fn builtin() -> Self {
        let mut terms = Vec::new();
        for (list, category) in [
            (MANAGEMENT_TERMS, TeamCategory::Management),
            (KITCHEN_TERMS, TeamCategory::Kitchen),
            (SERVICE_TERMS, TeamCategory::Service),
        ] {
            terms.extend(list.iter().map(|term| (term.to_string(), category)));
        }
        Self { terms }
    }

    /// Built-in vocabulary extended with configured synonyms. Configured
    /// terms are checked before built-in ones.
    pub fn from_settings(settings: &CategoryRuleSettings) -> Self {
        let mut extra = Vec::new();
        for (label, synonyms) in &settings.synonyms {
            if let Some(category) = TeamCategory::from_label(label) {
                extra.extend(
                    synonyms
                        .iter()
                        .map(|term| normalize_key(term))
                        .filter(|term| !term.is_empty())
                        .map(|term| (term, category)),
                );
            }
        }
        let mut rules = Self::builtin();
        extra.extend(rules.terms.drain(..));
        rules.terms = extra;
        rules
    }

    fn classify(&self, key: &str) -> TeamCategory {
        let words: Vec<&str> = key
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();

        for (term, category) in &self.terms {
            let hit = if term.contains(' ') {
                key.contains(term.as_str())
            } else {
                words.iter().any(|word| word == term)
                    || words.iter().any(|word| word.starts_with(term.as_str()) && term.len() >= 4)
            };
            if hit {
                return *category;
            }
        }
        TeamCategory::Other
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Classifies a free-text team name. Never fails: blank or unknown names
/// fall into `Other`.
pub fn categorize_team(raw_name: &str, rules: &CategoryRules) -> CategorizedTeam {
    let name = collapse_whitespace(raw_name);
    if name.is_empty() {
        return CategorizedTeam {
            name: "Unknown".to_string(),
            key: "unknown".to_string(),
            category: TeamCategory::Other,
        };
    }
    let key = name.to_lowercase();
    let category = rules.classify(&key);
    CategorizedTeam {
        name,
        key,
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_dutch_and_english_synonyms() {
        let rules = CategoryRules::builtin();
        for name in ["Keuken", "kitchen", "KITCHEN TEAM", "  Afwas ", "Koks"] {
            assert_eq!(categorize_team(name, &rules).category, TeamCategory::Kitchen, "{name}");
        }
        for name in ["Bediening", "Bar", "zaal", "Runners"] {
            assert_eq!(categorize_team(name, &rules).category, TeamCategory::Service, "{name}");
        }
        assert_eq!(
            categorize_team("Bedrijfsleider", &rules).category,
            TeamCategory::Management
        );
    }

    #[test]
    fn unknown_and_blank_names_fall_back_to_other() {
        let rules = CategoryRules::builtin();
        let blank = categorize_team("   ", &rules);
        assert_eq!(blank.category, TeamCategory::Other);
        assert_eq!(blank.name, "Unknown");

        let cleaning = categorize_team("Schoonmaak", &rules);
        assert_eq!(cleaning.category, TeamCategory::Other);
        assert_eq!(cleaning.key, "schoonmaak");
    }

    #[test]
    fn kitchen_manager_counts_as_management() {
        let rules = CategoryRules::builtin();
        assert_eq!(
            categorize_team("Keuken manager", &rules).category,
            TeamCategory::Management
        );
    }

    #[test]
    fn configured_synonyms_take_precedence() {
        let mut settings = CategoryRuleSettings::default();
        settings
            .synonyms
            .insert("service".into(), vec!["Schoonmaak".into()]);
        let rules = CategoryRules::from_settings(&settings);
        assert_eq!(
            categorize_team("schoonmaak", &rules).category,
            TeamCategory::Service
        );
    }

    #[test]
    fn division_relabels_without_losing_categories() {
        assert_eq!(TeamCategory::Kitchen.division(), Division::Food);
        assert_eq!(TeamCategory::Service.division(), Division::Beverage);
        assert_eq!(TeamCategory::Management.division(), Division::Management);
        assert_eq!(TeamCategory::Other.division(), Division::Other);
    }
}
