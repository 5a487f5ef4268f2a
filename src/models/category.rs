use serde::{Deserialize, Serialize};

/// Labor-side classification of a team.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TeamCategory {
    Kitchen,
    Service,
    Management,
    Other,
}

impl TeamCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamCategory::Kitchen => "Kitchen",
            TeamCategory::Service => "Service",
            TeamCategory::Management => "Management",
            TeamCategory::Other => "Other",
        }
    }

    pub fn division(&self) -> Division {
        match self {
            TeamCategory::Kitchen => Division::Food,
            TeamCategory::Service => Division::Beverage,
            TeamCategory::Management => Division::Management,
            TeamCategory::Other => Division::Other,
        }
    }

    pub(crate) fn from_label(label: &str) -> Option<Self> {
        match label {
            "kitchen" => Some(TeamCategory::Kitchen),
            "service" => Some(TeamCategory::Service),
            "management" => Some(TeamCategory::Management),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Division {
    Food,
    Beverage,
    Management,
    Other,
}

impl Division {
    pub fn as_str(&self) -> &'static str {
        match self {
            Division::Food => "Food",
            Division::Beverage => "Beverage",
            Division::Management => "Management",
            Division::Other => "Other",
        }
    }
}

pub const ALL_LABEL: &str = "All";

/// Team label for hours a labor breakdown does not cover.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShareCategory {
    Kitchen,
    Service,
    Management,
    Other,
    /// No usable breakdown: the share carries the whole location.
    All,
}

impl ShareCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareCategory::Kitchen => "Kitchen",
            ShareCategory::Service => "Service",
            ShareCategory::Management => "Management",
            ShareCategory::Other => "Other",
            ShareCategory::All => ALL_LABEL,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Kitchen" => Some(ShareCategory::Kitchen),
            "Service" => Some(ShareCategory::Service),
            "Management" => Some(ShareCategory::Management),
            "Other" => Some(ShareCategory::Other),
            ALL_LABEL => Some(ShareCategory::All),
            _ => None,
        }
    }

    /// Revenue-division label for the same classification.
    pub fn division_label(&self) -> &'static str {
        match self.team_category() {
            Some(category) => category.division().as_str(),
            None => ALL_LABEL,
        }
    }

    pub fn team_category(&self) -> Option<TeamCategory> {
        match self {
            ShareCategory::Kitchen => Some(TeamCategory::Kitchen),
            ShareCategory::Service => Some(TeamCategory::Service),
            ShareCategory::Management => Some(TeamCategory::Management),
            ShareCategory::Other => Some(TeamCategory::Other),
            ShareCategory::All => None,
        }
    }
}

impl From<TeamCategory> for ShareCategory {
    fn from(category: TeamCategory) -> Self {
        match category {
            TeamCategory::Kitchen => ShareCategory::Kitchen,
            TeamCategory::Service => ShareCategory::Service,
            TeamCategory::Management => ShareCategory::Management,
            TeamCategory::Other => ShareCategory::Other,
        }
    }
}
