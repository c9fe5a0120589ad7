use crate::models::place::{Place, WeatherInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitLevel {
    High,
    Medium,
    Low,
}

impl FitLevel {
    pub fn label(&self) -> &'static str {
        match self {
            FitLevel::High => "상",
            FitLevel::Medium => "중",
            FitLevel::Low => "하",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub places: Vec<Place>,
    pub weather: Option<WeatherInfo>,
    /// Place id to a human readable justification.
    pub reasons: HashMap<String, String>,
    pub ai_top_ids: BTreeSet<String>,
    pub top_picks: Vec<Place>,
}

impl RecommendationResult {
    pub fn empty(weather: Option<WeatherInfo>) -> Self {
        Self {
            weather,
            ..Default::default()
        }
    }

    /// True when every id referenced by reasons, AI picks and top picks is in `places`.
    pub fn references_are_consistent(&self) -> bool {
        let ids: HashSet<&str> = self.places.iter().map(|p| p.id.as_str()).collect();
        self.reasons.keys().all(|id| ids.contains(id.as_str()))
            && self.ai_top_ids.iter().all(|id| ids.contains(id.as_str()))
            && self.top_picks.iter().all(|p| ids.contains(p.id.as_str()))
    }
}
