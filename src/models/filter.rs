use crate::models::place::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripDuration {
    HalfDay,
    #[default]
    Day,
    OneNight,
    TwoNights,
}

impl TripDuration {
    pub fn days(&self) -> u32 {
        match self {
            TripDuration::HalfDay | TripDuration::Day => 1,
            TripDuration::OneNight => 2,
            TripDuration::TwoNights => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Companion {
    #[default]
    Solo,
    Friends,
    Couple,
    Family,
}

impl Companion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Companion::Solo => "SOLO",
            Companion::Friends => "FRIENDS",
            Companion::Couple => "COUPLE",
            Companion::Family => "FAMILY",
        }
    }
}

const DEFAULT_BUDGET_PER_PERSON: u32 = 30_000;

fn default_budget() -> u32 {
    DEFAULT_BUDGET_PER_PERSON
}

fn default_party_size() -> u32 {
    1
}

/// What the user asked for. Every field has a default so partial request bodies are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub sub_regions: Vec<String>,
    #[serde(default)]
    pub categories: BTreeSet<Category>,
    #[serde(default)]
    pub duration: TripDuration,
    #[serde(default = "default_budget")]
    pub budget_per_person: u32,
    #[serde(default)]
    pub companion: Companion,
    #[serde(default)]
    pub extra_note: String,
    #[serde(default = "default_party_size")]
    pub number_of_people: u32,
    #[serde(default)]
    pub mandatory_place: Option<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            region: String::new(),
            sub_regions: Vec::new(),
            categories: BTreeSet::new(),
            duration: TripDuration::default(),
            budget_per_person: DEFAULT_BUDGET_PER_PERSON,
            companion: Companion::default(),
            extra_note: String::new(),
            number_of_people: 1,
            mandatory_place: None,
        }
    }
}

impl FilterState {
    /// Requested categories, substituting FOOD when nothing was selected.
    pub fn effective_categories(&self) -> BTreeSet<Category> {
        if self.categories.is_empty() {
            BTreeSet::from([Category::Food])
        } else {
            self.categories.clone()
        }
    }

    /// Region text used for searching: the city alone, or one "city sub-region" token per
    /// explicit sub-region joined with commas.
    pub fn search_region(&self, default_region: &str) -> String {
        let city = match self.region.trim() {
            "" => default_region.trim(),
            region => region,
        };

        let subs: Vec<&str> = self
            .sub_regions
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        if subs.is_empty() {
            return city.to_string();
        }

        subs.iter()
            .map(|sub| {
                if sub.starts_with(city) {
                    sub.to_string()
                } else {
                    format!("{} {}", city, sub)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn mandatory_place_name(&self) -> Option<&str> {
        self.mandatory_place
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
