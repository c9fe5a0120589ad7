use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed vocabulary of place categories used across search, rebalancing and scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Food,
    Cafe,
    Photo,
    Culture,
    Shopping,
    Healing,
    Experience,
    Night,
    Stay,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Food,
        Category::Cafe,
        Category::Photo,
        Category::Culture,
        Category::Shopping,
        Category::Healing,
        Category::Experience,
        Category::Night,
        Category::Stay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "FOOD",
            Category::Cafe => "CAFE",
            Category::Photo => "PHOTO",
            Category::Culture => "CULTURE",
            Category::Shopping => "SHOPPING",
            Category::Healing => "HEALING",
            Category::Experience => "EXPERIENCE",
            Category::Night => "NIGHT",
            Category::Stay => "STAY",
        }
    }

    /// Categories that are mostly enjoyed outdoors.
    pub fn is_outdoor(&self) -> bool {
        matches!(
            self,
            Category::Photo | Category::Healing | Category::Experience
        )
    }

    pub fn is_indoor(&self) -> bool {
        matches!(
            self,
            Category::Cafe | Category::Food | Category::Shopping | Category::Stay | Category::Culture
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub distance_meters: Option<u32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    /// Rerank score. `None` until the rerank stage assigns one.
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub popularity_count: Option<u64>,
    #[serde(default)]
    pub popularity_score: Option<f64>,
}

impl Place {
    pub fn location(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn address_or_empty(&self) -> &str {
        self.address.as_deref().unwrap_or("")
    }

    /// Single ranking value used by every rebalancing sort.
    ///
    /// The distance term is bounded by `distance_bonus_scale / 50`, so with the default scale of 50
    /// it never adds more than one point and cannot flip two adjacent rerank positions.
    pub fn fused_score(&self, distance_bonus_scale: f64) -> f64 {
        let base = self.score.unwrap_or(0) as f64;
        let rating_bonus = self.rating.unwrap_or(0.0) * 0.1;
        let distance_bonus = match self.distance_meters {
            Some(d) => distance_bonus_scale / (d as f64 + 50.0),
            None => 0.0,
        };
        base + rating_bonus + distance_bonus
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub temp_c: f64,
    pub condition: String,
    #[serde(default)]
    pub icon: Option<String>,
}
