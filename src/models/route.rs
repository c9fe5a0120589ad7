use crate::models::place::{LatLng, Place};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    #[default]
    Walk,
    Car,
    Public,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub from_place_id: String,
    pub to_place_id: String,
    pub path: Vec<LatLng>,
    pub distance_meters: u32,
    pub duration_seconds: u32,
    #[serde(default)]
    pub mode: TransportMode,
    /// Straight-line estimate produced when directions were unavailable.
    #[serde(default)]
    pub estimated: bool,
}

/// Ordered places plus the walking legs between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullRoute {
    pub places: Vec<Place>,
    pub segments: Vec<RouteSegment>,
    pub total_distance_meters: u32,
    pub total_duration_seconds: u32,
}

impl FullRoute {
    pub fn new(places: Vec<Place>, segments: Vec<RouteSegment>) -> Self {
        let total_distance_meters = segments.iter().map(|s| s.distance_meters).sum();
        let total_duration_seconds = segments.iter().map(|s| s.duration_seconds).sum();
        Self {
            places,
            segments,
            total_distance_meters,
            total_duration_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRoute {
    pub id: String,
    pub name: String,
    pub places: Vec<Place>,
    pub segments: Vec<RouteSegment>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

impl SavedRoute {
    pub fn new(name: impl Into<String>, route: FullRoute) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            places: route.places,
            segments: route.segments,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn total_distance_meters(&self) -> u32 {
        self.segments.iter().map(|s| s.distance_meters).sum()
    }

    pub fn total_duration_seconds(&self) -> u32 {
        self.segments.iter().map(|s| s.duration_seconds).sum()
    }

    pub fn summary(&self) -> SavedRouteSummary {
        SavedRouteSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            place_count: self.places.len(),
            total_distance_meters: self.total_distance_meters(),
            total_duration_seconds: self.total_duration_seconds(),
            distance_label: format_distance(self.total_distance_meters()),
            duration_label: format_duration(self.total_duration_seconds()),
            created_at: self.created_at,
        }
    }
}

/// Saved route with its derived totals, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SavedRouteSummary {
    pub id: String,
    pub name: String,
    pub place_count: usize,
    pub total_distance_meters: u32,
    pub total_duration_seconds: u32,
    pub distance_label: String,
    pub duration_label: String,
    pub created_at: i64,
}

pub fn format_distance(meters: u32) -> String {
    if meters >= 1000 {
        format!("{:.1} km", meters as f64 / 1000.0)
    } else {
        format!("{} m", meters)
    }
}

pub fn format_duration(seconds: u32) -> String {
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}시간 {}분", hours, minutes % 60)
    } else {
        format!("{}분", minutes)
    }
}
