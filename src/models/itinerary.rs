use crate::models::place::Place;
use crate::models::route::TransportMode;
use chrono::{Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `HH:mm` (de)serialization for slot times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid time '{}', expected HH:mm", raw))
        })
    }

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Visit,
    Meal,
    Transport,
}

impl ActivityKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "VISIT" => Some(ActivityKind::Visit),
            "MEAL" => Some(ActivityKind::Meal),
            "TRANSPORT" => Some(ActivityKind::Transport),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelInfo {
    pub distance_km: f64,
    pub duration_min: u32,
    pub mode: TransportMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub place: Option<Place>,
    pub activity: ActivityKind,
    pub duration_min: u32,
    #[serde(default)]
    pub travel: Option<TravelInfo>,
}

impl TimeSlot {
    pub fn new(
        start_time: NaiveTime,
        duration_min: u32,
        place: Option<Place>,
        activity: ActivityKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time,
            end_time: start_time + Duration::minutes(duration_min as i64),
            place,
            activity,
            duration_min,
            travel: None,
        }
    }

    pub fn visit(start_time: NaiveTime, duration_min: u32, place: Place) -> Self {
        Self::new(start_time, duration_min, Some(place), ActivityKind::Visit)
    }

    pub fn meal(start_time: NaiveTime, duration_min: u32) -> Self {
        Self::new(start_time, duration_min, None, ActivityKind::Meal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: u32,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub id: String,
    pub name: String,
    pub days: Vec<DaySchedule>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

impl Itinerary {
    pub fn new(name: impl Into<String>, days: Vec<DaySchedule>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            days,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn place_ids(&self) -> impl Iterator<Item = &str> {
        self.days
            .iter()
            .flat_map(|d| d.slots.iter())
            .filter_map(|s| s.place.as_ref().map(|p| p.id.as_str()))
    }

    pub fn day_mut(&mut self, day: u32) -> Option<&mut DaySchedule> {
        self.days.iter_mut().find(|d| d.day == day)
    }
}
