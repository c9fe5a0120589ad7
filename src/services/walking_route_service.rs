//! Walking directions from the TMAP pedestrian API, with a straight-line fallback.
//!
//! ## Setup
//! Set `TMAP_APP_KEY`.
//!
//! Any leg the API cannot serve becomes a two-point segment whose distance is the haversine
//! distance and whose duration assumes 1.4 m/s walking speed.

use crate::models::itinerary::{DaySchedule, TravelInfo};
use crate::models::place::{LatLng, Place};
use crate::models::route::{FullRoute, RouteSegment, TransportMode};
use crate::services::geo::{distance_between, haversine_meters};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{env, error::Error, fmt, sync::Arc, time::Duration};

const TMAP_PEDESTRIAN_URL: &str = "https://apis.openapi.sk.com/tmap/routes/pedestrian?version=1";
const WALKING_SPEED_MPS: f64 = 1.4;
const DEFAULT_LEG_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum DirectionsError {
    HttpError(reqwest::Error),
    ResponseError(String),
}

impl fmt::Display for DirectionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionsError::HttpError(err) => write!(f, "HTTP error: {}", err),
            DirectionsError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl Error for DirectionsError {}

impl From<reqwest::Error> for DirectionsError {
    fn from(err: reqwest::Error) -> Self {
        DirectionsError::HttpError(err)
    }
}

#[async_trait]
pub trait WalkingDirections: Send + Sync {
    async fn walking_segment(&self, from: &Place, to: &Place) -> Result<RouteSegment, DirectionsError>;
}

/// Straight line between two places at walking speed.
pub fn fallback_segment(from: &Place, to: &Place) -> RouteSegment {
    let distance_meters = distance_between(from, to) as u32;
    RouteSegment {
        from_place_id: from.id.clone(),
        to_place_id: to.id.clone(),
        path: vec![from.location(), to.location()],
        distance_meters,
        duration_seconds: (distance_meters as f64 / WALKING_SPEED_MPS) as u32,
        mode: TransportMode::Walk,
        estimated: true,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TmapRequest<'a> {
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    start_name: &'a str,
    end_name: &'a str,
    req_coord_type: &'static str,
    res_coord_type: &'static str,
    search_option: &'static str,
}

#[derive(Debug, Deserialize)]
struct TmapResponse {
    #[serde(default)]
    features: Vec<TmapFeature>,
}

#[derive(Debug, Deserialize)]
struct TmapFeature {
    geometry: Option<TmapGeometry>,
    #[serde(default)]
    properties: TmapProperties,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TmapGeometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmapProperties {
    total_distance: Option<f64>,
    total_time: Option<f64>,
}

fn to_lat_lng(pair: &[f64]) -> Option<LatLng> {
    match pair {
        [lng, lat, ..] => Some(LatLng::new(*lat, *lng)),
        _ => None,
    }
}

fn parse_tmap_route(body: TmapResponse, from: &Place, to: &Place) -> Result<RouteSegment, DirectionsError> {
    let mut path: Vec<LatLng> = Vec::new();
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    let mut push = |point: LatLng| {
        let key = (
            (point.lat * 1_000_000.0).round() as i64,
            (point.lng * 1_000_000.0).round() as i64,
        );
        if seen.insert(key) {
            path.push(point);
        }
    };

    let mut totals: Option<(f64, f64)> = None;
    for feature in &body.features {
        if totals.is_none() {
            if let Some(distance) = feature.properties.total_distance.filter(|d| *d > 0.0) {
                totals = Some((distance, feature.properties.total_time.unwrap_or(0.0)));
            }
        }
        match &feature.geometry {
            Some(TmapGeometry::Point { coordinates }) => {
                if let Some(point) = to_lat_lng(coordinates) {
                    push(point);
                }
            }
            Some(TmapGeometry::LineString { coordinates }) => {
                for pair in coordinates {
                    if let Some(point) = to_lat_lng(pair) {
                        push(point);
                    }
                }
            }
            _ => {}
        }
    }

    if path.len() < 2 {
        return Err(DirectionsError::ResponseError(format!(
            "route has {} distinct points",
            path.len()
        )));
    }

    let (distance, duration) = totals.unwrap_or_else(|| {
        let distance: f64 = path.windows(2).map(|w| haversine_meters(w[0], w[1])).sum();
        (distance, distance / WALKING_SPEED_MPS)
    });

    Ok(RouteSegment {
        from_place_id: from.id.clone(),
        to_place_id: to.id.clone(),
        path,
        distance_meters: distance as u32,
        duration_seconds: duration as u32,
        mode: TransportMode::Walk,
        estimated: false,
    })
}

pub struct TmapPedestrianService {
    http_client: reqwest::Client,
    app_key: String,
}

impl TmapPedestrianService {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let app_key =
            env::var("TMAP_APP_KEY").map_err(|_| "TMAP_APP_KEY environment variable not set")?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            app_key,
        })
    }
}

#[async_trait]
impl WalkingDirections for TmapPedestrianService {
    async fn walking_segment(&self, from: &Place, to: &Place) -> Result<RouteSegment, DirectionsError> {
        let body = TmapRequest {
            start_x: from.lng,
            start_y: from.lat,
            end_x: to.lng,
            end_y: to.lat,
            start_name: &from.name,
            end_name: &to.name,
            req_coord_type: "WGS84GEO",
            res_coord_type: "WGS84GEO",
            search_option: "0",
        };

        let response = self
            .http_client
            .post(TMAP_PEDESTRIAN_URL)
            .header("appKey", &self.app_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectionsError::ResponseError(format!(
                "TMAP returned {}",
                response.status()
            )));
        }

        let parsed = response.json::<TmapResponse>().await?;
        parse_tmap_route(parsed, from, to)
    }
}

pub struct RouteBuilder {
    directions: Option<Arc<dyn WalkingDirections>>,
    leg_delay: Duration,
}

impl RouteBuilder {
    pub fn new(directions: Option<Arc<dyn WalkingDirections>>) -> Self {
        Self {
            directions,
            leg_delay: DEFAULT_LEG_DELAY,
        }
    }

    pub fn with_leg_delay(mut self, leg_delay: Duration) -> Self {
        self.leg_delay = leg_delay;
        self
    }

    pub async fn segment(&self, from: &Place, to: &Place) -> RouteSegment {
        let Some(directions) = &self.directions else {
            return fallback_segment(from, to);
        };
        match directions.walking_segment(from, to).await {
            Ok(segment) => segment,
            Err(e) => {
                log::warn!(
                    "Walking directions {} -> {} failed, using straight line: {}",
                    from.id,
                    to.id,
                    e
                );
                fallback_segment(from, to)
            }
        }
    }

    /// One segment per consecutive pair, requested one after another with a short pause.
    pub async fn full_route(&self, places: Vec<Place>) -> FullRoute {
        let mut segments = Vec::with_capacity(places.len().saturating_sub(1));
        for (index, pair) in places.windows(2).enumerate() {
            if index > 0 && self.directions.is_some() && !self.leg_delay.is_zero() {
                tokio::time::sleep(self.leg_delay).await;
            }
            segments.push(self.segment(&pair[0], &pair[1]).await);
        }
        FullRoute::new(places, segments)
    }
}

/// Fills each visit's travel info with a straight-line walk from the previous visit of the day.
pub fn annotate_travel(days: Vec<DaySchedule>) -> Vec<DaySchedule> {
    days.into_iter()
        .map(|mut day| {
            let mut previous: Option<Place> = None;
            for slot in day.slots.iter_mut() {
                let Some(place) = &slot.place else {
                    continue;
                };
                if let Some(from) = &previous {
                    let leg = fallback_segment(from, place);
                    slot.travel = Some(TravelInfo {
                        distance_km: leg.distance_meters as f64 / 1000.0,
                        duration_min: leg.duration_seconds.div_ceil(60),
                        mode: TransportMode::Walk,
                    });
                }
                previous = Some(place.clone());
            }
            day
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::place::Category;

    fn place(id: &str, lat: f64, lng: f64) -> Place {
        Place {
            id: id.to_string(),
            name: id.to_string(),
            category: Category::Photo,
            lat,
            lng,
            distance_meters: None,
            rating: None,
            address: None,
            score: None,
            popularity_count: None,
            popularity_score: None,
        }
    }

    #[test]
    fn parses_points_and_lines_with_totals_from_first_feature() {
        let body: TmapResponse = serde_json::from_value(serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [127.0, 37.5]},
                 "properties": {"totalDistance": 820, "totalTime": 610}},
                {"type": "Feature", "geometry": {"type": "LineString",
                 "coordinates": [[127.0, 37.5], [127.001, 37.5005], [127.002, 37.501]]},
                 "properties": {"distance": 820}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [127.002, 37.501]},
                 "properties": {}}
            ]
        }))
        .unwrap();

        let segment = parse_tmap_route(body, &place("a", 37.5, 127.0), &place("b", 37.501, 127.002)).unwrap();
        assert_eq!(segment.path.len(), 3);
        assert_eq!(segment.path[0], LatLng::new(37.5, 127.0));
        assert_eq!(segment.distance_meters, 820);
        assert_eq!(segment.duration_seconds, 610);
        assert!(!segment.estimated);
    }

    #[test]
    fn single_point_routes_are_rejected() {
        let body: TmapResponse = serde_json::from_value(serde_json::json!({
            "features": [{"geometry": {"type": "Point", "coordinates": [127.0, 37.5]}, "properties": {}}]
        }))
        .unwrap();
        assert!(parse_tmap_route(body, &place("a", 37.5, 127.0), &place("b", 37.5, 127.0)).is_err());
    }
}
