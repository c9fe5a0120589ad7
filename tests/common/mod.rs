#![allow(dead_code)]

use actix_web::{web, App};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trip_curator_api::db::Stores;
use trip_curator_api::models::place::{Category, LatLng, Place, WeatherInfo};
use trip_curator_api::models::route::RouteSegment;
use trip_curator_api::routes;
use trip_curator_api::services::completion_service::{CompletionError, CompletionPort};
use trip_curator_api::services::fit_labels::FitRules;
use trip_curator_api::services::geo::haversine_meters;
use trip_curator_api::services::in_flight::InFlight;
use trip_curator_api::services::itinerary_generation_service::{ItineraryConfig, ItineraryPlanner};
use trip_curator_api::services::place_search_service::{Geocoder, PlaceSearch, PlaceSearchError};
use trip_curator_api::services::popularity_service::{PopularityError, PopularityLookup};
use trip_curator_api::services::recommendation_service::{RecommendationConfig, RecommendationService};
use trip_curator_api::services::walking_route_service::{
    DirectionsError, RouteBuilder, WalkingDirections,
};
use trip_curator_api::services::weather_service::{WeatherError, WeatherLookup};
use trip_curator_api::services::Collaborators;

pub const CITY_HALL: LatLng = LatLng {
    lat: 37.5665,
    lng: 126.9780,
};

pub fn place(id: &str, category: Category, lat: f64, lng: f64) -> Place {
    Place {
        id: id.to_string(),
        name: format!("장소 {}", id),
        category,
        lat,
        lng,
        distance_meters: None,
        rating: None,
        address: Some("서울 중구 세종대로 110".to_string()),
        score: None,
        popularity_count: None,
        popularity_score: None,
    }
}

/// `count` places of one category laid out on a line heading east, `step_m` apart.
pub fn places_along(prefix: &str, category: Category, count: usize, step_m: f64) -> Vec<Place> {
    // about 88 m per 0.001 degree of longitude at Seoul's latitude
    let step_deg = step_m / 88_000.0;
    (0..count)
        .map(|i| {
            place(
                &format!("{}{}", prefix, i),
                category,
                CITY_HALL.lat,
                CITY_HALL.lng + step_deg * i as f64,
            )
        })
        .collect()
}

pub struct FakeSearch {
    pub places: Vec<Place>,
    pub calls: AtomicUsize,
    /// Category searches for this category fail.
    pub fail_for: Option<Category>,
}

impl FakeSearch {
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            places,
            calls: AtomicUsize::new(0),
            fail_for: None,
        }
    }

    pub fn failing_for(places: Vec<Place>, category: Category) -> Self {
        Self {
            fail_for: Some(category),
            ..Self::new(places)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceSearch for FakeSearch {
    async fn search_category(
        &self,
        category: Category,
        center: LatLng,
        _radius_meters: u32,
        size: u32,
        max_pages: u32,
    ) -> Result<Vec<Place>, PlaceSearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for == Some(category) {
            return Err(PlaceSearchError::ResponseError("search quota exceeded".to_string()));
        }
        let limit = (size * max_pages.max(1)) as usize;
        Ok(self
            .places
            .iter()
            .filter(|p| p.category == category)
            .take(limit)
            .map(|p| {
                let mut p = p.clone();
                p.distance_meters = Some(haversine_meters(center, p.location()) as u32);
                p
            })
            .collect())
    }

    async fn search_keyword(
        &self,
        query: &str,
        _center: Option<LatLng>,
        _radius_meters: u32,
        size: u32,
    ) -> Result<Vec<Place>, PlaceSearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .places
            .iter()
            .filter(|p| p.name.contains(query))
            .take(size as usize)
            .cloned()
            .collect())
    }
}

pub struct FakeGeocoder {
    pub known: HashMap<String, LatLng>,
}

impl FakeGeocoder {
    pub fn seoul() -> Self {
        let mut known = HashMap::new();
        known.insert("서울".to_string(), CITY_HALL);
        known.insert("서울 중구".to_string(), CITY_HALL);
        Self { known }
    }

    pub fn nowhere() -> Self {
        Self {
            known: HashMap::new(),
        }
    }

    pub fn with(entries: &[(&str, LatLng)]) -> Self {
        Self {
            known: entries
                .iter()
                .map(|(name, at)| (name.to_string(), *at))
                .collect(),
        }
    }
}

/// Every search fails.
pub struct FailingSearch {
    pub calls: AtomicUsize,
}

impl FailingSearch {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PlaceSearch for FailingSearch {
    async fn search_category(
        &self,
        _category: Category,
        _center: LatLng,
        _radius_meters: u32,
        _size: u32,
        _max_pages: u32,
    ) -> Result<Vec<Place>, PlaceSearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PlaceSearchError::ResponseError("service unavailable".to_string()))
    }

    async fn search_keyword(
        &self,
        _query: &str,
        _center: Option<LatLng>,
        _radius_meters: u32,
        _size: u32,
    ) -> Result<Vec<Place>, PlaceSearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PlaceSearchError::ResponseError("service unavailable".to_string()))
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<LatLng>, PlaceSearchError> {
        Ok(self.known.get(query.trim()).copied())
    }
}

pub struct FakePopularity;

#[async_trait]
impl PopularityLookup for FakePopularity {
    async fn hit_count(&self, query: &str) -> Result<u64, PopularityError> {
        Ok(query.chars().count() as u64 * 10)
    }
}

pub struct FailingPopularity;

#[async_trait]
impl PopularityLookup for FailingPopularity {
    async fn hit_count(&self, _query: &str) -> Result<u64, PopularityError> {
        Err(PopularityError::ResponseError("rate limited".to_string()))
    }
}

pub struct FakeWeather(pub WeatherInfo);

#[async_trait]
impl WeatherLookup for FakeWeather {
    async fn current(&self, _at: LatLng) -> Result<WeatherInfo, WeatherError> {
        Ok(self.0.clone())
    }
}

/// Replays scripted answers in order, repeating the last one, and counts calls.
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionPort for ScriptedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(answer) => {
                *last = Some(answer.clone());
                Ok(answer)
            }
            None => last
                .clone()
                .ok_or_else(|| CompletionError::Exhausted("no scripted answer".to_string())),
        }
    }
}

pub struct FailingCompletion;

#[async_trait]
impl CompletionPort for FailingCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::ResponseError("model unavailable".to_string()))
    }
}

pub struct FailingDirections {
    pub calls: AtomicUsize,
}

impl FailingDirections {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WalkingDirections for FailingDirections {
    async fn walking_segment(&self, _from: &Place, _to: &Place) -> Result<RouteSegment, DirectionsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DirectionsError::ResponseError("route not found".to_string()))
    }
}

pub fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("trip-curator-test-{}", uuid::Uuid::new_v4()))
}

pub fn seoul_collaborators(places: Vec<Place>) -> Collaborators {
    Collaborators {
        place_search: Some(Arc::new(FakeSearch::new(places))),
        geocoder: Some(Arc::new(FakeGeocoder::seoul())),
        popularity: Some(Arc::new(FakePopularity)),
        weather: Some(Arc::new(FakeWeather(WeatherInfo {
            temp_c: 18.0,
            condition: "Clear".to_string(),
            icon: None,
        }))),
        completion: None,
        directions: None,
    }
}

pub struct TestApp {
    pub collaborators: Collaborators,
    pub data_dir: PathBuf,
    pub in_flight: InFlight,
}

impl TestApp {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            data_dir: temp_data_dir(),
            in_flight: InFlight::new(),
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let recommendation_service = RecommendationService::new(
            &self.collaborators,
            RecommendationConfig::default(),
            FitRules::default(),
        );
        let planner = ItineraryPlanner::new(
            self.collaborators.completion.clone(),
            self.collaborators.place_search.clone(),
            ItineraryConfig::default(),
        );
        let route_builder = RouteBuilder::new(self.collaborators.directions.clone())
            .with_leg_delay(std::time::Duration::ZERO);

        App::new()
            .app_data(web::Data::new(self.collaborators.clone()))
            .app_data(web::Data::new(recommendation_service))
            .app_data(web::Data::new(planner))
            .app_data(web::Data::new(route_builder))
            .app_data(web::Data::new(Stores::json(self.data_dir.clone())))
            .app_data(web::Data::new(self.in_flight.clone()))
            .app_data(routes::json_config())
            .configure(routes::configure)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
