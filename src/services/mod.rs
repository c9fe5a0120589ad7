pub mod candidate_service;
pub mod completion_service;
pub mod fit_labels;
pub mod geo;
pub mod in_flight;
pub mod itinerary_generation_service;
pub mod place_search_service;
pub mod popularity_service;
pub mod rebalance;
pub mod recommendation_service;
pub mod rerank_service;
pub mod walking_route_service;
pub mod weather_service;

use completion_service::{CompletionPort, OpenAiService};
use place_search_service::{Geocoder, KakaoLocalService, PlaceSearch};
use popularity_service::{NaverBlogService, PopularityLookup};
use std::sync::Arc;
use walking_route_service::{TmapPedestrianService, WalkingDirections};
use weather_service::{OpenWeatherService, WeatherLookup};

/// External services the pipeline can use. Every one of them is optional; a missing
/// collaborator switches the dependent stage to its fallback.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub place_search: Option<Arc<dyn PlaceSearch>>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub popularity: Option<Arc<dyn PopularityLookup>>,
    pub weather: Option<Arc<dyn WeatherLookup>>,
    pub completion: Option<Arc<dyn CompletionPort>>,
    pub directions: Option<Arc<dyn WalkingDirections>>,
}

impl Collaborators {
    pub fn from_env() -> Self {
        let mut collaborators = Collaborators::default();

        match KakaoLocalService::new() {
            Ok(kakao) => {
                let kakao = Arc::new(kakao);
                collaborators.place_search = Some(kakao.clone());
                collaborators.geocoder = Some(kakao);
            }
            Err(e) => log::warn!("Place search unavailable: {}", e),
        }

        match NaverBlogService::new() {
            Ok(naver) => collaborators.popularity = Some(Arc::new(naver)),
            Err(e) => log::warn!("Popularity lookup unavailable: {}", e),
        }

        match OpenWeatherService::new() {
            Ok(weather) => collaborators.weather = Some(Arc::new(weather)),
            Err(e) => log::warn!("Weather lookup unavailable: {}", e),
        }

        match OpenAiService::new() {
            Ok(openai) => {
                log::info!("Language model configured ({})", openai.model());
                collaborators.completion = Some(Arc::new(openai));
            }
            Err(e) => log::warn!("Language model unavailable: {}", e),
        }

        match TmapPedestrianService::new() {
            Ok(tmap) => collaborators.directions = Some(Arc::new(tmap)),
            Err(e) => log::warn!("Walking directions unavailable, straight lines will be used: {}", e),
        }

        collaborators
    }
}
