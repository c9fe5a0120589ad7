use crate::models::filter::FilterState;
use crate::models::place::LatLng;
use crate::routes::{error_response, in_flight_key};
use crate::services::in_flight::InFlight;
use crate::services::recommendation_service::RecommendationService;
use crate::services::Collaborators;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

const DEFAULT_KEYWORD_RADIUS: u32 = 5000;
const DEFAULT_KEYWORD_SIZE: u32 = 15;

/*
    /api/recommendations
*/
pub async fn recommend(
    service: web::Data<RecommendationService>,
    in_flight: web::Data<InFlight>,
    input: web::Json<FilterState>,
) -> impl Responder {
    let filter = input.into_inner();
    let Some(_guard) = in_flight.try_acquire(in_flight_key("recommend", &filter)) else {
        return error_response(
            &mut HttpResponse::Conflict(),
            "The same recommendation is already being prepared",
        );
    };

    let result = service.recommend(&filter).await;
    if result.places.is_empty() {
        log::info!("Recommendation returned nothing for region '{}'", filter.region);
    }
    HttpResponse::Ok().json(result)
}

#[derive(Debug, Deserialize, serde::Serialize)]
pub struct AiRecommendationRequest {
    #[serde(default)]
    pub filter: FilterState,
    #[serde(default)]
    pub center: Option<LatLng>,
}

/*
    /api/recommendations/ai
*/
pub async fn recommend_ai(
    service: web::Data<RecommendationService>,
    in_flight: web::Data<InFlight>,
    input: web::Json<AiRecommendationRequest>,
) -> impl Responder {
    let request = input.into_inner();
    let Some(_guard) = in_flight.try_acquire(in_flight_key("recommend_ai", &request)) else {
        return error_response(
            &mut HttpResponse::Conflict(),
            "The same recommendation is already being prepared",
        );
    };

    let result = service.recommend_with_ai(&request.filter, request.center).await;
    HttpResponse::Ok().json(result)
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/*
    /api/weather?region=.. or /api/weather?lat=..&lng=..
*/
pub async fn weather(
    service: web::Data<RecommendationService>,
    query: web::Query<WeatherQuery>,
) -> impl Responder {
    let query = query.into_inner();
    let weather = match (query.lat, query.lng, query.region.as_deref()) {
        (Some(lat), Some(lng), _) => service.weather_at(LatLng::new(lat, lng)).await,
        (_, _, Some(region)) if !region.trim().is_empty() => {
            service.weather_for_region(region.trim()).await
        }
        _ => {
            return error_response(
                &mut HttpResponse::BadRequest(),
                "Provide a region or both lat and lng",
            )
        }
    };

    match weather {
        Some(weather) => HttpResponse::Ok().json(weather),
        None => error_response(&mut HttpResponse::NotFound(), "Weather is not available for that location"),
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceSearchQuery {
    pub query: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<u32>,
    pub size: Option<u32>,
}

/*
    /api/places/search?query=..
*/
pub async fn search_places(
    collaborators: web::Data<Collaborators>,
    query: web::Query<PlaceSearchQuery>,
) -> impl Responder {
    let query = query.into_inner();
    if query.query.trim().is_empty() {
        return error_response(&mut HttpResponse::BadRequest(), "Search query is empty");
    }
    let Some(search) = &collaborators.place_search else {
        return error_response(
            &mut HttpResponse::ServiceUnavailable(),
            "Place search is not configured",
        );
    };

    let center = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
        _ => None,
    };
    match search
        .search_keyword(
            query.query.trim(),
            center,
            query.radius.unwrap_or(DEFAULT_KEYWORD_RADIUS),
            query.size.unwrap_or(DEFAULT_KEYWORD_SIZE).clamp(1, 15),
        )
        .await
    {
        Ok(places) => HttpResponse::Ok().json(places),
        Err(e) => {
            log::warn!("Keyword search for '{}' failed: {}", query.query, e);
            HttpResponse::Ok().json(Vec::<crate::models::place::Place>::new())
        }
    }
}
