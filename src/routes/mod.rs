pub mod health;
pub mod itinerary;
pub mod recommendation;
pub mod saved_route;

use actix_web::{error::InternalError, web, HttpResponse};
use serde_json::json;

const JSON_BODY_LIMIT: usize = 1 << 20;

/// Key under which a request holds its in-flight guard: the action plus the canonical body.
pub fn in_flight_key(action: &str, body: &impl serde::Serialize) -> String {
    format!("{}:{}", action, serde_json::to_string(body).unwrap_or_default())
}

/// Body used for every user-visible failure.
pub fn error_response(builder: &mut actix_web::HttpResponseBuilder, message: &str) -> HttpResponse {
    builder.json(json!({ "error": message }))
}

/// Rejects malformed bodies with the same `{"error": ..}` shape as the handlers.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            let message = format!("Invalid request body: {}", err);
            let response = HttpResponse::BadRequest().json(json!({ "error": message }));
            InternalError::from_response(err, response).into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                .route(
                    "/recommendations",
                    web::post().to(recommendation::recommend),
                )
                .route(
                    "/recommendations/ai",
                    web::post().to(recommendation::recommend_ai),
                )
                .route("/weather", web::get().to(recommendation::weather))
                .route("/places/search", web::get().to(recommendation::search_places))
                .service(
                    web::scope("/itineraries")
                        .route("/generate", web::post().to(itinerary::generate))
                        .route("/resequence", web::post().to(itinerary::resequence))
                        .route("", web::get().to(itinerary::get_all))
                        .route("/{id}", web::get().to(itinerary::get_by_id))
                        .route("/{id}", web::put().to(itinerary::update))
                        .route("/{id}", web::delete().to(itinerary::delete))
                        .route(
                            "/{id}/days/{day}/slots/{slot_id}",
                            web::patch().to(itinerary::update_slot_duration),
                        ),
                )
                .service(
                    web::scope("/routes")
                        .route("/walking", web::post().to(saved_route::walking))
                        .route("", web::post().to(saved_route::create))
                        .route("", web::get().to(saved_route::get_all))
                        .route("/{id}", web::get().to(saved_route::get_by_id))
                        .route("/{id}", web::delete().to(saved_route::delete)),
                ),
        );
}
