use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use trip_curator_api::db::Stores;
use trip_curator_api::routes;
use trip_curator_api::services::fit_labels::FitRules;
use trip_curator_api::services::in_flight::InFlight;
use trip_curator_api::services::itinerary_generation_service::{ItineraryConfig, ItineraryPlanner};
use trip_curator_api::services::recommendation_service::{RecommendationConfig, RecommendationService};
use trip_curator_api::services::walking_route_service::RouteBuilder;
use trip_curator_api::services::Collaborators;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const FALLBACK_DATA_DIR: &str = "./data";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));
    log::info!("Application starting...");

    let host = std::env::var("HOST").unwrap_or_else(|_| HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| PORT.to_string())
        .parse()
        .unwrap_or(PORT);

    let collaborators = Collaborators::from_env();
    let recommendation_service = web::Data::new(RecommendationService::new(
        &collaborators,
        RecommendationConfig::from_env(),
        FitRules::from_env(),
    ));
    let planner = web::Data::new(ItineraryPlanner::new(
        collaborators.completion.clone(),
        collaborators.place_search.clone(),
        ItineraryConfig::from_env(),
    ));
    let route_builder = web::Data::new(RouteBuilder::new(collaborators.directions.clone()));

    let stores = match Stores::from_env().await {
        Ok(stores) => stores,
        Err(e) => {
            log::error!(
                "Failed to open configured storage, falling back to {}: {}",
                FALLBACK_DATA_DIR,
                e
            );
            Stores::json(FALLBACK_DATA_DIR)
        }
    };
    let stores = web::Data::new(stores);
    let in_flight = web::Data::new(InFlight::new());
    let collaborators = web::Data::new(collaborators);

    log::info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .app_data(collaborators.clone())
            .app_data(recommendation_service.clone())
            .app_data(planner.clone())
            .app_data(route_builder.clone())
            .app_data(stores.clone())
            .app_data(in_flight.clone())
            .app_data(routes::json_config())
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
