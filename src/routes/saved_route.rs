use crate::db::Stores;
use crate::models::place::Place;
use crate::models::route::{SavedRoute, SavedRouteSummary};
use crate::routes::error_response;
use crate::services::walking_route_service::RouteBuilder;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct WalkingRouteRequest {
    pub places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
pub struct SaveRouteRequest {
    pub name: String,
    pub places: Vec<Place>,
}

#[derive(Debug, Serialize)]
pub struct SavedRouteDetail {
    pub route: SavedRoute,
    pub summary: SavedRouteSummary,
}

impl From<SavedRoute> for SavedRouteDetail {
    fn from(route: SavedRoute) -> Self {
        let summary = route.summary();
        Self { route, summary }
    }
}

/*
    /api/routes/walking
*/
pub async fn walking(
    builder: web::Data<RouteBuilder>,
    input: web::Json<WalkingRouteRequest>,
) -> impl Responder {
    let places = input.into_inner().places;
    if places.len() < 2 {
        return error_response(
            &mut HttpResponse::BadRequest(),
            "A route needs at least two places",
        );
    }
    HttpResponse::Ok().json(builder.full_route(places).await)
}

/*
    POST /api/routes
*/
pub async fn create(
    builder: web::Data<RouteBuilder>,
    stores: web::Data<Stores>,
    input: web::Json<SaveRouteRequest>,
) -> impl Responder {
    let request = input.into_inner();
    if request.name.trim().is_empty() {
        return error_response(&mut HttpResponse::BadRequest(), "Route name is empty");
    }
    if request.places.len() < 2 {
        return error_response(
            &mut HttpResponse::BadRequest(),
            "A route needs at least two places",
        );
    }

    let full_route = builder.full_route(request.places).await;
    let saved = SavedRoute::new(request.name.trim(), full_route);

    match stores.routes.upsert(saved.clone()).await {
        Ok(()) => HttpResponse::Created().json(SavedRouteDetail::from(saved)),
        Err(e) => {
            log::error!("Failed to save route: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to save route",
            )
        }
    }
}

/*
    GET /api/routes
*/
pub async fn get_all(stores: web::Data<Stores>) -> impl Responder {
    match stores.routes.list().await {
        Ok(routes) => {
            let summaries: Vec<SavedRouteSummary> = routes.iter().map(SavedRoute::summary).collect();
            HttpResponse::Ok().json(summaries)
        }
        Err(e) => {
            log::error!("Failed to list routes: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to retrieve routes",
            )
        }
    }
}

/*
    GET /api/routes/{id}
*/
pub async fn get_by_id(path: web::Path<String>, stores: web::Data<Stores>) -> impl Responder {
    match stores.routes.get(&path.into_inner()).await {
        Ok(Some(route)) => HttpResponse::Ok().json(SavedRouteDetail::from(route)),
        Ok(None) => error_response(&mut HttpResponse::NotFound(), "Route not found"),
        Err(e) => {
            log::error!("Failed to retrieve route: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to retrieve route",
            )
        }
    }
}

/*
    DELETE /api/routes/{id}
*/
pub async fn delete(path: web::Path<String>, stores: web::Data<Stores>) -> impl Responder {
    match stores.routes.delete(&path.into_inner()).await {
        Ok(true) => HttpResponse::NoContent().finish(),
        Ok(false) => error_response(&mut HttpResponse::NotFound(), "Route not found"),
        Err(e) => {
            log::error!("Failed to delete route: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to delete route",
            )
        }
    }
}
