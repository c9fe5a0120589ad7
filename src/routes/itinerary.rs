use crate::db::Stores;
use crate::models::filter::FilterState;
use crate::models::itinerary::{hhmm, DaySchedule, Itinerary};
use crate::models::place::Place;
use crate::routes::{error_response, in_flight_key};
use crate::services::in_flight::InFlight;
use crate::services::itinerary_generation_service::{
    fits_before_midnight, resequence_day, with_slot_duration, ItineraryPlanner, PlanOptions,
    PlanSource, SlotEditError,
};
use crate::services::walking_route_service::annotate_travel;
use actix_web::{web, HttpResponse, Responder};
use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};

const DEFAULT_ITINERARY_NAME: &str = "나의 여행 일정";

fn parse_optional_time(raw: Option<&str>) -> Result<Option<NaiveTime>, ()> {
    match raw {
        Some(raw) => hhmm::parse(raw).map(Some).ok_or(()),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub filter: FilterState,
    #[serde(default)]
    pub auto_add_meals: Option<bool>,
    /// `HH:mm`, earliest start of day 1. Defaults to the current time.
    #[serde(default)]
    pub start_time: Option<String>,
    /// `HH:mm`, end of the last day.
    #[serde(default)]
    pub last_day_end: Option<String>,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub itinerary: Itinerary,
    pub source: PlanSource,
    pub saved: bool,
}

/*
    /api/itineraries/generate
*/
pub async fn generate(
    planner: web::Data<ItineraryPlanner>,
    stores: web::Data<Stores>,
    in_flight: web::Data<InFlight>,
    input: web::Json<GenerateRequest>,
) -> impl Responder {
    let request = input.into_inner();
    let Some(_guard) = in_flight.try_acquire(in_flight_key("itinerary", &request)) else {
        return error_response(
            &mut HttpResponse::Conflict(),
            "The same itinerary is already being generated",
        );
    };

    let (start_time, last_day_end) = match (
        parse_optional_time(request.start_time.as_deref()),
        parse_optional_time(request.last_day_end.as_deref()),
    ) {
        (Ok(start), Ok(end)) => (start, end),
        _ => {
            return error_response(
                &mut HttpResponse::BadRequest(),
                "start_time and last_day_end must be HH:mm",
            )
        }
    };
    let options = PlanOptions {
        auto_add_meals: request.auto_add_meals,
        last_day_end,
    };

    let places = planner
        .with_mandatory_place(request.places, &request.filter)
        .await;
    if places.is_empty() {
        return error_response(
            &mut HttpResponse::UnprocessableEntity(),
            "Could not resolve a location for itinerary",
        );
    }

    let now = start_time.unwrap_or_else(|| Local::now().time());
    let plan = planner
        .generate(&places, &request.filter, &options, now)
        .await;
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ITINERARY_NAME.to_string());
    let itinerary = Itinerary::new(name, annotate_travel(plan.days));

    if request.save {
        if let Err(e) = stores.itineraries.upsert(itinerary.clone()).await {
            log::error!("Failed to save itinerary {}: {}", itinerary.id, e);
            return error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to save itinerary",
            );
        }
    }

    HttpResponse::Ok().json(GenerateResponse {
        itinerary,
        source: plan.source,
        saved: request.save,
    })
}

#[derive(Debug, Deserialize)]
pub struct ResequenceRequest {
    pub day: DaySchedule,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub gap_minutes: Option<u32>,
}

/*
    /api/itineraries/resequence
*/
pub async fn resequence(
    planner: web::Data<ItineraryPlanner>,
    input: web::Json<ResequenceRequest>,
) -> impl Responder {
    let request = input.into_inner();
    let Ok(start) = parse_optional_time(request.start_time.as_deref()) else {
        return error_response(&mut HttpResponse::BadRequest(), "start_time must be HH:mm");
    };
    let gap = request
        .gap_minutes
        .unwrap_or(planner.config().gap_minutes);

    if !fits_before_midnight(&request.day, start, gap) {
        return error_response(
            &mut HttpResponse::UnprocessableEntity(),
            "Schedule would run past midnight",
        );
    }

    HttpResponse::Ok().json(resequence_day(&request.day, start, gap))
}

/*
    /api/itineraries
*/
pub async fn get_all(stores: web::Data<Stores>) -> impl Responder {
    match stores.itineraries.list().await {
        Ok(itineraries) => HttpResponse::Ok().json(itineraries),
        Err(e) => {
            log::error!("Failed to list itineraries: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to retrieve itineraries",
            )
        }
    }
}

/*
    /api/itineraries/{id}
*/
pub async fn get_by_id(path: web::Path<String>, stores: web::Data<Stores>) -> impl Responder {
    match stores.itineraries.get(&path.into_inner()).await {
        Ok(Some(itinerary)) => HttpResponse::Ok().json(itinerary),
        Ok(None) => error_response(&mut HttpResponse::NotFound(), "Itinerary not found"),
        Err(e) => {
            log::error!("Failed to retrieve itinerary: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to retrieve itinerary",
            )
        }
    }
}

/*
    PUT /api/itineraries/{id}
*/
pub async fn update(
    path: web::Path<String>,
    stores: web::Data<Stores>,
    input: web::Json<Itinerary>,
) -> impl Responder {
    let mut itinerary = input.into_inner();
    itinerary.id = path.into_inner();

    match stores.itineraries.upsert(itinerary.clone()).await {
        Ok(()) => HttpResponse::Ok().json(itinerary),
        Err(e) => {
            log::error!("Failed to save itinerary {}: {}", itinerary.id, e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to save itinerary",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SlotDurationUpdate {
    pub duration_min: u32,
}

/*
    PATCH /api/itineraries/{id}/days/{day}/slots/{slot_id}
*/
pub async fn update_slot_duration(
    path: web::Path<(String, u32, String)>,
    planner: web::Data<ItineraryPlanner>,
    stores: web::Data<Stores>,
    input: web::Json<SlotDurationUpdate>,
) -> impl Responder {
    let (id, day, slot_id) = path.into_inner();
    if input.duration_min == 0 {
        return error_response(
            &mut HttpResponse::BadRequest(),
            "duration_min must be positive",
        );
    }

    let mut itinerary = match stores.itineraries.get(&id).await {
        Ok(Some(itinerary)) => itinerary,
        Ok(None) => return error_response(&mut HttpResponse::NotFound(), "Itinerary not found"),
        Err(e) => {
            log::error!("Failed to retrieve itinerary {}: {}", id, e);
            return error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to retrieve itinerary",
            );
        }
    };

    let gap = planner.config().gap_minutes;
    let Some(schedule) = itinerary.day_mut(day) else {
        return error_response(&mut HttpResponse::NotFound(), "Day not found");
    };
    match with_slot_duration(schedule, &slot_id, input.duration_min, gap) {
        Ok(edited) => *schedule = edited,
        Err(SlotEditError::SlotNotFound) => {
            return error_response(&mut HttpResponse::NotFound(), "Slot not found")
        }
        Err(SlotEditError::PastMidnight) => {
            return error_response(
                &mut HttpResponse::UnprocessableEntity(),
                "Slot duration would push the day past midnight",
            )
        }
    }

    match stores.itineraries.upsert(itinerary.clone()).await {
        Ok(()) => HttpResponse::Ok().json(itinerary),
        Err(e) => {
            log::error!("Failed to save itinerary {}: {}", itinerary.id, e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to save itinerary",
            )
        }
    }
}

/*
    DELETE /api/itineraries/{id}
*/
pub async fn delete(path: web::Path<String>, stores: web::Data<Stores>) -> impl Responder {
    match stores.itineraries.delete(&path.into_inner()).await {
        Ok(true) => HttpResponse::NoContent().finish(),
        Ok(false) => error_response(&mut HttpResponse::NotFound(), "Itinerary not found"),
        Err(e) => {
            log::error!("Failed to delete itinerary: {}", e);
            error_response(
                &mut HttpResponse::InternalServerError(),
                "Failed to delete itinerary",
            )
        }
    }
}
