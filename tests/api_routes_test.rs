mod common;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};
use serial_test::serial;

use common::{places_along, seoul_collaborators, TestApp};
use trip_curator_api::models::filter::FilterState;
use trip_curator_api::models::place::{Category, Place};
use trip_curator_api::routes::in_flight_key;
use trip_curator_api::services::Collaborators;

fn seoul_places() -> Vec<Place> {
    let mut places = places_along("food", Category::Food, 12, 300.0);
    places.extend(places_along("photo", Category::Photo, 8, 500.0));
    places.extend(places_along("cafe", Category::Cafe, 6, 400.0));
    places
}

fn seoul_app() -> TestApp {
    TestApp::new(seoul_collaborators(seoul_places()))
}

#[actix_rt::test]
#[serial]
async fn test_health_reports_collaborators() {
    std::env::remove_var("MONGODB_URI");
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"]["place_search"]["status"], "ok");
    assert_eq!(body["services"]["language_model"]["status"], "unavailable");
    assert!(body["services"]["storage"]["details"]
        .as_str()
        .unwrap()
        .starts_with("JSON files"));
}

#[actix_rt::test]
#[serial]
async fn test_health_is_degraded_without_place_search() {
    let test_app = TestApp::new(Collaborators::default());
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "degraded");
}

#[actix_rt::test]
async fn test_recommendations_success() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/recommendations")
        .set_json(&json!({
            "region": "서울",
            "categories": ["FOOD", "PHOTO"],
            "companion": "FRIENDS"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let places = body["places"].as_array().unwrap();
    assert!(!places.is_empty());
    assert!(places
        .iter()
        .all(|p| p["category"] == "FOOD" || p["category"] == "PHOTO"));
    assert_eq!(body["weather"]["condition"], "Clear");
    assert_eq!(body["reasons"].as_object().unwrap().len(), places.len());
}

#[actix_rt::test]
async fn test_recommendations_for_unknown_region_are_empty() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/recommendations/ai")
        .set_json(&json!({ "filter": { "region": "아틀란티스" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["places"].as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn test_duplicate_recommendation_is_rejected() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let body = json!({ "region": "서울" });
    let filter: FilterState = serde_json::from_value(body.clone()).unwrap();
    let _busy = test_app
        .in_flight
        .try_acquire(in_flight_key("recommend", &filter))
        .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/recommendations")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let error: Value = test::read_body_json(resp).await;
    assert!(error["error"].is_string());
}

#[actix_rt::test]
async fn test_malformed_body_returns_error_json() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/recommendations")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"categories\": [\"NOT_A_CATEGORY\"]}")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[actix_rt::test]
async fn test_weather_requires_a_location() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/api/weather").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/weather?lat=37.5665&lng=126.978")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["condition"], "Clear");
}

#[actix_rt::test]
async fn test_place_keyword_search() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri("/api/places/search?query=photo3")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let found = body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], "photo3");
}

#[actix_rt::test]
async fn test_itinerary_generate_edit_and_delete() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;
    let places: Vec<Place> = seoul_places().into_iter().step_by(3).collect();

    let req = test::TestRequest::post()
        .uri("/api/itineraries/generate")
        .set_json(&json!({
            "name": "서울 하루",
            "places": places,
            "filter": { "region": "서울", "duration": "DAY" },
            "start_time": "09:00",
            "save": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["source"], "FALLBACK");
    assert_eq!(body["saved"], true);

    let itinerary = &body["itinerary"];
    let id = itinerary["id"].as_str().unwrap().to_string();
    let slots = itinerary["days"][0]["slots"].as_array().unwrap();
    assert!(slots.len() >= 2);
    let first_slot = slots[0]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/itineraries/{}", id))
        .to_request();
    let stored: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stored["name"], "서울 하루");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/itineraries/{}/days/1/slots/{}", id, first_slot))
        .set_json(&json!({ "duration_min": 150 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let edited: Value = test::read_body_json(resp).await;
    let edited_slots = edited["days"][0]["slots"].as_array().unwrap();
    assert_eq!(edited_slots[0]["duration_min"], 150);
    assert_eq!(edited_slots.len(), slots.len());

    let req = test::TestRequest::patch()
        .uri(&format!("/api/itineraries/{}/days/1/slots/{}", id, first_slot))
        .set_json(&json!({ "duration_min": 1000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get().uri("/api/itineraries").to_request();
    let all: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/itineraries/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/itineraries/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_itinerary_without_places_is_rejected() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/itineraries/generate")
        .set_json(&json!({ "places": [], "filter": {} }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn test_resequence_endpoint() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/itineraries/resequence")
        .set_json(&json!({
            "day": {
                "day": 1,
                "slots": [
                    {"id": "a", "start_time": "15:00", "end_time": "15:30", "activity": "MEAL", "duration_min": 30},
                    {"id": "b", "start_time": "09:00", "end_time": "10:00", "activity": "MEAL", "duration_min": 60}
                ]
            },
            "start_time": "11:00",
            "gap_minutes": 15
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots[0]["id"], "a");
    assert_eq!(slots[0]["start_time"], "11:00");
    assert_eq!(slots[0]["end_time"], "11:30");
    assert_eq!(slots[1]["start_time"], "11:45");
    assert_eq!(slots[1]["end_time"], "12:45");
}

#[actix_rt::test]
async fn test_resequence_past_midnight_is_rejected() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/itineraries/resequence")
        .set_json(&json!({
            "day": {
                "day": 1,
                "slots": [
                    {"id": "a", "start_time": "22:00", "end_time": "23:30", "activity": "MEAL", "duration_min": 90},
                    {"id": "b", "start_time": "23:40", "end_time": "00:40", "activity": "MEAL", "duration_min": 60}
                ]
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("midnight"));
}

#[actix_rt::test]
async fn test_saved_routes_lifecycle() {
    let test_app = seoul_app();
    let app = test::init_service(test_app.create_app()).await;
    let places: Vec<Place> = seoul_places().into_iter().take(3).collect();

    let req = test::TestRequest::post()
        .uri("/api/routes/walking")
        .set_json(&json!({ "places": [places[0]] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/routes")
        .set_json(&json!({ "name": "점심 산책", "places": places }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let id = created["route"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["route"]["segments"].as_array().unwrap().len(), 2);
    let total = created["summary"]["total_distance_meters"].as_u64().unwrap();
    assert!((590..=610).contains(&total), "unexpected total {}", total);
    assert!(created["summary"]["distance_label"]
        .as_str()
        .unwrap()
        .ends_with(" m"));

    let req = test::TestRequest::get().uri("/api/routes").to_request();
    let summaries: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summaries.as_array().unwrap().len(), 1);
    assert_eq!(summaries[0]["name"], "점심 산책");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/routes/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/routes/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
