use crate::services::Collaborators;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::collections::HashMap;
use std::env;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

/*
    /health
*/
pub async fn health_check(collaborators: web::Data<Collaborators>) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let checks = [
        (
            "place_search",
            collaborators.place_search.is_some(),
            &["KAKAO_REST_API_KEY"][..],
        ),
        (
            "popularity",
            collaborators.popularity.is_some(),
            &["NAVER_CLIENT_ID", "NAVER_CLIENT_SECRET"][..],
        ),
        (
            "weather",
            collaborators.weather.is_some(),
            &["OPENWEATHER_API_KEY"][..],
        ),
        (
            "language_model",
            collaborators.completion.is_some(),
            &["OPENAI_API_KEY"][..],
        ),
        (
            "walking_directions",
            collaborators.directions.is_some(),
            &["TMAP_APP_KEY"][..],
        ),
    ];

    for (name, available, keys) in checks {
        health
            .services
            .insert(name.to_string(), collaborator_status(available, keys));
    }
    health
        .services
        .insert("storage".to_string(), storage_status());

    // Without place search every recommendation comes back empty.
    if collaborators.place_search.is_none() || collaborators.geocoder.is_none() {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}

fn mask(key: &str) -> String {
    if key.len() > 8 && key.is_char_boundary(4) && key.is_char_boundary(key.len() - 4) {
        format!("{}***{}", &key[0..4], &key[key.len() - 4..])
    } else {
        "***".to_string()
    }
}

fn collaborator_status(available: bool, keys: &[&str]) -> ServiceStatus {
    if available {
        let masked: Vec<String> = keys
            .iter()
            .filter_map(|k| env::var(k).ok().map(|v| format!("{} ({})", k, mask(&v))))
            .collect();
        let details = if masked.is_empty() {
            "configured".to_string()
        } else {
            format!("configured: {}", masked.join(", "))
        };
        return ServiceStatus {
            status: "ok".to_string(),
            details: Some(details),
        };
    }

    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| env::var(k).map(|v| v.trim().is_empty()).unwrap_or(true))
        .collect();
    ServiceStatus {
        status: "unavailable".to_string(),
        details: Some(if missing.is_empty() {
            "client could not be created".to_string()
        } else {
            format!("Missing configuration: {}", missing.join(", "))
        }),
    }
}

fn storage_status() -> ServiceStatus {
    let details = match env::var("MONGODB_URI") {
        Ok(uri) if !uri.trim().is_empty() => "MongoDB".to_string(),
        _ => format!(
            "JSON files under {}",
            env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())
        ),
    };
    ServiceStatus {
        status: "ok".to_string(),
        details: Some(details),
    }
}
