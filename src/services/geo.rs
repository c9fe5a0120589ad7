//! Geometry and region-text helpers.
//!
//! Region strings are free text such as `서울`, `서울 성수동` or `서울 성수동, 연남동`. Tokens are
//! separated by any of `,`, `·`, `/` or `;`.

use crate::models::place::{LatLng, Place};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const REGION_SEPARATORS: [char; 4] = [',', '·', '/', ';'];
const ADMINISTRATIVE_SUFFIXES: [&str; 9] = ["동", "읍", "면", "리", "구", "가", "로", "길", "타운"];

/// Great-circle distance in meters.
pub fn haversine_meters(a: LatLng, b: LatLng) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

pub fn distance_between(a: &Place, b: &Place) -> f64 {
    haversine_meters(a.location(), b.location())
}

/// A region specific enough for a single search center: it has several words or ends with an
/// administrative suffix.
pub fn is_fine_grained_region(region: &str) -> bool {
    let trimmed = region.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.contains(' ')
        || ADMINISTRATIVE_SUFFIXES
            .iter()
            .any(|suffix| trimmed.ends_with(suffix))
}

pub fn has_multi_regions(region: &str) -> bool {
    region.contains(&REGION_SEPARATORS[..])
}

/// The base point plus four points offset by `delta` degrees north, south, east and west.
pub fn build_search_centers(base: LatLng, delta: f64) -> Vec<LatLng> {
    vec![
        base,
        LatLng::new(base.lat + delta, base.lng),
        LatLng::new(base.lat - delta, base.lng),
        LatLng::new(base.lat, base.lng + delta),
        LatLng::new(base.lat, base.lng - delta),
    ]
}

/// Splits a multi-region string into tokens.
///
/// When the first token carries a city prefix (`서울 성수동, 연남동`), the city is copied onto later
/// single-word tokens so each one geocodes on its own (`서울 연남동`).
pub fn split_multi_regions(region: &str) -> Vec<String> {
    let tokens: Vec<&str> = region
        .split(&REGION_SEPARATORS[..])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() <= 1 {
        return tokens.into_iter().map(str::to_string).collect();
    }

    let first_parts: Vec<&str> = tokens[0].split_whitespace().collect();
    let city_hint = if first_parts.len() >= 2 {
        Some(first_parts[0])
    } else {
        None
    };

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| match city_hint {
            Some(city) if i > 0 && !token.contains(' ') => format!("{} {}", city, token),
            _ => token.to_string(),
        })
        .collect()
}

/// Second word of every region token after city propagation, deduplicated in input order.
pub fn extract_neighborhood_keywords(region: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in split_multi_regions(region) {
        let parts: Vec<&str> = token.split_whitespace().collect();
        if parts.len() >= 2 && !keywords.iter().any(|k| k == parts[1]) {
            keywords.push(parts[1].to_string());
        }
    }
    keywords
}

fn city_keyword(region: &str) -> Option<&str> {
    region
        .split(|c: char| REGION_SEPARATORS.contains(&c) || c.is_whitespace())
        .map(str::trim)
        .find(|t| !t.is_empty())
}

fn district_keyword(region: &str) -> Option<&str> {
    let tokens: Vec<&str> = region.trim().split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.len() >= 2 {
        Some(tokens[1])
    } else {
        None
    }
}

fn filter_by_address_keyword(places: Vec<Place>, keyword: Option<&str>) -> Vec<Place> {
    let Some(keyword) = keyword else {
        return places;
    };
    let kept: Vec<Place> = places
        .iter()
        .filter(|p| p.address_or_empty().contains(keyword))
        .cloned()
        .collect();
    if kept.is_empty() {
        places
    } else {
        kept
    }
}

/// Keeps places whose address mentions the region's city, unless that would keep none.
pub fn filter_by_city(places: Vec<Place>, region: &str) -> Vec<Place> {
    filter_by_address_keyword(places, city_keyword(region))
}

/// Keeps places whose address mentions the region's second word, unless that would keep none.
pub fn filter_by_district(places: Vec<Place>, region: &str) -> Vec<Place> {
    filter_by_address_keyword(places, district_keyword(region))
}
