//! Place search and geocoding against the Kakao Local API.
//!
//! ## Setup
//! Set `KAKAO_REST_API_KEY` to a Kakao REST API key.
//!
//! The pipeline only talks to the [`PlaceSearch`] and [`Geocoder`] traits, so tests and other
//! providers can stand in for Kakao.

use crate::models::place::{Category, LatLng, Place};
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashSet, env, error::Error, fmt, time::Duration};

const KAKAO_BASE_URL: &str = "https://dapi.kakao.com";
const MAX_PAGE_SIZE: u32 = 15;
const MAX_RADIUS_METERS: u32 = 20_000;

/// Institutional cafeterias that are never worth recommending.
const LOW_PRIORITY_NAMES: [&str; 6] = [
    "구내식당",
    "사내식당",
    "학생식당",
    "교내식당",
    "급식실",
    "기숙사식당",
];

#[derive(Debug)]
pub enum PlaceSearchError {
    HttpError(reqwest::Error),
    ResponseError(String),
}

impl fmt::Display for PlaceSearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceSearchError::HttpError(err) => write!(f, "HTTP error: {}", err),
            PlaceSearchError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl Error for PlaceSearchError {}

impl From<reqwest::Error> for PlaceSearchError {
    fn from(err: reqwest::Error) -> Self {
        PlaceSearchError::HttpError(err)
    }
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Places of one category around `center`, deduplicated and sorted by distance.
    async fn search_category(
        &self,
        category: Category,
        center: LatLng,
        radius_meters: u32,
        size: u32,
        max_pages: u32,
    ) -> Result<Vec<Place>, PlaceSearchError>;

    async fn search_keyword(
        &self,
        query: &str,
        center: Option<LatLng>,
        radius_meters: u32,
        size: u32,
    ) -> Result<Vec<Place>, PlaceSearchError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the text does not resolve to a location.
    async fn geocode(&self, query: &str) -> Result<Option<LatLng>, PlaceSearchError>;
}

/// External category codes searched for each internal category.
pub fn category_codes(category: Category) -> &'static [&'static str] {
    match category {
        Category::Food => &["FD6"],
        Category::Cafe => &["CE7"],
        Category::Culture => &["CT1"],
        Category::Photo => &["AT4"],
        Category::Shopping => &["MT1", "CS2"],
        Category::Healing => &["AT4"],
        Category::Experience => &["AT4", "AC5"],
        Category::Night => &["AD5"],
        Category::Stay => &["AD5"],
    }
}

pub fn category_from_code(code: &str) -> Category {
    match code {
        "FD6" => Category::Food,
        "CE7" => Category::Cafe,
        "CT1" => Category::Culture,
        "AT4" => Category::Photo,
        "MT1" | "CS2" => Category::Shopping,
        "AD5" => Category::Stay,
        _ => Category::Culture,
    }
}

/// Several internal categories share a code, so a result found for the requested category keeps it.
fn resolve_category(code: &str, requested: Option<Category>) -> Category {
    match requested {
        Some(category) if category_codes(category).contains(&code) => category,
        _ => category_from_code(code),
    }
}

fn is_low_priority(name: &str) -> bool {
    LOW_PRIORITY_NAMES.iter().any(|kw| name.contains(kw))
}

/// Drops duplicate ids and cafeterias, then orders by distance with unknown distances last.
pub fn tidy_results(places: Vec<Place>) -> Vec<Place> {
    let mut seen = HashSet::new();
    let mut tidy: Vec<Place> = places
        .into_iter()
        .filter(|p| !is_low_priority(&p.name))
        .filter(|p| seen.insert(p.id.clone()))
        .collect();
    tidy.sort_by_key(|p| p.distance_meters.unwrap_or(u32::MAX));
    tidy
}

#[derive(Debug, Deserialize)]
struct KakaoPlaceResponse {
    #[serde(default)]
    documents: Vec<KakaoPlaceDocument>,
    meta: Option<KakaoMeta>,
}

#[derive(Debug, Deserialize)]
struct KakaoMeta {
    #[serde(default)]
    is_end: bool,
}

#[derive(Debug, Deserialize)]
struct KakaoPlaceDocument {
    id: String,
    place_name: String,
    #[serde(default)]
    category_group_code: String,
    x: String,
    y: String,
    #[serde(default)]
    address_name: String,
    #[serde(default)]
    road_address_name: String,
    #[serde(default)]
    distance: String,
}

impl KakaoPlaceDocument {
    fn into_place(self, requested: Option<Category>) -> Option<Place> {
        let lat = self.y.parse::<f64>().ok()?;
        let lng = self.x.parse::<f64>().ok()?;
        let address = if !self.road_address_name.is_empty() {
            Some(self.road_address_name)
        } else if !self.address_name.is_empty() {
            Some(self.address_name)
        } else {
            None
        };

        Some(Place {
            category: resolve_category(&self.category_group_code, requested),
            id: self.id,
            name: self.place_name,
            lat,
            lng,
            distance_meters: self.distance.parse().ok(),
            rating: None,
            address,
            score: None,
            popularity_count: None,
            popularity_score: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct KakaoAddressResponse {
    #[serde(default)]
    documents: Vec<KakaoAddressDocument>,
}

#[derive(Debug, Deserialize)]
struct KakaoAddressDocument {
    x: String,
    y: String,
}

pub struct KakaoLocalService {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl KakaoLocalService {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let api_key = env::var("KAKAO_REST_API_KEY")
            .map_err(|_| "KAKAO_REST_API_KEY environment variable not set")?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            base_url: KAKAO_BASE_URL.to_string(),
        })
    }

    async fn fetch_page(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<KakaoPlaceResponse, PlaceSearchError> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlaceSearchError::ResponseError(format!(
                "Kakao returned {}",
                response.status()
            )));
        }

        Ok(response.json::<KakaoPlaceResponse>().await?)
    }
}

#[async_trait]
impl PlaceSearch for KakaoLocalService {
    async fn search_category(
        &self,
        category: Category,
        center: LatLng,
        radius_meters: u32,
        size: u32,
        max_pages: u32,
    ) -> Result<Vec<Place>, PlaceSearchError> {
        let mut places = Vec::new();

        for code in category_codes(category) {
            for page in 1..=max_pages.max(1) {
                let params = [
                    ("category_group_code", code.to_string()),
                    ("x", center.lng.to_string()),
                    ("y", center.lat.to_string()),
                    ("radius", radius_meters.min(MAX_RADIUS_METERS).to_string()),
                    ("page", page.to_string()),
                    ("size", size.clamp(1, MAX_PAGE_SIZE).to_string()),
                    ("sort", "distance".to_string()),
                ];
                let body = self
                    .fetch_page("/v2/local/search/category.json", &params)
                    .await?;
                if body.documents.is_empty() {
                    break;
                }
                let is_end = body.meta.map(|m| m.is_end).unwrap_or(false);
                places.extend(
                    body.documents
                        .into_iter()
                        .filter_map(|doc| doc.into_place(Some(category))),
                );
                if is_end {
                    break;
                }
            }
        }

        Ok(tidy_results(places))
    }

    async fn search_keyword(
        &self,
        query: &str,
        center: Option<LatLng>,
        radius_meters: u32,
        size: u32,
    ) -> Result<Vec<Place>, PlaceSearchError> {
        let mut params = vec![
            ("query", query.to_string()),
            ("size", size.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(center) = center {
            params.push(("x", center.lng.to_string()));
            params.push(("y", center.lat.to_string()));
            params.push(("radius", radius_meters.min(MAX_RADIUS_METERS).to_string()));
        }

        let body = self
            .fetch_page("/v2/local/search/keyword.json", &params)
            .await?;
        Ok(tidy_results(
            body.documents
                .into_iter()
                .filter_map(|doc| doc.into_place(None))
                .collect(),
        ))
    }
}

#[async_trait]
impl Geocoder for KakaoLocalService {
    async fn geocode(&self, query: &str) -> Result<Option<LatLng>, PlaceSearchError> {
        let response = self
            .http_client
            .get(format!("{}/v2/local/search/address.json", self.base_url))
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .query(&[("query", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlaceSearchError::ResponseError(format!(
                "Kakao geocode returned {}",
                response.status()
            )));
        }

        let body = response.json::<KakaoAddressResponse>().await?;
        Ok(body.documents.into_iter().next().and_then(|doc| {
            let lat = doc.y.parse::<f64>().ok()?;
            let lng = doc.x.parse::<f64>().ok()?;
            Some(LatLng::new(lat, lng))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: &str, name: &str, distance: Option<u32>) -> Place {
        Place {
            id: id.to_string(),
            name: name.to_string(),
            category: Category::Food,
            lat: 37.5,
            lng: 127.0,
            distance_meters: distance,
            rating: None,
            address: None,
            score: None,
            popularity_count: None,
            popularity_score: None,
        }
    }

    #[test]
    fn shared_codes_keep_the_requested_category() {
        assert_eq!(resolve_category("AT4", Some(Category::Healing)), Category::Healing);
        assert_eq!(resolve_category("AC5", Some(Category::Experience)), Category::Experience);
        assert_eq!(resolve_category("FD6", Some(Category::Cafe)), Category::Food);
        assert_eq!(resolve_category("XX1", None), Category::Culture);
        assert_eq!(category_from_code("CS2"), Category::Shopping);
    }

    #[test]
    fn tidy_results_dedupes_drops_cafeterias_and_sorts() {
        let tidy = tidy_results(vec![
            place("1", "국밥집", Some(300)),
            place("2", "OO빌딩 구내식당", Some(10)),
            place("1", "국밥집", Some(300)),
            place("3", "분식", None),
            place("4", "냉면", Some(120)),
        ]);
        let ids: Vec<&str> = tidy.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1", "3"]);
    }

    #[test]
    fn kakao_document_maps_coordinates_and_address() {
        let doc: KakaoPlaceDocument = serde_json::from_value(serde_json::json!({
            "id": "26338954",
            "place_name": "성수 카페",
            "category_group_code": "CE7",
            "x": "127.0565",
            "y": "37.5445",
            "address_name": "서울 성동구 성수동2가 1",
            "road_address_name": "",
            "distance": "418"
        }))
        .unwrap();
        let place = doc.into_place(Some(Category::Cafe)).unwrap();
        assert_eq!(place.category, Category::Cafe);
        assert_eq!(place.lat, 37.5445);
        assert_eq!(place.lng, 127.0565);
        assert_eq!(place.distance_meters, Some(418));
        assert_eq!(place.address.as_deref(), Some("서울 성동구 성수동2가 1"));
    }
}
