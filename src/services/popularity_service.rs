//! Popularity signal from Naver blog search hit counts.
//!
//! ## Setup
//! Set `NAVER_CLIENT_ID` and `NAVER_CLIENT_SECRET`.

use crate::models::place::Place;
use async_trait::async_trait;
use serde::Deserialize;
use std::{cmp::Ordering, env, error::Error, fmt, time::Duration};

const NAVER_BLOG_SEARCH_URL: &str = "https://openapi.naver.com/v1/search/blog.json";

#[derive(Debug)]
pub enum PopularityError {
    HttpError(reqwest::Error),
    ResponseError(String),
}

impl fmt::Display for PopularityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopularityError::HttpError(err) => write!(f, "HTTP error: {}", err),
            PopularityError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl Error for PopularityError {}

impl From<reqwest::Error> for PopularityError {
    fn from(err: reqwest::Error) -> Self {
        PopularityError::HttpError(err)
    }
}

#[async_trait]
pub trait PopularityLookup: Send + Sync {
    /// Raw hit count for a search query.
    async fn hit_count(&self, query: &str) -> Result<u64, PopularityError>;
}

#[derive(Debug, Deserialize)]
struct NaverBlogResponse {
    #[serde(default)]
    total: u64,
}

pub struct NaverBlogService {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl NaverBlogService {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let client_id =
            env::var("NAVER_CLIENT_ID").map_err(|_| "NAVER_CLIENT_ID environment variable not set")?;
        let client_secret = env::var("NAVER_CLIENT_SECRET")
            .map_err(|_| "NAVER_CLIENT_SECRET environment variable not set")?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            client_id,
            client_secret,
        })
    }
}

#[async_trait]
impl PopularityLookup for NaverBlogService {
    async fn hit_count(&self, query: &str) -> Result<u64, PopularityError> {
        let response = self
            .http_client
            .get(NAVER_BLOG_SEARCH_URL)
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .query(&[("query", query), ("display", "10")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PopularityError::ResponseError(format!(
                "Naver returned {}",
                response.status()
            )));
        }

        Ok(response.json::<NaverBlogResponse>().await?.total)
    }
}

pub fn popularity_query(place_name: &str, region_hint: Option<&str>) -> String {
    match region_hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => format!("{} {}", hint, place_name),
        None => place_name.to_string(),
    }
}

pub fn popularity_score(hit_count: u64) -> f64 {
    ((hit_count + 1) as f64).log10()
}

/// Attaches hit counts and log scores one place at a time. Failed lookups leave the fields empty.
pub async fn enrich_popularity(
    places: Vec<Place>,
    lookup: &dyn PopularityLookup,
    region_hint: Option<&str>,
) -> Vec<Place> {
    let mut enriched = Vec::with_capacity(places.len());
    for mut place in places {
        let query = popularity_query(&place.name, region_hint);
        match lookup.hit_count(&query).await {
            Ok(count) => {
                place.popularity_count = Some(count);
                place.popularity_score = Some(popularity_score(count));
            }
            Err(e) => log::warn!("Popularity lookup for '{}' failed: {}", query, e),
        }
        enriched.push(place);
    }
    enriched
}

/// The `n` most talked-about places: by score, then hit count, then nearest first.
pub fn pick_top_by_popularity(places: &[Place], n: usize) -> Vec<Place> {
    let mut sorted = places.to_vec();
    sorted.sort_by(|a, b| {
        let score_a = a.popularity_score.unwrap_or(0.0);
        let score_b = b.popularity_score.unwrap_or(0.0);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.popularity_count.unwrap_or(0).cmp(&a.popularity_count.unwrap_or(0)))
            .then_with(|| {
                a.distance_meters
                    .unwrap_or(u32::MAX)
                    .cmp(&b.distance_meters.unwrap_or(u32::MAX))
            })
    });
    sorted.truncate(n);
    sorted
}
