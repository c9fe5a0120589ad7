//! Recommendation Service
//!
//! Turns a [`FilterState`] into a ranked, balanced list of places.
//!
//! ## Paths
//! - **Plain**: search, filter, heuristic ordering (rating and distance).
//! - **AI**: a smaller search, popularity enrichment, a popularity-ranked shortlist, then a
//!   language-model rerank.
//!
//! Both paths finish with the same shaping: category quotas, neighborhood quotas when several
//! neighborhoods were asked for, a distance cut for fine-grained regions, spatial spread, and a
//! backfill so the list does not end up too short.
//!
//! A region that cannot be geocoded produces an empty result, never an error.

use crate::models::filter::FilterState;
use crate::models::place::{Category, LatLng, Place, WeatherInfo};
use crate::models::recommendation::RecommendationResult;
use crate::services::candidate_service::{apply_content_filters, CandidateFetcher, FetchPlan};
use crate::services::fit_labels::{summary_line, FitRules};
use crate::services::geo::{
    haversine_meters, has_multi_regions, is_fine_grained_region, split_multi_regions,
};
use crate::services::popularity_service::{
    enrich_popularity, pick_top_by_popularity, PopularityLookup,
};
use crate::services::rebalance::{
    backfill_to_min, rebalance_by_category, rebalance_by_neighborhood, spread_out_by_category,
    top_pick_per_category, CategoryQuota,
};
use crate::services::rerank_service::{RerankOutcome, RerankService, MAX_CANDIDATES_IN_PROMPT};
use crate::services::weather_service::{current_weather, WeatherLookup};
use crate::services::Collaborators;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    pub default_region: String,
    pub search_radius_meters: u32,
    pub size_per_category: u32,
    pub max_pages: u32,
    pub max_total_candidates: usize,
    pub ai_size_per_category: u32,
    pub ai_max_pages: u32,
    pub popularity_top_n: usize,
    pub max_list_results: usize,
    pub min_list_results: usize,
    pub min_per_category: usize,
    pub top_per_category: usize,
    pub min_per_neighborhood: usize,
    pub min_spread_distance_meters: f64,
    pub fine_region_max_distance_meters: f64,
    pub center_delta_degrees: f64,
    pub rerank_max_candidates: usize,
    pub distance_bonus_scale: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_region: "서울".to_string(),
            search_radius_meters: 8000,
            size_per_category: 15,
            max_pages: 3,
            max_total_candidates: 120,
            ai_size_per_category: 15,
            ai_max_pages: 2,
            popularity_top_n: 30,
            max_list_results: 20,
            min_list_results: 15,
            min_per_category: 3,
            top_per_category: 1,
            min_per_neighborhood: 2,
            min_spread_distance_meters: 1500.0,
            fine_region_max_distance_meters: 5000.0,
            center_delta_degrees: 0.25,
            rerank_max_candidates: MAX_CANDIDATES_IN_PROMPT,
            distance_bonus_scale: 50.0,
        }
    }
}

impl RecommendationConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            default_region: std::env::var("RECO_DEFAULT_REGION").unwrap_or(d.default_region),
            search_radius_meters: env_or("RECO_SEARCH_RADIUS_M", d.search_radius_meters),
            size_per_category: env_or("RECO_SIZE_PER_CATEGORY", d.size_per_category),
            max_pages: env_or("RECO_MAX_PAGES", d.max_pages),
            max_total_candidates: env_or("RECO_MAX_TOTAL_CANDIDATES", d.max_total_candidates),
            ai_size_per_category: env_or("RECO_AI_SIZE_PER_CATEGORY", d.ai_size_per_category),
            ai_max_pages: env_or("RECO_AI_MAX_PAGES", d.ai_max_pages),
            popularity_top_n: env_or("RECO_POPULARITY_TOP_N", d.popularity_top_n),
            max_list_results: env_or("RECO_MAX_LIST_RESULTS", d.max_list_results),
            min_list_results: env_or("RECO_MIN_LIST_RESULTS", d.min_list_results),
            min_per_category: env_or("RECO_MIN_PER_CATEGORY", d.min_per_category),
            top_per_category: env_or("RECO_TOP_PER_CATEGORY", d.top_per_category),
            min_per_neighborhood: env_or("RECO_MIN_PER_NEIGHBORHOOD", d.min_per_neighborhood),
            min_spread_distance_meters: env_or("RECO_MIN_SPREAD_DISTANCE_M", d.min_spread_distance_meters),
            fine_region_max_distance_meters: env_or(
                "RECO_FINE_REGION_MAX_DISTANCE_M",
                d.fine_region_max_distance_meters,
            ),
            center_delta_degrees: env_or("RECO_CENTER_DELTA_DEG", d.center_delta_degrees),
            rerank_max_candidates: env_or("RECO_RERANK_MAX_CANDIDATES", d.rerank_max_candidates),
            distance_bonus_scale: env_or("RECO_DISTANCE_BONUS_SCALE", d.distance_bonus_scale),
        }
    }

    fn category_quota(&self) -> CategoryQuota {
        CategoryQuota {
            min_per_category: self.min_per_category,
            top_per_category: self.top_per_category,
            total_cap: self.max_list_results,
            distance_bonus_scale: self.distance_bonus_scale,
        }
    }
}

/// Output of the shared shaping stage.
struct ShapedList {
    places: Vec<Place>,
    top_picks: Vec<Place>,
}

pub struct RecommendationService {
    fetcher: Option<CandidateFetcher>,
    popularity: Option<Arc<dyn PopularityLookup>>,
    weather: Option<Arc<dyn WeatherLookup>>,
    reranker: Option<RerankService>,
    fit_rules: FitRules,
    config: RecommendationConfig,
}

impl RecommendationService {
    pub fn new(collaborators: &Collaborators, config: RecommendationConfig, fit_rules: FitRules) -> Self {
        let fetcher = match (&collaborators.place_search, &collaborators.geocoder) {
            (Some(search), Some(geocoder)) => Some(CandidateFetcher::new(
                search.clone(),
                geocoder.clone(),
                config.center_delta_degrees,
            )),
            _ => {
                log::warn!("Place search or geocoding not configured. Recommendations will be empty.");
                None
            }
        };
        let reranker = collaborators
            .completion
            .clone()
            .map(|port| RerankService::with_max_candidates(port, config.rerank_max_candidates));

        Self {
            fetcher,
            popularity: collaborators.popularity.clone(),
            weather: collaborators.weather.clone(),
            reranker,
            fit_rules,
            config,
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Geocodes the first region token, falling back to its last word.
    async fn resolve_base(&self, fetcher: &CandidateFetcher, region: &str) -> Option<LatLng> {
        let tokens = split_multi_regions(region);
        let first = tokens.first().map(String::as_str).unwrap_or(region);
        if let Some(found) = fetcher.geocode(first).await {
            return Some(found);
        }
        match first.split_whitespace().last() {
            Some(tail) if tail != first => fetcher.geocode(tail).await,
            _ => None,
        }
    }

    pub async fn weather_at(&self, at: LatLng) -> Option<WeatherInfo> {
        current_weather(self.weather.as_deref(), at).await
    }

    /// Weather for a free-text region.
    pub async fn weather_for_region(&self, region: &str) -> Option<WeatherInfo> {
        let fetcher = self.fetcher.as_ref()?;
        let at = self.resolve_base(fetcher, region).await?;
        self.weather_at(at).await
    }

    /// Heuristic recommendations without a language model.
    pub async fn recommend(&self, filter: &FilterState) -> RecommendationResult {
        let Some(fetcher) = &self.fetcher else {
            return RecommendationResult::empty(None);
        };
        let region = filter.search_region(&self.config.default_region);
        let Some(base) = self.resolve_base(fetcher, &region).await else {
            log::info!("Could not resolve a location for '{}'", region);
            return RecommendationResult::empty(None);
        };
        let weather = self.weather_at(base).await;
        let categories = filter.effective_categories();

        let centers = fetcher.resolve_centers(&region, base).await;
        let plan = FetchPlan {
            radius_meters: self.config.search_radius_meters,
            size_per_call: self.config.size_per_category,
            max_pages: self.config.max_pages,
            global_cap: Some(self.config.max_total_candidates),
        };
        let raw = fetcher.fetch(&categories, &centers, &plan).await;
        let filtered = apply_content_filters(raw, &region);
        if filtered.is_empty() {
            return RecommendationResult::empty(weather);
        }

        let shaped = self.shape(filtered, &region, &categories, base);
        let reasons = shaped
            .places
            .iter()
            .map(|place| {
                let line = summary_line(
                    self.fit_rules.weather_fit(place.category, weather.as_ref()),
                    self.fit_rules.companion_fit(place, filter.companion),
                    None,
                );
                (place.id.clone(), line)
            })
            .collect();

        log::info!(
            "Recommended {} places for '{}' ({} categories)",
            shaped.places.len(),
            region,
            categories.len()
        );

        RecommendationResult {
            places: shaped.places,
            weather,
            reasons,
            ai_top_ids: BTreeSet::new(),
            top_picks: shaped.top_picks,
        }
    }

    /// Recommendations reranked by the language model. `center` skips geocoding when the caller
    /// already knows where to search.
    pub async fn recommend_with_ai(
        &self,
        filter: &FilterState,
        center: Option<LatLng>,
    ) -> RecommendationResult {
        let Some(fetcher) = &self.fetcher else {
            return RecommendationResult::empty(None);
        };
        let region = filter.search_region(&self.config.default_region);
        let base = match center {
            Some(center) => Some(center),
            None => self.resolve_base(fetcher, &region).await,
        };
        let Some(base) = base else {
            log::info!("Could not resolve a location for '{}'", region);
            return RecommendationResult::empty(None);
        };
        let weather = self.weather_at(base).await;
        let categories = filter.effective_categories();

        let region_given = !filter.region.trim().is_empty() || !filter.sub_regions.is_empty();
        let centers = if center.is_some() && !region_given {
            vec![base]
        } else {
            fetcher.resolve_centers(&region, base).await
        };
        let plan = FetchPlan {
            radius_meters: self.config.search_radius_meters,
            size_per_call: self.config.ai_size_per_category,
            max_pages: self.config.ai_max_pages,
            global_cap: None,
        };
        let raw = fetcher.fetch(&categories, &centers, &plan).await;
        let filtered = apply_content_filters(raw, &region);
        if filtered.is_empty() {
            return RecommendationResult::empty(weather);
        }

        let region_hint = split_multi_regions(&region).into_iter().next();
        let enriched = match &self.popularity {
            Some(lookup) => enrich_popularity(filtered, lookup.as_ref(), region_hint.as_deref()).await,
            None => filtered,
        };

        let shortlist_size = self.config.popularity_top_n.min(self.config.rerank_max_candidates);
        let shortlist = pick_top_by_popularity(&enriched, shortlist_size);

        let mut rerank_filter = filter.clone();
        rerank_filter.region.clear();
        rerank_filter.sub_regions.clear();
        let outcome = match &self.reranker {
            Some(reranker) => reranker.rerank(&rerank_filter, weather.as_ref(), &shortlist).await,
            None => RerankOutcome {
                places: shortlist,
                ..Default::default()
            },
        };

        let shaped = self.shape(outcome.places.clone(), &region, &categories, base);
        let reasons = self.ai_reasons(&shaped.places, &outcome, filter, weather.as_ref());
        let final_ids: HashSet<&str> = shaped.places.iter().map(|p| p.id.as_str()).collect();
        let ai_top_ids = outcome
            .top_ids
            .iter()
            .filter(|id| final_ids.contains(id.as_str()))
            .cloned()
            .collect();

        log::info!(
            "AI recommended {} places for '{}' (ai_used={})",
            shaped.places.len(),
            region,
            outcome.ai_used
        );

        RecommendationResult {
            places: shaped.places,
            weather,
            reasons,
            ai_top_ids,
            top_picks: shaped.top_picks,
        }
    }

    fn ai_reasons(
        &self,
        places: &[Place],
        outcome: &RerankOutcome,
        filter: &FilterState,
        weather: Option<&WeatherInfo>,
    ) -> HashMap<String, String> {
        let total = places.len();
        places
            .iter()
            .enumerate()
            .map(|(index, place)| {
                let detail = outcome.reasons.get(&place.id).map(String::as_str);
                let ai_level = self.reranker.as_ref().map(|_| {
                    self.fit_rules
                        .adjust_ai_fit_by_text(self.fit_rules.ai_fit_by_rank(index, total), detail)
                });
                let line = summary_line(
                    self.fit_rules.weather_fit(place.category, weather),
                    self.fit_rules.companion_fit(place, filter.companion),
                    ai_level,
                );
                let reason = match detail {
                    Some(detail) => format!("{}\n{}", line, detail),
                    None => line,
                };
                (place.id.clone(), reason)
            })
            .collect()
    }

    fn shape(
        &self,
        ordered: Vec<Place>,
        region: &str,
        categories: &BTreeSet<Category>,
        base: LatLng,
    ) -> ShapedList {
        let config = &self.config;
        let balanced = rebalance_by_category(&ordered, categories, config.category_quota());

        let multi_region = has_multi_regions(region);
        let by_neighborhood = if multi_region {
            rebalance_by_neighborhood(
                &balanced.places,
                region,
                config.min_per_neighborhood,
                config.max_list_results,
            )
        } else {
            balanced.places
        };

        let nearby = if !multi_region && is_fine_grained_region(region) {
            let near: Vec<Place> = by_neighborhood
                .iter()
                .filter(|p| haversine_meters(base, p.location()) <= config.fine_region_max_distance_meters)
                .cloned()
                .collect();
            if near.is_empty() {
                by_neighborhood.clone()
            } else {
                near
            }
        } else {
            by_neighborhood.clone()
        };

        let spread = spread_out_by_category(
            &nearby,
            categories,
            config.min_per_category,
            config.min_spread_distance_meters,
        );
        let mut places = backfill_to_min(spread, &nearby, config.min_list_results);
        places = backfill_to_min(places, &by_neighborhood, config.min_list_results);
        places.truncate(config.max_list_results);

        log::debug!(
            "Shaped {} -> {} places ({} after neighborhoods, {} nearby)",
            ordered.len(),
            places.len(),
            by_neighborhood.len(),
            nearby.len()
        );

        let top_picks = top_pick_per_category(&places, categories);
        ShapedList { places, top_picks }
    }
}
