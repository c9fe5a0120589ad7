use crate::models::place::{Category, LatLng, Place};
use crate::services::geo::{
    build_search_centers, filter_by_city, filter_by_district, is_fine_grained_region,
    split_multi_regions,
};
use crate::services::place_search_service::{Geocoder, PlaceSearch};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Name fragments of places that never make a good recommendation: public offices, institutional
/// cafeterias and chain brands.
pub const BANNED_KEYWORDS: &[&str] = &[
    "시청",
    "구청",
    "군청",
    "청사",
    "법원",
    "공무원",
    "구내식당",
    "사내식당",
    "공무원연금",
    "스타벅스",
    "starbucks",
    "이디야",
    "ediya",
    "투썸플레이스",
    "투썸",
    "메가커피",
    "메가mgc",
    "빽다방",
    "폴바셋",
    "paul bassett",
    "커피빈",
    "coffeebean",
    "할리스",
    "할리스커피",
    "hollys",
    "엔제리너스",
    "파스쿠찌",
    "탐앤탐스",
    "던킨",
    "던킨도너츠",
    "dunkin",
    "배스킨라빈스",
    "배스킨",
    "br31",
    "맥도날드",
    "맥날",
    "mcdonald",
    "롯데리아",
    "버거킹",
    "kfc",
    "맘스터치",
    "서브웨이",
    "subway",
];

pub fn is_banned(place: &Place) -> bool {
    let text = format!("{} {}", place.name, place.category.as_str()).to_lowercase();
    BANNED_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// Banned keywords first, then city, then district.
pub fn apply_content_filters(places: Vec<Place>, region: &str) -> Vec<Place> {
    let allowed: Vec<Place> = places.into_iter().filter(|p| !is_banned(p)).collect();
    let by_city = filter_by_city(allowed, region);
    filter_by_district(by_city, region)
}

/// How much to ask the search collaborator for.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub radius_meters: u32,
    pub size_per_call: u32,
    pub max_pages: u32,
    /// Stop merging once this many unique places were collected.
    pub global_cap: Option<usize>,
}

pub struct CandidateFetcher {
    search: Arc<dyn PlaceSearch>,
    geocoder: Arc<dyn Geocoder>,
    center_delta: f64,
}

impl CandidateFetcher {
    pub fn new(search: Arc<dyn PlaceSearch>, geocoder: Arc<dyn Geocoder>, center_delta: f64) -> Self {
        Self {
            search,
            geocoder,
            center_delta,
        }
    }

    /// Geocodes `query`, treating collaborator failures as "not found".
    pub async fn geocode(&self, query: &str) -> Option<LatLng> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        match self.geocoder.geocode(query).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Geocoding '{}' failed: {}", query, e);
                None
            }
        }
    }

    fn region_centers(&self, region: &str, base: LatLng) -> Vec<LatLng> {
        if is_fine_grained_region(region) {
            vec![base]
        } else {
            build_search_centers(base, self.center_delta)
        }
    }

    /// Search centers for a region. A single token yields one center when fine grained and five
    /// otherwise; several tokens are geocoded one by one, retrying with the token's last word.
    pub async fn resolve_centers(&self, region: &str, base: LatLng) -> Vec<LatLng> {
        let tokens = split_multi_regions(region);
        if tokens.len() <= 1 {
            return self.region_centers(region, base);
        }

        let mut centers = Vec::new();
        for token in &tokens {
            let mut found = self.geocode(token).await;
            if found.is_none() {
                if let Some(tail) = token.split_whitespace().last().filter(|t| *t != token.as_str()) {
                    found = self.geocode(tail).await;
                }
            }
            match found {
                Some(center) => centers.push(center),
                None => log::debug!("No center for region token '{}'", token),
            }
        }

        if centers.is_empty() {
            self.region_centers(region, base)
        } else {
            centers
        }
    }

    /// Runs every (category, center) search and merges the results by id, first seen wins.
    pub async fn fetch(
        &self,
        categories: &BTreeSet<Category>,
        centers: &[LatLng],
        plan: &FetchPlan,
    ) -> Vec<Place> {
        let mut merged: Vec<Place> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for category in categories {
            for center in centers {
                let found = match self
                    .search
                    .search_category(
                        *category,
                        *center,
                        plan.radius_meters,
                        plan.size_per_call,
                        plan.max_pages,
                    )
                    .await
                {
                    Ok(found) => found,
                    Err(e) => {
                        log::warn!("Place search for {} failed: {}", category, e);
                        continue;
                    }
                };

                for place in found {
                    if seen.insert(place.id.clone()) {
                        merged.push(place);
                    }
                    if plan.global_cap.is_some_and(|cap| merged.len() >= cap) {
                        log::debug!("Candidate cap reached with {} places", merged.len());
                        return merged;
                    }
                }
            }
        }

        log::debug!("Fetched {} unique candidates", merged.len());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(name: &str, address: &str) -> Place {
        Place {
            id: name.to_string(),
            name: name.to_string(),
            category: Category::Cafe,
            lat: 37.5,
            lng: 127.0,
            distance_meters: None,
            rating: None,
            address: Some(address.to_string()),
            score: None,
            popularity_count: None,
            popularity_score: None,
        }
    }

    #[test]
    fn banned_keywords_match_case_insensitively() {
        assert!(is_banned(&place("STARBUCKS 성수점", "")));
        assert!(is_banned(&place("마포구청 구내식당", "")));
        assert!(!is_banned(&place("어니언 성수", "")));
    }

    #[test]
    fn city_and_district_filters_skip_when_they_would_empty_the_list() {
        let places = vec![
            place("a", "서울 성동구 성수동"),
            place("b", "서울 마포구 연남동"),
            place("c", "경기 성남시"),
        ];
        let kept = apply_content_filters(places.clone(), "서울 성동구");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");

        let kept = apply_content_filters(places, "서울 종로구");
        let ids: Vec<&str> = kept.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
