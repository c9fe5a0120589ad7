//! List shaping after ranking: category quotas, neighborhood quotas, spatial spread and backfill.
//!
//! Every function takes the ranked list by reference and returns a new list.

use crate::models::place::{Category, Place};
use crate::services::geo::{distance_between, extract_neighborhood_keywords};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct CategoryQuota {
    pub min_per_category: usize,
    pub top_per_category: usize,
    pub total_cap: usize,
    pub distance_bonus_scale: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryRebalance {
    /// Best place of each category, in category order.
    pub top_picks: Vec<Place>,
    /// Top picks followed by the balanced body.
    pub places: Vec<Place>,
}

/// Higher fused score first; equal scores keep input order.
fn sort_by_fused_score(items: &mut [(usize, Place)], distance_bonus_scale: f64) {
    items.sort_by(|(ia, a), (ib, b)| {
        b.fused_score(distance_bonus_scale)
            .partial_cmp(&a.fused_score(distance_bonus_scale))
            .unwrap_or(Ordering::Equal)
            .then(ia.cmp(ib))
    });
}

/// Guarantees each selected category its minimum share while following the fused-score order.
///
/// Phases: one top pick per category, round-robin until each category has `min_per_category`
/// more places, then the remaining places by fused score without repeating the previous category
/// where possible. The result never exceeds `total_cap`.
pub fn rebalance_by_category(
    candidates: &[Place],
    selected: &BTreeSet<Category>,
    quota: CategoryQuota,
) -> CategoryRebalance {
    let cap = quota.total_cap;
    let mut seen: HashSet<String> = HashSet::new();
    let filtered: Vec<(usize, &Place)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, p)| selected.contains(&p.category))
        .filter(|(_, p)| seen.insert(p.id.clone()))
        .collect();

    let mut pools: Vec<(Category, VecDeque<(usize, Place)>)> = selected
        .iter()
        .map(|category| {
            let mut group: Vec<(usize, Place)> = filtered
                .iter()
                .filter(|(_, p)| p.category == *category)
                .map(|(i, p)| (*i, (*p).clone()))
                .collect();
            sort_by_fused_score(&mut group, quota.distance_bonus_scale);
            (*category, group.into())
        })
        .collect();

    let mut top_picks: Vec<Place> = Vec::new();
    for (_, pool) in pools.iter_mut() {
        for _ in 0..quota.top_per_category {
            if top_picks.len() >= cap {
                break;
            }
            if let Some((_, place)) = pool.pop_front() {
                top_picks.push(place);
            }
        }
    }

    // Top picks do not count toward the minimum.
    let mut counts: HashMap<Category, usize> = HashMap::new();

    let mut body: Vec<Place> = Vec::new();
    'round_robin: loop {
        let mut progressed = false;
        for (category, pool) in pools.iter_mut() {
            if top_picks.len() + body.len() >= cap {
                break 'round_robin;
            }
            let count = counts.entry(*category).or_default();
            if *count < quota.min_per_category {
                if let Some((_, place)) = pool.pop_front() {
                    body.push(place);
                    *count += 1;
                    progressed = true;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    let mut remaining: Vec<(usize, Place)> = pools.into_iter().flat_map(|(_, pool)| pool).collect();
    sort_by_fused_score(&mut remaining, quota.distance_bonus_scale);

    let mut last_category = body.last().or(top_picks.last()).map(|p| p.category);
    let mut deferred: Vec<Place> = Vec::new();
    for (_, place) in remaining {
        if top_picks.len() + body.len() >= cap {
            break;
        }
        if last_category == Some(place.category) {
            deferred.push(place);
            continue;
        }
        last_category = Some(place.category);
        body.push(place);
    }
    for place in deferred {
        if top_picks.len() + body.len() >= cap {
            break;
        }
        body.push(place);
    }

    let mut places = top_picks.clone();
    places.extend(body);
    CategoryRebalance { top_picks, places }
}

/// Gives each requested neighborhood up to `min_per_neighborhood` places before filling the rest
/// in ranked order. Without neighborhood keywords in `region` the input is returned unchanged.
pub fn rebalance_by_neighborhood(
    ordered: &[Place],
    region: &str,
    min_per_neighborhood: usize,
    total_cap: usize,
) -> Vec<Place> {
    let keywords = extract_neighborhood_keywords(region);
    if keywords.is_empty() {
        return ordered.to_vec();
    }

    let mut buckets: Vec<Vec<&Place>> = vec![Vec::new(); keywords.len()];
    for place in ordered {
        let address = place.address_or_empty();
        if let Some(index) = keywords.iter().position(|kw| address.contains(kw.as_str())) {
            buckets[index].push(place);
        }
    }

    let mut picked: Vec<Place> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for bucket in &buckets {
        for place in bucket.iter().take(min_per_neighborhood) {
            if picked.len() >= total_cap {
                break;
            }
            if seen.insert(place.id.as_str()) {
                picked.push((*place).clone());
            }
        }
    }

    for place in ordered {
        if picked.len() >= total_cap {
            break;
        }
        if seen.insert(place.id.as_str()) {
            picked.push(place.clone());
        }
    }
    picked
}

/// Drops places within `min_distance_meters` of an already accepted place, except while their
/// category is still short of `min_per_category`.
pub fn spread_out_by_category(
    ordered: &[Place],
    selected: &BTreeSet<Category>,
    min_per_category: usize,
    min_distance_meters: f64,
) -> Vec<Place> {
    let mut accepted: Vec<Place> = Vec::new();
    let mut counts: HashMap<Category, usize> = HashMap::new();

    for place in ordered {
        let needed = if selected.contains(&place.category) {
            min_per_category
        } else {
            0
        };
        let count = counts.get(&place.category).copied().unwrap_or(0);
        let too_close = accepted
            .iter()
            .any(|a| distance_between(a, place) < min_distance_meters);

        if count < needed || !too_close {
            *counts.entry(place.category).or_default() += 1;
            accepted.push(place.clone());
        }
    }
    accepted
}

/// Tops `current` up to `min_total` from `pool`, skipping ids already present.
pub fn backfill_to_min(mut current: Vec<Place>, pool: &[Place], min_total: usize) -> Vec<Place> {
    if current.len() >= min_total {
        return current;
    }
    let mut present: HashSet<String> = current.iter().map(|p| p.id.clone()).collect();
    for place in pool {
        if current.len() >= min_total {
            break;
        }
        if present.insert(place.id.clone()) {
            current.push(place.clone());
        }
    }
    current
}

/// First place of each category in ranked order.
pub fn top_pick_per_category(ordered: &[Place], selected: &BTreeSet<Category>) -> Vec<Place> {
    selected
        .iter()
        .filter_map(|category| ordered.iter().find(|p| p.category == *category).cloned())
        .collect()
}
