mod common;

use std::collections::{BTreeSet, HashMap, HashSet};

use common::{place, places_along};
use trip_curator_api::models::place::{Category, Place};
use trip_curator_api::services::geo::distance_between;
use trip_curator_api::services::rebalance::{
    backfill_to_min, rebalance_by_category, rebalance_by_neighborhood, spread_out_by_category,
    top_pick_per_category, CategoryQuota,
};

fn quota(min_per_category: usize, total_cap: usize) -> CategoryQuota {
    CategoryQuota {
        min_per_category,
        top_per_category: 1,
        total_cap,
        distance_bonus_scale: 50.0,
    }
}

fn ranked(id: &str, category: Category, score: i32) -> Place {
    let mut p = place(id, category, 37.5665, 126.978);
    p.score = Some(score);
    p
}

fn count_by_category(places: &[Place]) -> HashMap<Category, usize> {
    let mut counts = HashMap::new();
    for p in places {
        *counts.entry(p.category).or_insert(0) += 1;
    }
    counts
}

#[test]
fn small_example_keeps_everything_and_covers_each_category_first() {
    let candidates = vec![
        ranked("A", Category::Food, 100),
        ranked("B", Category::Cafe, 99),
        ranked("C", Category::Food, 98),
        ranked("D", Category::Photo, 97),
    ];
    let selected = BTreeSet::from([Category::Food, Category::Cafe, Category::Photo]);

    let result = rebalance_by_category(&candidates, &selected, quota(1, 4));

    assert_eq!(result.places.len(), 4);
    let head: HashSet<Category> = result.places[..3].iter().map(|p| p.category).collect();
    assert_eq!(head, selected.iter().copied().collect::<HashSet<Category>>());
    assert_eq!(result.places[3].id, "C");
    assert_eq!(result.top_picks.len(), 3);
}

#[test]
fn cap_is_never_exceeded_and_minimums_are_met() {
    let mut candidates = Vec::new();
    for i in 0..12 {
        candidates.push(ranked(&format!("f{}", i), Category::Food, 100 - i));
    }
    for i in 0..4 {
        candidates.push(ranked(&format!("c{}", i), Category::Cafe, 60 - i));
    }
    for i in 0..2 {
        candidates.push(ranked(&format!("s{}", i), Category::Shopping, 40 - i));
    }
    let selected = BTreeSet::from([Category::Food, Category::Cafe, Category::Shopping]);

    for cap in [5, 9, 10, 20] {
        let result = rebalance_by_category(&candidates, &selected, quota(3, cap));
        assert!(result.places.len() <= cap, "cap {} gave {}", cap, result.places.len());

        if cap >= 9 {
            let counts = count_by_category(&result.places);
            assert!(counts[&Category::Food] >= 3);
            assert!(counts[&Category::Cafe] >= 3);
            // only two shopping candidates exist
            assert_eq!(counts[&Category::Shopping], 2);
        }

        let unique: HashSet<&str> = result.places.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(unique.len(), result.places.len());
    }
}

#[test]
fn minimum_is_guaranteed_on_top_of_the_top_pick() {
    let candidates = vec![
        ranked("F0", Category::Food, 100),
        ranked("C0", Category::Cafe, 99),
        ranked("F1", Category::Food, 98),
        ranked("C1", Category::Cafe, 97),
        ranked("F2", Category::Food, 96),
        ranked("C2", Category::Cafe, 95),
        ranked("F3", Category::Food, 94),
        ranked("C3", Category::Cafe, 93),
        ranked("P0", Category::Photo, 10),
        ranked("P1", Category::Photo, 9),
        ranked("P2", Category::Photo, 8),
    ];
    let selected = BTreeSet::from([Category::Food, Category::Cafe, Category::Photo]);

    let result = rebalance_by_category(&candidates, &selected, quota(2, 9));
    let ids: Vec<&str> = result.places.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["F0", "C0", "P0", "F1", "C1", "P1", "F2", "C2", "P2"]);
    assert_eq!(count_by_category(&result.places)[&Category::Photo], 3);
}

#[test]
fn unselected_categories_are_dropped() {
    let candidates = vec![
        ranked("A", Category::Food, 90),
        ranked("N", Category::Night, 99),
        ranked("B", Category::Food, 80),
    ];
    let result = rebalance_by_category(&candidates, &BTreeSet::from([Category::Food]), quota(3, 10));
    let ids: Vec<&str> = result.places.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn higher_score_wins_over_a_closer_place() {
    let mut near = ranked("near", Category::Cafe, 98);
    near.distance_meters = Some(0);
    let mut far = ranked("far", Category::Cafe, 99);
    far.distance_meters = Some(7_000);

    let result = rebalance_by_category(&[near, far], &BTreeSet::from([Category::Cafe]), quota(1, 5));
    assert_eq!(result.places[0].id, "far");
}

#[test]
fn spread_skips_close_places_once_quota_is_met() {
    let ordered = places_along("p", Category::Photo, 8, 600.0);
    let selected = BTreeSet::from([Category::Photo]);

    let spread = spread_out_by_category(&ordered, &selected, 2, 1500.0);
    let ids: Vec<&str> = spread.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p1", "p4", "p7"]);

    // beyond the first two, every accepted place keeps its distance from all earlier ones
    for (i, later) in spread.iter().enumerate().skip(2) {
        for earlier in &spread[..i] {
            assert!(distance_between(earlier, later) >= 1500.0);
        }
    }
}

#[test]
fn backfill_tops_up_without_duplicates() {
    let pool = places_along("p", Category::Food, 8, 100.0);
    let current = vec![pool[0].clone(), pool[3].clone()];

    let filled = backfill_to_min(current, &pool, 5);
    let ids: Vec<&str> = filled.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p3", "p1", "p2", "p4"]);

    let untouched = backfill_to_min(pool.clone(), &pool, 3);
    assert_eq!(untouched.len(), 8);
}

#[test]
fn neighborhoods_each_get_their_share() {
    let mut ordered = Vec::new();
    for i in 0..5 {
        let mut p = place(&format!("s{}", i), Category::Food, 37.54, 127.05);
        p.address = Some("서울 성동구 성수동2가".to_string());
        ordered.push(p);
    }
    for i in 0..3 {
        let mut p = place(&format!("y{}", i), Category::Food, 37.56, 126.92);
        p.address = Some("서울 마포구 연남동".to_string());
        ordered.push(p);
    }

    let balanced = rebalance_by_neighborhood(&ordered, "서울 성수동, 연남동", 2, 6);
    let ids: Vec<&str> = balanced.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["s0", "s1", "y0", "y1", "s2", "s3"]);
}

#[test]
fn top_pick_is_the_first_of_each_category() {
    let ordered = vec![
        ranked("A", Category::Cafe, 10),
        ranked("B", Category::Food, 9),
        ranked("C", Category::Cafe, 8),
    ];
    let picks = top_pick_per_category(&ordered, &BTreeSet::from([Category::Food, Category::Cafe]));
    let ids: Vec<&str> = picks.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "A"]);
}
