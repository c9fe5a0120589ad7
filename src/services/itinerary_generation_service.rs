//! Itinerary Generation Service
//!
//! Assigns recommended places to days and time slots.
//!
//! The language model is asked for a complete day-by-day plan first. If the call fails or the
//! answer cannot be used, a deterministic planner fills each day window by window:
//!
//! | Window    | Time          | Queue order            |
//! |-----------|---------------|------------------------|
//! | Morning   | start - 12:00 | other, food*, cafe     |
//! | Lunch     | 12:00 - 13:00 | food, else meal slot   |
//! | Afternoon | 13:00 - 18:00 | other, cafe, food      |
//! | Dinner    | 18:00 - 19:00 | food, else meal slot   |
//! | Night     | 19:00 - end   | night, cafe, food      |
//!
//! (*) food only before 11:00. Lodging is never scheduled. A place is used at most once per trip.

use crate::models::filter::FilterState;
use crate::models::itinerary::{hhmm, ActivityKind, DaySchedule, TimeSlot};
use crate::models::place::{Category, Place};
use crate::services::completion_service::{parse_json_object, CompletionPort};
use crate::services::place_search_service::PlaceSearch;
use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::fmt::{self, Write};
use std::sync::Arc;

const MEAL_DURATION_MINUTES: u32 = 60;
const MINUTES_PER_DAY: i64 = 24 * 60;
const MANDATORY_PLACE_SEARCH_RADIUS: u32 = 20_000;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn minutes_of(time: NaiveTime) -> i64 {
    (time.hour() * 60 + time.minute()) as i64
}

fn time_at(minutes: i64) -> NaiveTime {
    NaiveTime::default() + Duration::minutes(minutes.rem_euclid(24 * 60))
}

/// How long a visit of each category takes.
pub fn visit_duration_minutes(category: Category) -> u32 {
    match category {
        Category::Food => 60,
        Category::Cafe => 45,
        Category::Culture | Category::Experience => 75,
        Category::Photo => 45,
        Category::Healing | Category::Shopping => 60,
        Category::Night => 60,
        Category::Stay => 0,
    }
}

#[derive(Debug, Clone)]
pub struct ItineraryConfig {
    pub default_start: NaiveTime,
    pub default_end: NaiveTime,
    pub last_day_end_override: Option<NaiveTime>,
    pub gap_minutes: u32,
    pub auto_add_meals: bool,
}

impl Default for ItineraryConfig {
    fn default() -> Self {
        Self {
            default_start: hm(10, 0),
            default_end: hm(21, 30),
            last_day_end_override: None,
            gap_minutes: 10,
            auto_add_meals: true,
        }
    }
}

impl ItineraryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let time_var = |key: &str| std::env::var(key).ok().and_then(|s| hhmm::parse(&s));

        Self {
            default_start: time_var("ITINERARY_DAY_START").unwrap_or(defaults.default_start),
            default_end: time_var("ITINERARY_DAY_END").unwrap_or(defaults.default_end),
            last_day_end_override: time_var("ITINERARY_LAST_DAY_END")
                .or(defaults.last_day_end_override),
            gap_minutes: std::env::var("ITINERARY_GAP_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gap_minutes),
            auto_add_meals: std::env::var("ITINERARY_AUTO_ADD_MEALS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.auto_add_meals),
        }
    }

    /// Day 1 never starts before the configured start, nor before `now`.
    pub fn effective_start(&self, now: NaiveTime) -> NaiveTime {
        let now = time_at(minutes_of(now));
        now.max(self.default_start)
    }
}

/// Per-request overrides of [`ItineraryConfig`].
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub auto_add_meals: Option<bool>,
    pub last_day_end: Option<NaiveTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub days: Vec<DaySchedule>,
    pub source: PlanSource,
}

/// Everything one generation run needs, resolved from config and options.
#[derive(Debug, Clone)]
struct DayFrame {
    day_count: u32,
    first_day_start: NaiveTime,
    day_start: NaiveTime,
    day_end: NaiveTime,
    last_day_end: NaiveTime,
    gap_minutes: u32,
    auto_add_meals: bool,
}

impl DayFrame {
    fn start_of(&self, day: u32) -> NaiveTime {
        if day == 1 {
            self.first_day_start
        } else {
            self.day_start
        }
    }

    fn end_of(&self, day: u32) -> NaiveTime {
        if day == self.day_count {
            self.last_day_end
        } else {
            self.day_end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueKind {
    Food,
    Cafe,
    Night,
    Other,
}

#[derive(Debug, Default)]
struct PlaceQueues {
    food: VecDeque<Place>,
    cafe: VecDeque<Place>,
    night: VecDeque<Place>,
    other: VecDeque<Place>,
}

impl PlaceQueues {
    fn new(places: &[Place]) -> Self {
        let mut queues = Self::default();
        let mut seen = HashSet::new();
        for place in places {
            if place.category == Category::Stay || !seen.insert(place.id.clone()) {
                continue;
            }
            match place.category {
                Category::Food => queues.food.push_back(place.clone()),
                Category::Cafe => queues.cafe.push_back(place.clone()),
                Category::Night => queues.night.push_back(place.clone()),
                _ => queues.other.push_back(place.clone()),
            }
        }
        queues
    }

    fn queue(&mut self, kind: QueueKind) -> &mut VecDeque<Place> {
        match kind {
            QueueKind::Food => &mut self.food,
            QueueKind::Cafe => &mut self.cafe,
            QueueKind::Night => &mut self.night,
            QueueKind::Other => &mut self.other,
        }
    }
}

fn fill_visit_window(
    slots: &mut Vec<TimeSlot>,
    queues: &mut PlaceQueues,
    (start, end): (i64, i64),
    order: &[QueueKind],
    food_until: Option<i64>,
    gap_minutes: u32,
) {
    let mut cursor = start;
    loop {
        let next = order.iter().copied().find(|kind| {
            let food_closed = *kind == QueueKind::Food && food_until.is_some_and(|limit| cursor >= limit);
            !food_closed && !queues.queue(*kind).is_empty()
        });
        let Some(kind) = next else {
            break;
        };
        let Some(place) = queues.queue(kind).pop_front() else {
            break;
        };

        let duration = visit_duration_minutes(place.category);
        let finish = cursor + duration as i64;
        if finish > end {
            queues.queue(kind).push_front(place);
            break;
        }
        slots.push(TimeSlot::visit(time_at(cursor), duration, place));
        cursor = finish + gap_minutes as i64;
    }
}

fn fill_meal_window(
    slots: &mut Vec<TimeSlot>,
    queues: &mut PlaceQueues,
    (start, end): (i64, i64),
    auto_add_meals: bool,
) {
    if start + MEAL_DURATION_MINUTES as i64 > end {
        return;
    }
    if let Some(place) = queues.food.pop_front() {
        slots.push(TimeSlot::visit(time_at(start), MEAL_DURATION_MINUTES, place));
    } else if auto_add_meals {
        slots.push(TimeSlot::meal(time_at(start), MEAL_DURATION_MINUTES));
    }
}

/// Deterministic day planner used when the language model is unavailable or unusable.
fn plan_fallback(places: &[Place], frame: &DayFrame) -> Vec<DaySchedule> {
    let mut queues = PlaceQueues::new(places);
    let morning_end = minutes_of(hm(12, 0));
    let lunch_end = minutes_of(hm(13, 0));
    let afternoon_end = minutes_of(hm(18, 0));
    let dinner_end = minutes_of(hm(19, 0));
    let food_cutoff = minutes_of(hm(11, 0));

    (1..=frame.day_count)
        .map(|day| {
            let day_start = minutes_of(frame.start_of(day));
            let day_end = minutes_of(frame.end_of(day));
            let window = |from: i64, to: i64| (from.max(day_start), to.min(day_end));
            let mut slots = Vec::new();

            fill_visit_window(
                &mut slots,
                &mut queues,
                window(day_start, morning_end),
                &[QueueKind::Other, QueueKind::Food, QueueKind::Cafe],
                Some(food_cutoff),
                frame.gap_minutes,
            );
            fill_meal_window(
                &mut slots,
                &mut queues,
                window(morning_end, lunch_end),
                frame.auto_add_meals,
            );
            fill_visit_window(
                &mut slots,
                &mut queues,
                window(lunch_end, afternoon_end),
                &[QueueKind::Other, QueueKind::Cafe, QueueKind::Food],
                None,
                frame.gap_minutes,
            );
            fill_meal_window(
                &mut slots,
                &mut queues,
                window(afternoon_end, dinner_end),
                frame.auto_add_meals,
            );
            fill_visit_window(
                &mut slots,
                &mut queues,
                window(dinner_end, day_end),
                &[QueueKind::Night, QueueKind::Cafe, QueueKind::Food],
                None,
                frame.gap_minutes,
            );

            DaySchedule { day, slots }
        })
        .collect()
}

/// Recomputes every slot's times top to bottom, keeping slot order, ids and durations.
///
/// Starts at `start_from`, or at the first slot's current start time.
pub fn resequence_day(day: &DaySchedule, start_from: Option<NaiveTime>, gap_minutes: u32) -> DaySchedule {
    let Some(first) = day.slots.first() else {
        return day.clone();
    };
    let mut cursor = start_from.unwrap_or(first.start_time);
    let slots = day
        .slots
        .iter()
        .map(|slot| {
            let mut slot = slot.clone();
            slot.start_time = cursor;
            slot.end_time = cursor + Duration::minutes(slot.duration_min as i64);
            cursor = slot.end_time + Duration::minutes(gap_minutes as i64);
            slot
        })
        .collect();
    DaySchedule { day: day.day, slots }
}

/// True when resequencing from `start_from` ends the last slot before midnight.
pub fn fits_before_midnight(day: &DaySchedule, start_from: Option<NaiveTime>, gap_minutes: u32) -> bool {
    let Some(first) = day.slots.first() else {
        return true;
    };
    let mut cursor = minutes_of(start_from.unwrap_or(first.start_time));
    for (index, slot) in day.slots.iter().enumerate() {
        if index > 0 {
            cursor += gap_minutes as i64;
        }
        cursor += slot.duration_min as i64;
        if cursor >= MINUTES_PER_DAY {
            return false;
        }
    }
    true
}

/// Resequences like [`resequence_day`], dropping trailing slots that would end past midnight.
pub fn resequence_within_day(
    day: &DaySchedule,
    start_from: Option<NaiveTime>,
    gap_minutes: u32,
) -> DaySchedule {
    let mut kept = day.clone();
    while !fits_before_midnight(&kept, start_from, gap_minutes) {
        kept.slots.pop();
    }
    if kept.slots.len() < day.slots.len() {
        log::debug!(
            "Dropped {} slots running past midnight on day {}",
            day.slots.len() - kept.slots.len(),
            day.day
        );
    }
    resequence_day(&kept, start_from, gap_minutes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEditError {
    SlotNotFound,
    PastMidnight,
}

impl fmt::Display for SlotEditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotEditError::SlotNotFound => write!(f, "Slot not found"),
            SlotEditError::PastMidnight => write!(f, "The day would run past midnight"),
        }
    }
}

impl std::error::Error for SlotEditError {}

/// Changes one slot's duration and resequences the day.
pub fn with_slot_duration(
    day: &DaySchedule,
    slot_id: &str,
    duration_min: u32,
    gap_minutes: u32,
) -> Result<DaySchedule, SlotEditError> {
    let mut edited = day.clone();
    let slot = edited
        .slots
        .iter_mut()
        .find(|s| s.id == slot_id)
        .ok_or(SlotEditError::SlotNotFound)?;
    slot.duration_min = duration_min;
    if !fits_before_midnight(&edited, None, gap_minutes) {
        return Err(SlotEditError::PastMidnight);
    }
    Ok(resequence_day(&edited, None, gap_minutes))
}

#[derive(Debug, Deserialize)]
struct PlanDay {
    #[serde(default)]
    slots: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PlanSlot {
    #[serde(default, deserialize_with = "deserialize_lenient_u32")]
    place_id: Option<u32>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_u32")]
    duration_min: Option<u32>,
    #[serde(default)]
    activity: Option<String>,
}

// Models sometimes quote numbers or send floats.
fn deserialize_lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Turns a model answer into day schedules, or `None` when nothing usable came back.
///
/// Slots pointing at unknown or already used places are dropped, as are MEAL slots unless meals
/// are wanted and slots without a readable start time.
fn parse_llm_plan(raw: &str, places: &[Place], frame: &DayFrame) -> Option<Vec<DaySchedule>> {
    let map = parse_json_object(raw);
    let Some(Value::Array(raw_days)) = map.get("days") else {
        return None;
    };
    if raw_days.is_empty() {
        return None;
    }

    let mut used: HashSet<String> = HashSet::new();
    let mut visits = 0usize;
    let mut days: Vec<DaySchedule> = Vec::new();

    for (index, raw_day) in raw_days.iter().take(frame.day_count as usize).enumerate() {
        let Ok(plan_day) = serde_json::from_value::<PlanDay>(raw_day.clone()) else {
            continue;
        };
        let mut slots: Vec<TimeSlot> = Vec::new();

        for raw_slot in plan_day.slots {
            let Ok(plan_slot) = serde_json::from_value::<PlanSlot>(raw_slot) else {
                continue;
            };
            let Some(start) = plan_slot.start_time.as_deref().and_then(hhmm::parse) else {
                continue;
            };
            let activity = plan_slot
                .activity
                .as_deref()
                .and_then(ActivityKind::parse)
                .unwrap_or(ActivityKind::Visit);

            match activity {
                ActivityKind::Visit => {
                    let Some(place_index) = plan_slot.place_id.map(|id| id as usize) else {
                        continue;
                    };
                    let Some(place) = places.get(place_index) else {
                        continue;
                    };
                    if place.category == Category::Stay || !used.insert(place.id.clone()) {
                        continue;
                    }
                    let duration = plan_slot
                        .duration_min
                        .filter(|d| *d > 0)
                        .unwrap_or_else(|| visit_duration_minutes(place.category));
                    slots.push(TimeSlot::visit(start, duration, place.clone()));
                    visits += 1;
                }
                ActivityKind::Meal => {
                    if frame.auto_add_meals {
                        let duration = plan_slot.duration_min.unwrap_or(MEAL_DURATION_MINUTES);
                        slots.push(TimeSlot::meal(start, duration));
                    }
                }
                ActivityKind::Transport => {
                    let duration = plan_slot.duration_min.unwrap_or(0);
                    slots.push(TimeSlot::new(start, duration, None, ActivityKind::Transport));
                }
            }
        }

        slots.sort_by_key(|s| s.start_time);
        days.push(DaySchedule {
            day: index as u32 + 1,
            slots,
        });
    }

    if visits == 0 && places.iter().any(|p| p.category != Category::Stay) {
        return None;
    }
    while (days.len() as u32) < frame.day_count {
        days.push(DaySchedule {
            day: days.len() as u32 + 1,
            slots: Vec::new(),
        });
    }
    Some(days)
}

fn build_plan_prompt(places: &[Place], filter: &FilterState, frame: &DayFrame) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Plan a {}-day trip itinerary.\n", frame.day_count);

    prompt.push_str("[Conditions]\n");
    let region = match filter.region.trim() {
        "" => "-",
        region => region,
    };
    let _ = writeln!(prompt, "- region: {}", region);
    let _ = writeln!(prompt, "- companion: {}", filter.companion.as_str());
    let _ = writeln!(prompt, "- party size: {}", filter.number_of_people);
    let _ = writeln!(prompt, "- budget per person: {} KRW", filter.budget_per_person);
    if let Some(mandatory) = filter.mandatory_place_name() {
        let _ = writeln!(prompt, "- must include: {}", mandatory);
    }
    if !filter.extra_note.trim().is_empty() {
        let _ = writeln!(prompt, "- note: {}", filter.extra_note.trim());
    }

    prompt.push_str("\n[Time rules]\n");
    let _ = writeln!(prompt, "- Day 1 starts at {}.", hhmm::format(&frame.first_day_start));
    if frame.day_count > 1 {
        let _ = writeln!(prompt, "- Other days start at {}.", hhmm::format(&frame.day_start));
    }
    let _ = writeln!(prompt, "- Every day ends by {}.", hhmm::format(&frame.day_end));
    if frame.last_day_end != frame.day_end {
        let _ = writeln!(prompt, "- The last day ends by {}.", hhmm::format(&frame.last_day_end));
    }
    prompt.push_str("- Lunch is between 12:00 and 13:00, dinner between 18:00 and 19:00.\n");
    let _ = writeln!(
        prompt,
        "- Leave {} minutes between consecutive slots for moving.",
        frame.gap_minutes
    );
    prompt.push_str("- Use each place at most once in the whole trip and only places from the list.\n");
    prompt.push_str("- Do not schedule lodging (STAY) as a visit.\n");
    if frame.auto_add_meals {
        prompt.push_str(
            "- When no restaurant fits a meal window, add a MEAL slot with \"place_id\": null.\n",
        );
    } else {
        prompt.push_str("- Do not add MEAL slots.\n");
    }

    prompt.push_str("\n[Places]\n");
    for (index, place) in places.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "- id={}, name={}, category={}, lat={:.5}, lng={:.5}",
            index, place.name, place.category, place.lat, place.lng
        );
    }

    prompt.push_str(
        "\n[Output format]\n\
{\"days\":[{\"day\":1,\"slots\":[{\"place_id\":0,\"start_time\":\"10:00\",\"duration_min\":60,\"activity\":\"VISIT\"}]}]}\n\
activity is one of VISIT, MEAL, TRANSPORT.\n",
    );
    prompt
}

pub struct ItineraryPlanner {
    completion: Option<Arc<dyn CompletionPort>>,
    place_search: Option<Arc<dyn PlaceSearch>>,
    config: ItineraryConfig,
}

impl ItineraryPlanner {
    pub fn new(
        completion: Option<Arc<dyn CompletionPort>>,
        place_search: Option<Arc<dyn PlaceSearch>>,
        config: ItineraryConfig,
    ) -> Self {
        Self {
            completion,
            place_search,
            config,
        }
    }

    pub fn config(&self) -> &ItineraryConfig {
        &self.config
    }

    fn frame(&self, filter: &FilterState, options: &PlanOptions, now: NaiveTime) -> DayFrame {
        let day_count = filter.duration.days().max(1);
        DayFrame {
            day_count,
            first_day_start: self.config.effective_start(now),
            day_start: self.config.default_start,
            day_end: self.config.default_end,
            last_day_end: options
                .last_day_end
                .or(self.config.last_day_end_override)
                .unwrap_or(self.config.default_end),
            gap_minutes: self.config.gap_minutes,
            auto_add_meals: options.auto_add_meals.unwrap_or(self.config.auto_add_meals),
        }
    }

    /// Puts the requested must-visit place first, searching for it when it is not in the list.
    pub async fn with_mandatory_place(&self, places: Vec<Place>, filter: &FilterState) -> Vec<Place> {
        let Some(name) = filter.mandatory_place_name() else {
            return places;
        };
        if let Some(index) = places.iter().position(|p| p.name.contains(name)) {
            let mut places = places;
            let mandatory = places.remove(index);
            places.insert(0, mandatory);
            return places;
        }
        let Some(search) = &self.place_search else {
            return places;
        };

        let center = places.first().map(|p| p.location());
        match search
            .search_keyword(name, center, MANDATORY_PLACE_SEARCH_RADIUS, 1)
            .await
        {
            Ok(found) => match found.into_iter().next() {
                Some(mandatory) => {
                    let mut with_mandatory = vec![mandatory];
                    with_mandatory.extend(places);
                    with_mandatory
                }
                None => {
                    log::info!("Mandatory place '{}' not found", name);
                    places
                }
            },
            Err(e) => {
                log::warn!("Searching mandatory place '{}' failed: {}", name, e);
                places
            }
        }
    }

    /// Plans the trip with the language model, falling back to the deterministic planner.
    pub async fn generate(
        &self,
        places: &[Place],
        filter: &FilterState,
        options: &PlanOptions,
        now: NaiveTime,
    ) -> GeneratedPlan {
        let frame = self.frame(filter, options, now);

        if let Some(completion) = &self.completion {
            let prompt = build_plan_prompt(places, filter, &frame);
            match completion.complete(&prompt).await {
                Ok(raw) => match parse_llm_plan(&raw, places, &frame) {
                    Some(mut days) => {
                        if let Some(first) = days.first_mut() {
                            *first = resequence_within_day(first, Some(frame.first_day_start), frame.gap_minutes);
                        }
                        log::info!("Itinerary planned by language model ({} days)", days.len());
                        return GeneratedPlan {
                            days,
                            source: PlanSource::Llm,
                        };
                    }
                    None => log::warn!("Itinerary answer was unusable, using fallback planner"),
                },
                Err(e) => log::warn!("Itinerary completion failed, using fallback planner: {}", e),
            }
        }

        GeneratedPlan {
            days: plan_fallback(places, &frame),
            source: PlanSource::Fallback,
        }
    }

    /// The deterministic planner alone.
    pub fn generate_fallback(
        &self,
        places: &[Place],
        filter: &FilterState,
        options: &PlanOptions,
        now: NaiveTime,
    ) -> Vec<DaySchedule> {
        plan_fallback(places, &self.frame(filter, options, now))
    }
}
