//! Reranks candidates with a language model.
//!
//! The model sees a numbered candidate list and answers with
//! `{"ordered":[{"id":"<place_id>","score":95,"reason":"..."}]}`. Whatever comes back, the output
//! contains every input place exactly once: ids the model returns are matched back to candidates
//! (by id, or by `p<index>` placeholders), and places it leaves out keep their input order after
//! the ranked ones.

use crate::models::filter::FilterState;
use crate::models::place::{Place, WeatherInfo};
use crate::services::completion_service::{parse_json_object, CompletionPort};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, OnceLock};

pub const MAX_CANDIDATES_IN_PROMPT: usize = 30;
const MAX_REASON_CHARS: usize = 80;
const AI_TOP_COUNT: usize = 3;
const EMPTY_REASON_PLACEHOLDER: &str = "(AI가 이유를 비웠습니다)";
const RETRY_INSTRUCTION: &str = "\n\n[Important]\nYour previous answer repeated the input order. \
Return a clearly different order. Returning the input order is forbidden.";

/// One entry of the model's `ordered` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankedPlace {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_score")]
    pub score: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_reason")]
    pub reason: Option<String>,
}

// Ids may come back as numbers and reasons as null, so accept anything scalar.
fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// Blank reasons count as no reason at all.
fn deserialize_reason<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s).filter(|s| !s.trim().is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_lenient_score<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    let raw = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    Ok(raw.map(|v| v.clamp(0, 100) as i32))
}

/// Entries of the `ordered` array that have an id. Malformed entries are skipped.
pub fn parse_ranked(raw: &str) -> Vec<RankedPlace> {
    let map = parse_json_object(raw);
    let Some(Value::Array(entries)) = map.get("ordered") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<RankedPlace>(entry.clone()).ok())
        .filter(|entry| entry.id.is_some())
        .collect()
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Single line, no control characters, at most 80 characters.
pub fn sanitize_reason(reason: &str) -> String {
    let collapsed = whitespace_pattern().replace_all(reason, " ");
    let cleaned: String = collapsed.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return EMPTY_REASON_PLACEHOLDER.to_string();
    }
    if cleaned.chars().count() > MAX_REASON_CHARS {
        let mut truncated: String = cleaned.chars().take(MAX_REASON_CHARS - 1).collect();
        truncated.push('…');
        truncated
    } else {
        cleaned.to_string()
    }
}

fn resolve_index(raw_id: &str, candidates: &[Place]) -> Option<usize> {
    if let Some(index) = candidates.iter().position(|p| p.id == raw_id) {
        return Some(index);
    }
    let digits = raw_id
        .strip_prefix('p')
        .or_else(|| raw_id.strip_prefix('P'))
        .unwrap_or(raw_id);
    digits
        .parse::<usize>()
        .ok()
        .filter(|index| *index < candidates.len())
}

#[derive(Debug, Clone, Default)]
pub struct RerankOutcome {
    pub places: Vec<Place>,
    pub reasons: HashMap<String, String>,
    /// First few ids when the model made a real difference, otherwise empty.
    pub top_ids: Vec<String>,
    pub ai_used: bool,
}

impl RerankOutcome {
    fn order_matches(&self, candidates: &[Place]) -> bool {
        self.places.len() == candidates.len()
            && self
                .places
                .iter()
                .zip(candidates)
                .all(|(a, b)| a.id == b.id)
    }
}

/// Builds the final order and scores from what the model returned.
pub fn reconcile(candidates: &[Place], ranked: &[RankedPlace]) -> RerankOutcome {
    let mut used = vec![false; candidates.len()];
    let mut order: Vec<(usize, Option<i32>)> = Vec::with_capacity(candidates.len());
    let mut reasons = HashMap::new();

    for entry in ranked {
        let Some(index) = entry.id.as_deref().and_then(|id| resolve_index(id, candidates)) else {
            continue;
        };
        if used[index] {
            continue;
        }
        used[index] = true;
        order.push((index, entry.score));
        if let Some(reason) = &entry.reason {
            reasons.insert(candidates[index].id.clone(), sanitize_reason(reason));
        }
    }

    for (index, _) in candidates.iter().enumerate() {
        if !used[index] {
            order.push((index, None));
        }
    }

    let places: Vec<Place> = order
        .into_iter()
        .enumerate()
        .map(|(position, (index, score))| {
            let mut place = candidates[index].clone();
            place.score = Some(score.unwrap_or(100 - position as i32));
            place
        })
        .collect();

    let mut outcome = RerankOutcome {
        places,
        reasons,
        top_ids: Vec::new(),
        ai_used: false,
    };
    outcome.ai_used =
        !outcome.places.is_empty() && (!outcome.order_matches(candidates) || !outcome.reasons.is_empty());
    if outcome.ai_used {
        outcome.top_ids = outcome
            .places
            .iter()
            .take(AI_TOP_COUNT)
            .map(|p| p.id.clone())
            .collect();
    }
    outcome
}

fn optional_number<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn build_rerank_prompt(
    filter: &FilterState,
    weather: Option<&WeatherInfo>,
    candidates: &[Place],
) -> String {
    let categories: Vec<&str> = filter
        .effective_categories()
        .iter()
        .map(|c| c.as_str())
        .collect();
    let region = match filter.region.trim() {
        "" => "-",
        region => region,
    };

    let mut prompt = String::new();
    prompt.push_str("You rank travel places for a trip planner.\n\n");

    prompt.push_str("[User conditions]\n");
    let _ = writeln!(prompt, "- region: {}", region);
    let _ = writeln!(prompt, "- categories: {}", categories.join(", "));
    let _ = writeln!(prompt, "- companion: {}", filter.companion.as_str());
    let _ = writeln!(prompt, "- duration: {} day(s)", filter.duration.days());
    let _ = writeln!(prompt, "- budget per person: {} KRW", filter.budget_per_person);
    let _ = writeln!(prompt, "- party size: {}", filter.number_of_people);

    prompt.push_str("\n[Weather]\n");
    match weather {
        Some(w) => {
            let _ = writeln!(prompt, "- {:.1}℃ / {}", w.temp_c, w.condition);
        }
        None => prompt.push_str("- no weather information\n"),
    }

    prompt.push_str("\n[Extra request]\n");
    match filter.extra_note.trim() {
        "" => prompt.push_str("- none\n"),
        note => {
            let _ = writeln!(prompt, "- {}", note);
        }
    }

    prompt.push_str("\n[Candidates]\n");
    for (index, place) in candidates.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "- origIndex={}, id={}, name={}, cat={}, rating={}, distM={}, naverScore={}, naverBlogs={}",
            index,
            place.id,
            place.name,
            place.category,
            optional_number(place.rating),
            optional_number(place.distance_meters),
            place
                .popularity_score
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "-".to_string()),
            optional_number(place.popularity_count),
        );
    }

    prompt.push_str(
        "\n[Rules]\n\
1. Franchise chains (coffee chains, fast food, donut and ice cream brands) get a heavy penalty unless the extra request asks for them.\n\
2. When two places are otherwise similar, prefer the one with the higher naverScore, then more naverBlogs.\n\
3. Keep the top of the list diverse. Avoid more than two places of the same category in a row.\n\
4. Returning the input order is worth 0 points. More than half of the places must change position.\n\
5. score is an integer between 0 and 100.\n\
6. reason is one Korean sentence of at most 80 characters on why the place suits this user.\n\
7. Use the exact id values from the candidate list and include each candidate at most once.\n\
\n[Output format]\n\
{\"ordered\":[{\"id\":\"<place_id>\",\"score\":95,\"reason\":\"...\"}]}\n",
    );

    prompt
}

pub struct RerankService {
    port: Arc<dyn CompletionPort>,
    max_candidates: usize,
}

impl RerankService {
    pub fn new(port: Arc<dyn CompletionPort>) -> Self {
        Self {
            port,
            max_candidates: MAX_CANDIDATES_IN_PROMPT,
        }
    }

    pub fn with_max_candidates(port: Arc<dyn CompletionPort>, max_candidates: usize) -> Self {
        Self {
            port,
            max_candidates: max_candidates.max(1),
        }
    }

    async fn ask(&self, prompt: &str, candidates: &[Place]) -> RerankOutcome {
        let raw = match self.port.complete(prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Rerank completion failed, keeping input order: {}", e);
                "{}".to_string()
            }
        };
        reconcile(candidates, &parse_ranked(&raw))
    }

    /// Reorders `candidates`, retrying once when the model hands back the input order.
    ///
    /// Candidates beyond the prompt cap are never shown to the model and follow the ranked head in
    /// their input order.
    pub async fn rerank(
        &self,
        filter: &FilterState,
        weather: Option<&WeatherInfo>,
        candidates: &[Place],
    ) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome::default();
        }

        let head_len = candidates.len().min(self.max_candidates);
        let (head, tail) = candidates.split_at(head_len);
        let prompt = build_rerank_prompt(filter, weather, head);

        let mut outcome = self.ask(&prompt, head).await;
        if outcome.order_matches(head) {
            log::debug!("Rerank kept the input order, retrying once");
            let retry = self
                .ask(&format!("{}{}", prompt, RETRY_INSTRUCTION), head)
                .await;
            if !retry.order_matches(head) {
                outcome = retry;
            }
        }

        let base_score = 100 - outcome.places.len() as i32;
        outcome.places.extend(tail.iter().enumerate().map(|(offset, place)| {
            let mut place = place.clone();
            place.score = Some(base_score - offset as i32);
            place
        }));

        log::debug!(
            "Rerank finished: {} places, ai_used={}, {} reasons",
            outcome.places.len(),
            outcome.ai_used,
            outcome.reasons.len()
        );
        outcome
    }
}
