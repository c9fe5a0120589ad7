//! Rule tables behind the per-place fit labels shown with recommendations.
//!
//! The defaults encode product policy. A JSON file named by `FIT_RULES_PATH` can replace any part
//! of them; missing fields keep their defaults.

use crate::models::filter::Companion;
use crate::models::place::{Category, Place, WeatherInfo};
use crate::models::recommendation::FitLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureBand {
    /// Inclusive upper bound. `None` closes the table.
    pub max_c: Option<f64>,
    pub indoor: FitLevel,
    pub outdoor: FitLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherFitRules {
    /// Case-insensitive fragments of a condition label that mean rain or snow.
    pub wet_conditions: Vec<String>,
    pub wet_indoor: FitLevel,
    pub wet_outdoor: FitLevel,
    pub bands: Vec<TemperatureBand>,
}

impl Default for WeatherFitRules {
    fn default() -> Self {
        Self {
            wet_conditions: ["비", "소나기", "눈", "rain", "drizzle", "thunderstorm", "snow"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            wet_indoor: FitLevel::High,
            wet_outdoor: FitLevel::Low,
            bands: vec![
                TemperatureBand {
                    max_c: Some(3.0),
                    indoor: FitLevel::High,
                    outdoor: FitLevel::Low,
                },
                TemperatureBand {
                    max_c: Some(12.0),
                    indoor: FitLevel::High,
                    outdoor: FitLevel::Medium,
                },
                TemperatureBand {
                    max_c: Some(22.0),
                    indoor: FitLevel::Medium,
                    outdoor: FitLevel::High,
                },
                TemperatureBand {
                    max_c: Some(28.0),
                    indoor: FitLevel::Medium,
                    outdoor: FitLevel::Medium,
                },
                TemperatureBand {
                    max_c: None,
                    indoor: FitLevel::High,
                    outdoor: FitLevel::Low,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointThreshold<T> {
    pub min: T,
    pub points: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionFitRules {
    pub category_points: HashMap<Category, i32>,
    /// Extra category points for a specific companion type.
    pub companion_points: HashMap<Companion, HashMap<Category, i32>>,
    /// Checked in order, first match wins.
    pub rating_points: Vec<PointThreshold<f64>>,
    /// Ratings in `0.1..=low_rating_max` cost `low_rating_penalty` points.
    pub low_rating_max: f64,
    pub low_rating_penalty: i32,
    /// Checked in order, first match wins.
    pub popularity_points: Vec<PointThreshold<u64>>,
    pub high_min_points: i32,
    pub low_max_points: i32,
}

impl Default for CompanionFitRules {
    fn default() -> Self {
        let category_points = HashMap::from([
            (Category::Cafe, 2),
            (Category::Food, 2),
            (Category::Photo, 2),
            (Category::Healing, 2),
            (Category::Experience, 2),
            (Category::Shopping, 1),
            (Category::Stay, 1),
        ]);
        Self {
            category_points,
            companion_points: HashMap::new(),
            rating_points: vec![
                PointThreshold { min: 4.5, points: 2 },
                PointThreshold { min: 4.0, points: 1 },
            ],
            low_rating_max: 3.5,
            low_rating_penalty: -1,
            popularity_points: vec![
                PointThreshold { min: 200, points: 2 },
                PointThreshold { min: 80, points: 1 },
            ],
            high_min_points: 4,
            low_max_points: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFitRules {
    /// Relative rank (0 = first, 1 = last) up to which a place is rated high.
    pub high_max_ratio: f64,
    pub medium_max_ratio: f64,
    /// Phrases in a reason that force a low rating.
    pub strong_negative: Vec<String>,
    /// Phrases in a reason that demote high to medium.
    pub weak_negative: Vec<String>,
}

impl Default for AiFitRules {
    fn default() -> Self {
        Self {
            high_max_ratio: 0.2,
            medium_max_ratio: 0.7,
            strong_negative: [
                "추천하지 않습니다",
                "비추천",
                "권하기 어렵",
                "실망",
                "별로 추천",
                "다시 찾지 않을",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            weak_negative: [
                "특별한 매력은 없는",
                "평범한 곳",
                "큰 특징은 없",
                "무난한 곳",
                "아주 특별하진 않",
                "그냥 평범한",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitRules {
    pub weather: WeatherFitRules,
    pub companion: CompanionFitRules,
    pub ai: AiFitRules,
}

impl FitRules {
    pub fn from_env() -> Self {
        let Ok(path) = env::var("FIT_RULES_PATH") else {
            return Self::default();
        };
        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<FitRules>(&raw).map_err(|e| e.to_string()))
        {
            Ok(rules) => {
                log::info!("Loaded fit rules from {}", path);
                rules
            }
            Err(e) => {
                log::warn!("Could not load fit rules from {}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// How well the weather suits a category. Medium without weather.
    pub fn weather_fit(&self, category: Category, weather: Option<&WeatherInfo>) -> FitLevel {
        let Some(weather) = weather else {
            return FitLevel::Medium;
        };
        let rules = &self.weather;
        let pick = |indoor: FitLevel, outdoor: FitLevel| {
            if category.is_indoor() {
                indoor
            } else if category.is_outdoor() {
                outdoor
            } else {
                FitLevel::Medium
            }
        };

        let condition = weather.condition.to_lowercase();
        if rules
            .wet_conditions
            .iter()
            .any(|wet| condition.contains(&wet.to_lowercase()))
        {
            return pick(rules.wet_indoor, rules.wet_outdoor);
        }

        rules
            .bands
            .iter()
            .find(|band| band.max_c.map_or(true, |max| weather.temp_c <= max))
            .map(|band| pick(band.indoor, band.outdoor))
            .unwrap_or(FitLevel::Medium)
    }

    pub fn companion_fit(&self, place: &Place, companion: Companion) -> FitLevel {
        let rules = &self.companion;
        let mut points = rules.category_points.get(&place.category).copied().unwrap_or(0);
        points += rules
            .companion_points
            .get(&companion)
            .and_then(|table| table.get(&place.category))
            .copied()
            .unwrap_or(0);

        if let Some(rating) = place.rating {
            if let Some(threshold) = rules.rating_points.iter().find(|t| rating >= t.min) {
                points += threshold.points;
            } else if (0.1..=rules.low_rating_max).contains(&rating) {
                points += rules.low_rating_penalty;
            }
        }

        if let Some(count) = place.popularity_count {
            if let Some(threshold) = rules.popularity_points.iter().find(|t| count >= t.min) {
                points += threshold.points;
            }
        }

        if points >= rules.high_min_points {
            FitLevel::High
        } else if points <= rules.low_max_points {
            FitLevel::Low
        } else {
            FitLevel::Medium
        }
    }

    /// Label from the place's position in the final list.
    pub fn ai_fit_by_rank(&self, index: usize, total: usize) -> FitLevel {
        if total <= 1 {
            return FitLevel::High;
        }
        let ratio = index as f64 / (total - 1) as f64;
        if ratio <= self.ai.high_max_ratio {
            FitLevel::High
        } else if ratio <= self.ai.medium_max_ratio {
            FitLevel::Medium
        } else {
            FitLevel::Low
        }
    }

    pub fn adjust_ai_fit_by_text(&self, level: FitLevel, reason: Option<&str>) -> FitLevel {
        let Some(reason) = reason else {
            return level;
        };
        if self.ai.strong_negative.iter().any(|p| reason.contains(p.as_str())) {
            return FitLevel::Low;
        }
        if level == FitLevel::High && self.ai.weak_negative.iter().any(|p| reason.contains(p.as_str()))
        {
            return FitLevel::Medium;
        }
        level
    }
}

pub fn summary_line(weather: FitLevel, companion: FitLevel, ai: Option<FitLevel>) -> String {
    let mut line = format!(
        "날씨 적합도 {}, 동행자 적합도 {}",
        weather.label(),
        companion.label()
    );
    if let Some(ai) = ai {
        line.push_str(&format!(", AI 추천도 {}", ai.label()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather(temp_c: f64, condition: &str) -> WeatherInfo {
        WeatherInfo {
            temp_c,
            condition: condition.to_string(),
            icon: None,
        }
    }

    #[test]
    fn rain_favors_indoor_places() {
        let rules = FitRules::default();
        let rainy = weather(18.0, "Rain");
        assert_eq!(rules.weather_fit(Category::Cafe, Some(&rainy)), FitLevel::High);
        assert_eq!(rules.weather_fit(Category::Healing, Some(&rainy)), FitLevel::Low);
        assert_eq!(rules.weather_fit(Category::Night, Some(&rainy)), FitLevel::Medium);
    }

    #[test]
    fn temperature_bands() {
        let rules = FitRules::default();
        assert_eq!(rules.weather_fit(Category::Photo, Some(&weather(18.0, "Clear"))), FitLevel::High);
        assert_eq!(rules.weather_fit(Category::Food, Some(&weather(18.0, "Clear"))), FitLevel::Medium);
        assert_eq!(rules.weather_fit(Category::Photo, Some(&weather(-2.0, "Clear"))), FitLevel::Low);
        assert_eq!(rules.weather_fit(Category::Photo, Some(&weather(31.0, "Clear"))), FitLevel::Low);
        assert_eq!(rules.weather_fit(Category::Photo, Some(&weather(28.0, "Clouds"))), FitLevel::Medium);
        assert_eq!(rules.weather_fit(Category::Photo, None), FitLevel::Medium);
    }

    #[test]
    fn rank_labels_and_negative_reasons() {
        let rules = FitRules::default();
        assert_eq!(rules.ai_fit_by_rank(0, 1), FitLevel::High);
        assert_eq!(rules.ai_fit_by_rank(2, 11), FitLevel::High);
        assert_eq!(rules.ai_fit_by_rank(5, 11), FitLevel::Medium);
        assert_eq!(rules.ai_fit_by_rank(10, 11), FitLevel::Low);
        assert_eq!(
            rules.adjust_ai_fit_by_text(FitLevel::High, Some("솔직히 비추천입니다")),
            FitLevel::Low
        );
        assert_eq!(
            rules.adjust_ai_fit_by_text(FitLevel::High, Some("무난한 곳이에요")),
            FitLevel::Medium
        );
        assert_eq!(
            rules.adjust_ai_fit_by_text(FitLevel::Medium, Some("무난한 곳이에요")),
            FitLevel::Medium
        );
    }

    #[test]
    fn summary_line_mentions_ai_only_when_given() {
        assert_eq!(
            summary_line(FitLevel::High, FitLevel::Medium, None),
            "날씨 적합도 상, 동행자 적합도 중"
        );
        assert_eq!(
            summary_line(FitLevel::High, FitLevel::Medium, Some(FitLevel::Low)),
            "날씨 적합도 상, 동행자 적합도 중, AI 추천도 하"
        );
    }
}
