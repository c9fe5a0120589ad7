//! Current weather from OpenWeather.
//!
//! ## Setup
//! Set `OPENWEATHER_API_KEY`.

use crate::models::place::{LatLng, WeatherInfo};
use async_trait::async_trait;
use serde::Deserialize;
use std::{env, error::Error, fmt, time::Duration};

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug)]
pub enum WeatherError {
    HttpError(reqwest::Error),
    ResponseError(String),
}

impl fmt::Display for WeatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherError::HttpError(err) => write!(f, "HTTP error: {}", err),
            WeatherError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl Error for WeatherError {}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        WeatherError::HttpError(err)
    }
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn current(&self, at: LatLng) -> Result<WeatherInfo, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    main: OpenWeatherMain,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherCondition {
    main: String,
    icon: Option<String>,
}

impl From<OpenWeatherResponse> for WeatherInfo {
    fn from(body: OpenWeatherResponse) -> Self {
        let first = body.weather.into_iter().next();
        WeatherInfo {
            temp_c: body.main.temp,
            condition: first
                .as_ref()
                .map(|w| w.main.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            icon: first.and_then(|w| w.icon),
        }
    }
}

pub struct OpenWeatherService {
    http_client: reqwest::Client,
    api_key: String,
}

impl OpenWeatherService {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let api_key = env::var("OPENWEATHER_API_KEY")
            .map_err(|_| "OPENWEATHER_API_KEY environment variable not set")?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
        })
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherService {
    async fn current(&self, at: LatLng) -> Result<WeatherInfo, WeatherError> {
        let response = self
            .http_client
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("appid", self.api_key.clone()),
                ("lang", "kr".to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::ResponseError(format!(
                "OpenWeather returned {}",
                response.status()
            )));
        }

        Ok(response.json::<OpenWeatherResponse>().await?.into())
    }
}

/// Weather at `at`, or `None` when the lookup is unavailable or fails.
pub async fn current_weather(lookup: Option<&dyn WeatherLookup>, at: LatLng) -> Option<WeatherInfo> {
    let lookup = lookup?;
    match lookup.current(at).await {
        Ok(weather) => Some(weather),
        Err(e) => {
            log::warn!("Weather lookup failed: {}", e);
            None
        }
    }
}
