//! Content Data Provider (spec §4.3) — parallel pre-fetch of weather and
//! color-bar data. Pattern adapted from the teacher's `team.rs`
//! parallel-join shape (spawn independent suspending calls, join, never
//! propagate a single source's failure to the caller).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::model::{ContentData, WeatherData};

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn get_weather(&self) -> Result<Option<WeatherData>>;
}

#[async_trait]
pub trait ColorBarService: Send + Sync {
    async fn get_colors(&self) -> Result<[i32; 6]>;
}

pub struct ContentDataProvider {
    weather: Arc<dyn WeatherService>,
    color_bar: Arc<dyn ColorBarService>,
}

impl ContentDataProvider {
    pub fn new(weather: Arc<dyn WeatherService>, color_bar: Arc<dyn ColorBarService>) -> Self {
        Self { weather, color_bar }
    }

    /// Never fails. Each source's error becomes a warning, not a
    /// propagated error; the returned `ContentData` always has
    /// `fetched_at = now`.
    pub async fn fetch_data(&self) -> ContentData {
        let (weather_result, color_result) = tokio::join!(self.weather.get_weather(), self.color_bar.get_colors());

        let mut warnings = Vec::new();

        let weather = match weather_result {
            Ok(Some(w)) => Some(w),
            Ok(None) => {
                warnings.push("weather service returned no data".to_string());
                None
            }
            Err(e) => {
                warnings.push(format!("weather fetch failed: {e}"));
                None
            }
        };

        let color_bar = match color_result {
            Ok(colors) => Some(colors),
            Err(e) => {
                warnings.push(format!("color bar fetch failed: {e}"));
                None
            }
        };

        ContentData {
            weather,
            color_bar,
            fetched_at: Utc::now(),
            warnings,
        }
    }
}
