//! Current weather lookup against an OpenWeatherMap-compatible endpoint.
//!
//! The workflow never fails because of weather: [`WeatherSource::fetch_weather`]
//! turns every error into [`WeatherInfo::unknown`]. Use
//! [`WeatherProvider::try_fetch`] when the failure itself matters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skyframe_core::WeatherConfig;
use tracing::instrument;

use crate::types::{
    Location, Temperature, WeatherError, WeatherInfo, DEFAULT_DESCRIPTION, UNKNOWN_CITY,
};

/// Anything that can answer "what is the weather here", without failing.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, location: &Location) -> WeatherInfo;
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: Option<String>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: Option<OwmMain>,
    sys: Option<OwmSys>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmErrorBody {
    message: Option<String>,
}

impl From<OwmResponse> for WeatherInfo {
    fn from(body: OwmResponse) -> Self {
        let city = body
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_CITY.to_string());

        let description = body
            .weather
            .into_iter()
            .next()
            .and_then(|c| c.description)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        let temperature = body
            .main
            .and_then(|m| m.temp)
            .map_or(Temperature::Unknown, Temperature::Celsius);

        let country = body.sys.and_then(|s| s.country).unwrap_or_default();

        Self {
            city,
            description,
            temperature,
            country,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Build a provider against an arbitrary endpoint (mock servers, proxies)
    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self, WeatherError> {
        let config = WeatherConfig {
            api_url: base_url.to_string(),
            api_key,
            ..WeatherConfig::default()
        };
        Self::new(&config)
    }

    /// Fetch current conditions, surfacing any failure.
    ///
    /// Coordinates are checked before any request is made.
    #[instrument(skip(self), level = "debug")]
    pub async fn try_fetch(&self, location: &Location) -> Result<WeatherInfo, WeatherError> {
        if !location.is_valid() {
            return Err(WeatherError::InvalidCoordinates {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }

        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OwmErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown weather API error")
                        .to_string()
                });
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: OwmResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))?;

        Ok(body.into())
    }
}

#[async_trait]
impl WeatherSource for WeatherProvider {
    async fn fetch_weather(&self, location: &Location) -> WeatherInfo {
        match self.try_fetch(location).await {
            Ok(info) => {
                tracing::info!(
                    "Weather for {}: {}, {}°C",
                    info.city,
                    info.description,
                    info.temperature
                );
                info
            }
            Err(e) => {
                tracing::warn!("Weather lookup failed, using default values: {}", e);
                WeatherInfo::unknown()
            }
        }
    }
}
