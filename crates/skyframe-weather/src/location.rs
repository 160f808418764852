//! Device location providers.
//!
//! The workflow asks a [`Locator`] for coordinates once per run. Which
//! provider is used comes from `[location] mode` in the configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skyframe_core::{LocationConfig, LocationMode};
use tracing::instrument;

use crate::types::{Location, LocationError};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("skyframe/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Locator: Send + Sync {
    async fn current_location(&self) -> Result<Location, LocationError>;
}

/// Always answers with the same coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    location: Location,
}

impl FixedLocator {
    pub fn new(location: Location) -> Self {
        Self { location }
    }
}

#[async_trait]
impl Locator for FixedLocator {
    async fn current_location(&self) -> Result<Location, LocationError> {
        if !self.location.is_valid() {
            return Err(LocationError::Other(format!(
                "Configured coordinates are out of range: {}",
                self.location
            )));
        }
        Ok(self.location)
    }
}

/// Location access refused by configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedLocator;

#[async_trait]
impl Locator for DeniedLocator {
    async fn current_location(&self) -> Result<Location, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

/// Approximate location from the public IP address (ip-api compatible).
#[derive(Debug, Clone)]
pub struct IpLocator {
    client: Arc<Client>,
    lookup_url: String,
}

impl IpLocator {
    pub fn new(lookup_url: &str) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LocationError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            lookup_url: lookup_url.to_string(),
        })
    }
}

#[async_trait]
impl Locator for IpLocator {
    #[instrument(skip(self), level = "debug")]
    async fn current_location(&self) -> Result<Location, LocationError> {
        let response = self
            .client
            .get(&self.lookup_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::ServiceUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LocationError::ServiceUnavailable(format!(
                "lookup returned status {}",
                response.status()
            )));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Other(format!("Invalid lookup response: {}", e)))?;

        if body.status.as_deref().is_some_and(|s| s != "success") {
            return Err(LocationError::Other(
                body.message.unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(latitude), Some(longitude)) => {
                let location = Location::new(latitude, longitude);
                tracing::debug!("IP lookup resolved to {}", location);
                Ok(location)
            }
            _ => Err(LocationError::Other(
                "lookup response is missing coordinates".to_string(),
            )),
        }
    }
}

/// Pick the location provider described by the configuration.
pub fn locator_from_config(config: &LocationConfig) -> Result<Arc<dyn Locator>, LocationError> {
    match config.mode {
        LocationMode::Ip => Ok(Arc::new(IpLocator::new(&config.lookup_url)?)),
        LocationMode::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Ok(Arc::new(FixedLocator::new(Location::new(lat, lon)))),
            _ => Err(LocationError::ServiceUnavailable(
                "fixed location mode requires latitude and longitude".to_string(),
            )),
        },
        LocationMode::Disabled => Ok(Arc::new(DeniedLocator)),
    }
}
