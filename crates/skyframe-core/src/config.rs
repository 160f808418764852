use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_WEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_IMAGE_API_URL: &str = "https://api.replicate.com/v1";
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/flux-dev";
pub const DEFAULT_LOCATION_LOOKUP_URL: &str = "http://ip-api.com/json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const WEATHER_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";
const IMAGE_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub location: LocationConfig,
}

/// Weather lookup settings (OpenWeatherMap current weather endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_url: String,

    /// API key; read from the file or `OPENWEATHERMAP_API_KEY`, never written back
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_WEATHER_API_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

/// Image generation service settings (Replicate predictions API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub api_url: String,

    /// API token; read from the file or `REPLICATE_API_TOKEN`, never written back
    #[serde(skip_serializing)]
    pub api_token: Option<String>,

    /// Model identifier in `owner/name` form
    pub model: String,

    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_IMAGE_API_URL.to_string(),
            api_token: None,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between automatic job status checks
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// How the device location is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// Look up the approximate location from the public IP address
    #[default]
    Ip,
    /// Use the configured latitude/longitude
    Fixed,
    /// Location access refused
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub mode: LocationMode,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lookup_url: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            mode: LocationMode::Ip,
            latitude: None,
            longitude: None,
            lookup_url: DEFAULT_LOCATION_LOOKUP_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let mut config = Self::default();
            config.save_to(&config_path)?;
            config.apply_env_overrides();
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_error(path, &e))?;

        let mut config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration (default path or `path`) and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.into_validated()
    }

    /// Validate a configuration that may have been adjusted after loading
    pub fn into_validated(self) -> Result<(Self, ValidationResult)> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Fill secrets missing from the file with environment variables
    pub fn apply_env_overrides(&mut self) {
        if self.weather.api_key.is_none() {
            self.weather.api_key = non_empty_env(WEATHER_KEY_ENV);
        }
        if self.image.api_token.is_none() {
            self.image.api_token = non_empty_env(IMAGE_TOKEN_ENV);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.weather.api_url, "weather.api_url", &mut result);
        validate_url(&self.image.api_url, "image.api_url", &mut result);

        if self.weather.api_key.is_none() {
            result.add_warning(
                "weather.api_key",
                "No weather API key - default weather values will be used",
            );
        }

        if self.image.api_token.is_none() {
            result.add_warning(
                "image.api_token",
                "No image API token - generation requests will be rejected",
            );
        }

        if self.image.model.split('/').filter(|p| !p.is_empty()).count() != 2 {
            result.add_error("image.model", "Model must be in owner/name form");
        }

        if self.polling.interval_secs == 0 {
            result.add_error("polling.interval_secs", "Polling interval must be greater than 0");
        } else if self.polling.interval_secs > 300 {
            result.add_warning(
                "polling.interval_secs",
                "Polling interval is more than 5 minutes",
            );
        }

        match self.location.mode {
            LocationMode::Ip => {
                validate_url(&self.location.lookup_url, "location.lookup_url", &mut result);
            }
            LocationMode::Fixed => match (self.location.latitude, self.location.longitude) {
                (Some(lat), Some(lon)) => {
                    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                        result.add_error("location.latitude", "Latitude must be between -90 and 90");
                    }
                    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                        result.add_error(
                            "location.longitude",
                            "Longitude must be between -180 and 180",
                        );
                    }
                }
                _ => result.add_error(
                    "location",
                    "Fixed location mode requires both latitude and longitude",
                ),
            },
            LocationMode::Disabled => {
                result.add_warning("location.mode", "Location access is disabled");
            }
        }

        result
    }

    /// Save configuration to `path`, creating the parent directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).map_err(|e| io_error(path, &e))?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("skyframe");

        Ok(config_dir.join("config.toml"))
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a URL field
fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }

            if url.port() == Some(0) {
                result.add_error(field_name, "Port cannot be 0");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}
