use serde::{Deserialize, Deserializer, Serialize, Serializer};
use skyframe_core::{AppError, NetworkError};

pub const UNKNOWN_CITY: &str = "Unknown location";
pub const UNKNOWN_CONDITIONS: &str = "unknown conditions";
pub const DEFAULT_DESCRIPTION: &str = "clear sky";
const UNKNOWN_TOKEN: &str = "unknown";

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True if both coordinates are finite and within the valid ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Temperature in degrees Celsius, or unknown when the lookup had none.
///
/// Serialized as a JSON number or the string `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Temperature {
    Celsius(f64),
    #[default]
    Unknown,
}

impl Temperature {
    /// Rounded to the nearest whole degree
    pub fn rounded(&self) -> Option<i64> {
        match self {
            Temperature::Celsius(t) if t.is_finite() => Some(t.round() as i64),
            _ => None,
        }
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.rounded() {
            Some(t) => write!(f, "{}", t),
            None => f.write_str(UNKNOWN_TOKEN),
        }
    }
}

impl Serialize for Temperature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Temperature::Celsius(t) => serializer.serialize_f64(*t),
            Temperature::Unknown => serializer.serialize_str(UNKNOWN_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for Temperature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(t) => Temperature::Celsius(t),
            Raw::Text(_) => Temperature::Unknown,
        })
    }
}

/// Current conditions at a location, normalized from the weather API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub city: String,
    pub description: String,
    pub temperature: Temperature,
    pub country: String,
}

impl WeatherInfo {
    /// Record used whenever the weather lookup fails
    pub fn unknown() -> Self {
        Self {
            city: UNKNOWN_CITY.to_string(),
            description: UNKNOWN_CONDITIONS.to_string(),
            temperature: Temperature::Unknown,
            country: String::new(),
        }
    }

    /// True if this is the fallback record rather than real data
    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

impl Default for WeatherInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    #[error("Weather API key is not configured")]
    MissingApiKey,
    #[error("Weather API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::PermissionDenied => AppError::PermissionDenied(e.to_string()),
            LocationError::Timeout => AppError::Network(NetworkError::Timeout),
            LocationError::ServiceUnavailable(_) | LocationError::Other(_) => {
                AppError::LocationUnavailable(e.to_string())
            }
        }
    }
}
