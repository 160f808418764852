//! Weather and location collaborators for Skyframe
//!
//! Provides current conditions via an OpenWeatherMap-compatible API and
//! device location via configuration or IP lookup.

pub mod location;
pub mod provider;
pub mod types;

pub use location::{locator_from_config, DeniedLocator, FixedLocator, IpLocator, Locator};
pub use provider::{WeatherProvider, WeatherSource};
pub use types::*;
