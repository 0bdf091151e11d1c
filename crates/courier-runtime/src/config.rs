//! Runtime configuration.

use courier_bus::BusConfig;
use courier_telemetry::TelemetryConfig;
use std::collections::HashSet;
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("stack location ids must not be blank")]
    BlankLocation,

    #[error("stack location '{0}' is listed more than once")]
    DuplicateLocation(String),
}

/// Everything the runtime needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeConfig {
    pub bus: BusConfig,
    pub telemetry: TelemetryConfig,
    /// Locations seeded with a default stack.
    pub stack_locations: Vec<String>,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// `COURIER_STACK_LOCATIONS` is a comma separated list of location ids;
    /// surrounding whitespace is ignored.
    pub fn from_env() -> Self {
        Self {
            bus: BusConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            stack_locations: env::var("COURIER_STACK_LOCATIONS")
                .map(|raw| parse_locations(&raw))
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for location in &self.stack_locations {
            if location.is_empty() {
                return Err(ConfigError::BlankLocation);
            }
            if !seen.insert(location.as_str()) {
                return Err(ConfigError::DuplicateLocation(location.clone()));
            }
        }
        Ok(())
    }
}

fn parse_locations(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
