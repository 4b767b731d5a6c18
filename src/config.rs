use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::error::PipelineError;
use crate::source::SampleQuery;
use crate::types::StateSet;

const DEFAULT_STATES: &[&str] = &["disconnected", "cold", "cool", "average", "warm", "hot"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    /// Measurement/series the samples live under.
    pub series: String,
    /// Field holding the raw reading.
    pub raw_field: String,
    /// Field holding the per-sensor calibration offset.
    pub offset_field: String,
    /// Field holding per-state upper bounds.
    pub threshold_field: String,
    /// Tag key that carries the state name on threshold samples.
    pub threshold_state_tag: String,
    pub sensor_id: Option<String>,
    pub unit: Option<String>,
    /// Ordered state names, ascending severity; last entry is the ceiling.
    pub states: Vec<String>,
    /// Decimal places for calibrated values.
    pub precision: u32,
    pub source_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_size: 5,
            series: "telemetry".to_string(),
            raw_field: "temperature".to_string(),
            offset_field: "bias".to_string(),
            threshold_field: "threshold".to_string(),
            threshold_state_tag: "state".to_string(),
            sensor_id: None,
            unit: None,
            states: DEFAULT_STATES.iter().map(|s| s.to_string()).collect(),
            precision: 1,
            source_timeout_secs: 10,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = Self::default();

        let database_url = env_optional("BAND_DATABASE_URL").or_else(|| env_optional("DATABASE_URL"));
        let db_pool_size = env::var("BAND_DB_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.db_pool_size);
        let precision = env::var("BAND_PRECISION")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.precision);
        let source_timeout_secs = env::var("BAND_SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.source_timeout_secs);

        let states = env::var("BAND_STATES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|names| !names.is_empty())
            .unwrap_or(defaults.states);

        Ok(Self {
            database_url,
            db_pool_size,
            series: env_string("BAND_SERIES", &defaults.series),
            raw_field: env_string("BAND_RAW_FIELD", &defaults.raw_field),
            offset_field: env_string("BAND_OFFSET_FIELD", &defaults.offset_field),
            threshold_field: env_string("BAND_THRESHOLD_FIELD", &defaults.threshold_field),
            threshold_state_tag: env_string(
                "BAND_THRESHOLD_STATE_TAG",
                &defaults.threshold_state_tag,
            ),
            sensor_id: env_optional("BAND_SENSOR_ID"),
            unit: env_optional("BAND_UNIT"),
            states,
            precision,
            source_timeout_secs,
        })
    }

    pub fn state_set(&self) -> Result<StateSet, PipelineError> {
        StateSet::new(self.states.clone())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    fn scope_tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::new();
        if let Some(sensor_id) = &self.sensor_id {
            tags.push(("sensor_id".to_string(), sensor_id.clone()));
        }
        if let Some(unit) = &self.unit {
            tags.push(("unit".to_string(), unit.clone()));
        }
        tags
    }

    pub fn raw_query(&self) -> SampleQuery {
        SampleQuery {
            series: self.series.clone(),
            field: self.raw_field.clone(),
            tags: self.scope_tags(),
        }
    }

    pub fn offset_query(&self) -> SampleQuery {
        SampleQuery {
            series: self.series.clone(),
            field: self.offset_field.clone(),
            tags: self.scope_tags(),
        }
    }

    pub fn threshold_query(&self, state: &str) -> SampleQuery {
        SampleQuery {
            series: self.series.clone(),
            field: self.threshold_field.clone(),
            tags: vec![(self.threshold_state_tag.clone(), state.to_string())],
        }
    }
}
