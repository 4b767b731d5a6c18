use tracing::{debug, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::source::MetricSource;
use crate::types::StateSet;

/// Per-state upper bounds, aligned with the state set's order. `None` means
/// no threshold is configured for that state and is treated as unbounded
/// (+infinity) by the classifier, so classification always lands somewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    bounds: Vec<Option<f64>>,
}

impl ThresholdSet {
    pub fn new(bounds: Vec<Option<f64>>) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &[Option<f64>] {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// Fetch the most recent configured bound for each state. A state with no
/// recorded threshold resolves to unbounded rather than an error; only a
/// failed source query aborts resolution.
///
/// Bounds are expected to be non-decreasing in state order. That is the
/// caller's responsibility; a violation is logged and classification then
/// follows the literal first-match rule, which can leave later states
/// unreachable.
pub async fn resolve<S: MetricSource>(
    source: &S,
    config: &Config,
    states: &StateSet,
) -> Result<ThresholdSet, PipelineError> {
    let mut bounds = Vec::with_capacity(states.len());
    for name in states.names() {
        let query = config.threshold_query(name);
        let latest = source
            .query_latest(&query)
            .await
            .map_err(PipelineError::Source)?;
        if latest.is_none() {
            debug!(state = %name, "no threshold configured; treating as unbounded");
        }
        bounds.push(latest.map(|sample| sample.value));
    }
    warn_if_not_ascending(states, &bounds);
    Ok(ThresholdSet::new(bounds))
}

fn warn_if_not_ascending(states: &StateSet, bounds: &[Option<f64>]) {
    let mut prev: Option<(usize, f64)> = None;
    for (index, bound) in bounds.iter().enumerate() {
        let Some(value) = bound else { continue };
        if let Some((prev_index, prev_value)) = prev {
            if *value < prev_value {
                warn!(
                    lower_state = %states.name(prev_index),
                    lower_bound = prev_value,
                    upper_state = %states.name(index),
                    upper_bound = value,
                    "threshold bounds are not ascending; some states may be unreachable"
                );
            }
        }
        prev = Some((index, *value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryMetricSource;
    use crate::types::Sample;
    use chrono::{TimeZone, Utc};

    fn threshold_sample(secs: i64, value: f64) -> Sample {
        Sample {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            sensor_id: String::new(),
            unit: String::new(),
            value,
        }
    }

    fn config(states: &[&str]) -> Config {
        Config {
            states: states.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn resolves_latest_bound_per_state() {
        let mut source = MemoryMetricSource::new();
        source.push(
            "telemetry",
            "threshold",
            &[("state", "cold")],
            threshold_sample(10, 12.0),
        );
        // a newer value supersedes the old one
        source.push(
            "telemetry",
            "threshold",
            &[("state", "cold")],
            threshold_sample(20, 10.0),
        );
        source.push(
            "telemetry",
            "threshold",
            &[("state", "cool")],
            threshold_sample(10, 20.0),
        );

        let config = config(&["cold", "cool", "hot"]);
        let states = config.state_set().unwrap();
        let thresholds = resolve(&source, &config, &states).await.unwrap();
        assert_eq!(thresholds.bounds(), &[Some(10.0), Some(20.0), None]);
    }

    #[tokio::test]
    async fn missing_threshold_is_unbounded_not_an_error() {
        let source = MemoryMetricSource::new();
        let config = config(&["cold", "hot"]);
        let states = config.state_set().unwrap();
        let thresholds = resolve(&source, &config, &states).await.unwrap();
        assert_eq!(thresholds.bounds(), &[None, None]);
    }

    #[tokio::test]
    async fn failed_query_propagates() {
        let source = MemoryMetricSource::failing();
        let config = config(&["cold", "hot"]);
        let states = config.state_set().unwrap();
        let err = resolve(&source, &config, &states).await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }
}
