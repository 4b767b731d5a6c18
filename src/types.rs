use chrono::{DateTime, Utc};

use crate::error::PipelineError;

/// One timestamped measurement read from the metric source. Raw readings and
/// calibration offsets share this shape and are distinguished only by the
/// field they were queried from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    pub unit: String,
    pub value: f64,
}

/// A raw reading joined with its offset at the same `(timestamp, sensor_id,
/// unit)` key. `calibrated_value` is `raw + offset` rounded to the configured
/// precision.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedSample {
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    pub unit: String,
    pub raw_value: f64,
    pub offset_value: f64,
    pub calibrated_value: f64,
}

/// A calibrated sample plus the index of the state it classified into.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSample {
    pub sample: CalibratedSample,
    pub state: usize,
}

/// Half-open query window: samples with `start <= ts < stop`.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self, PipelineError> {
        if start >= stop {
            return Err(PipelineError::InvalidWindow { start, stop });
        }
        Ok(Self { start, stop })
    }
}

/// The fixed, ordered list of state names supplied at initialization. Order
/// is ascending severity; the last entry is the ceiling state used when a
/// value exceeds every configured bound.
#[derive(Debug, Clone)]
pub struct StateSet {
    names: Vec<String>,
}

impl StateSet {
    pub fn new(names: Vec<String>) -> Result<Self, PipelineError> {
        let names: Vec<String> = names
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect();
        if names.is_empty() {
            return Err(PipelineError::InvalidStateSet(
                "state list must not be empty".to_string(),
            ));
        }
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(PipelineError::InvalidStateSet(format!(
                    "state #{index} has a blank name"
                )));
            }
            if names[..index].contains(name) {
                return Err(PipelineError::InvalidStateSet(format!(
                    "duplicate state name \"{name}\""
                )));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn ceiling(&self) -> &str {
        self.names.last().map(String::as_str).unwrap_or_default()
    }
}

/// Round half-away-from-zero at `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(round_to(0.25, 1), 0.3);
        assert_eq!(round_to(-0.25, 1), -0.3);
        assert_eq!(round_to(1.25, 1), 1.3);
        assert_eq!(round_to(72.44, 1), 72.4);
        assert_eq!(round_to(5.0, 1), 5.0);
    }

    #[test]
    fn state_set_rejects_empty_and_duplicates() {
        assert!(StateSet::new(Vec::new()).is_err());
        assert!(StateSet::new(vec!["cold".into(), " ".into()]).is_err());
        assert!(StateSet::new(vec!["cold".into(), "cold".into()]).is_err());
    }

    #[test]
    fn state_set_trims_and_exposes_ceiling() {
        let set = StateSet::new(vec![" cold ".into(), "warm".into(), "hot".into()]).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.name(0), "cold");
        assert_eq!(set.ceiling(), "hot");
    }

    #[test]
    fn window_requires_start_before_stop() {
        let now = Utc::now();
        assert!(TimeWindow::new(now, now).is_err());
        assert!(TimeWindow::new(now, now + chrono::Duration::seconds(1)).is_ok());
    }
}
