use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{round_to, CalibratedSample, Sample};

type JoinKey = (DateTime<Utc>, String, String);

fn key_of(sample: &Sample) -> JoinKey {
    (
        sample.timestamp,
        sample.sensor_id.clone(),
        sample.unit.clone(),
    )
}

/// Exact equi-join of raw readings and calibration offsets on `(timestamp,
/// sensor_id, unit)`. A raw sample with no offset at the same key (or vice
/// versa) is dropped: a reading without its bias cannot be calibrated.
/// Duplicate keys keep the last occurrence per side.
///
/// Output is sorted ascending by timestamp regardless of input order; the run
/// tracker's duration accounting depends on that.
pub fn join(raw: Vec<Sample>, offsets: Vec<Sample>, precision: u32) -> Vec<CalibratedSample> {
    let mut offset_by_key: HashMap<JoinKey, f64> = HashMap::with_capacity(offsets.len());
    for sample in offsets {
        offset_by_key.insert(key_of(&sample), sample.value);
    }

    let mut raw_by_key: HashMap<JoinKey, Sample> = HashMap::with_capacity(raw.len());
    for sample in raw {
        raw_by_key.insert(key_of(&sample), sample);
    }

    let mut out: Vec<CalibratedSample> = raw_by_key
        .into_values()
        .filter_map(|sample| {
            let offset = *offset_by_key.get(&key_of(&sample))?;
            Some(CalibratedSample {
                timestamp: sample.timestamp,
                calibrated_value: round_to(sample.value + offset, precision),
                raw_value: sample.value,
                offset_value: offset,
                sensor_id: sample.sensor_id,
                unit: sample.unit,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.sensor_id.cmp(&b.sensor_id))
            .then_with(|| a.unit.cmp(&b.unit))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(secs: i64, sensor: &str, unit: &str, value: f64) -> Sample {
        Sample {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            sensor_id: sensor.to_string(),
            unit: unit.to_string(),
            value,
        }
    }

    #[test]
    fn matching_keys_produce_calibrated_rows() {
        let raw = vec![sample(0, "s1", "F", 71.96), sample(10, "s1", "F", 68.0)];
        let offsets = vec![sample(0, "s1", "F", 0.5), sample(10, "s1", "F", 0.5)];

        let joined = join(raw, offsets, 1);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].calibrated_value, 72.5);
        assert_eq!(joined[0].raw_value, 71.96);
        assert_eq!(joined[0].offset_value, 0.5);
        assert_eq!(joined[1].calibrated_value, 68.5);
    }

    #[test]
    fn unmatched_samples_are_dropped() {
        // raw at t=5 has no offset at t=5
        let raw = vec![sample(5, "s1", "F", 70.0), sample(10, "s1", "F", 70.0)];
        let offsets = vec![sample(10, "s1", "F", 1.0), sample(20, "s1", "F", 1.0)];

        let joined = join(raw, offsets, 1);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].timestamp, Utc.timestamp_opt(10, 0).unwrap());
    }

    #[test]
    fn key_includes_sensor_and_unit() {
        let raw = vec![sample(0, "s1", "F", 70.0)];
        let offsets = vec![sample(0, "s2", "F", 1.0), sample(0, "s1", "C", 1.0)];
        assert!(join(raw, offsets, 1).is_empty());
    }

    #[test]
    fn output_is_time_ordered_even_when_input_is_not() {
        let raw = vec![
            sample(20, "s1", "F", 3.0),
            sample(0, "s1", "F", 1.0),
            sample(10, "s1", "F", 2.0),
        ];
        let offsets = vec![
            sample(0, "s1", "F", 0.0),
            sample(10, "s1", "F", 0.0),
            sample(20, "s1", "F", 0.0),
        ];

        let joined = join(raw, offsets, 1);
        let values: Vec<f64> = joined.iter().map(|s| s.calibrated_value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_keys_keep_last_occurrence() {
        let raw = vec![sample(0, "s1", "F", 70.0), sample(0, "s1", "F", 71.0)];
        let offsets = vec![sample(0, "s1", "F", 0.5), sample(0, "s1", "F", 1.0)];

        let joined = join(raw, offsets, 1);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].raw_value, 71.0);
        assert_eq!(joined[0].offset_value, 1.0);
        assert_eq!(joined[0].calibrated_value, 72.0);
    }
}
