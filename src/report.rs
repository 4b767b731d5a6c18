use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tracker::StateRunStats;
use crate::types::StateSet;

/// One output row per tracked state. States never observed in the stream
/// still appear, with `last_value`/`last_seen_at` absent rather than a
/// numeric placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandReportRow {
    pub state: String,
    pub last_value: Option<f64>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub occurrences: u64,
}

/// Assemble the final row set: ascending by last-seen calibrated value, ties
/// broken by fixed state order, never-seen states last.
pub fn emit(states: &StateSet, stats: &[StateRunStats]) -> Vec<BandReportRow> {
    let mut rows: Vec<BandReportRow> = states
        .names()
        .iter()
        .zip(stats)
        .map(|(name, stats)| BandReportRow {
            state: name.clone(),
            last_value: stats.last_seen.map(|point| point.value),
            last_seen_at: stats.last_seen.map(|point| point.timestamp),
            duration_seconds: stats.duration_seconds,
            occurrences: stats.occurrence_count,
        })
        .collect();

    // stable sort keeps state order for ties and for the no-data tail
    rows.sort_by(|a, b| match (a.last_value, b.last_value) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::SamplePoint;
    use chrono::TimeZone;

    fn seen(secs: i64, value: f64, duration: i64, count: u64) -> StateRunStats {
        StateRunStats {
            last_seen: Some(SamplePoint {
                timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
                value,
            }),
            duration_seconds: duration,
            occurrence_count: count,
        }
    }

    #[test]
    fn rows_sorted_by_last_value_with_unseen_last() {
        let states = StateSet::new(vec![
            "cold".to_string(),
            "average".to_string(),
            "hot".to_string(),
        ])
        .unwrap();
        let stats = vec![
            seen(10, 25.0, 10, 1),
            seen(20, 5.0, 0, 1),
            StateRunStats::default(),
        ];

        let rows = emit(&states, &stats);
        assert_eq!(rows[0].state, "average");
        assert_eq!(rows[0].last_value, Some(5.0));
        assert_eq!(rows[1].state, "cold");
        assert_eq!(rows[2].state, "hot");
        assert_eq!(rows[2].last_value, None);
        assert_eq!(rows[2].last_seen_at, None);
        assert_eq!(rows[2].occurrences, 0);
    }

    #[test]
    fn ties_keep_fixed_state_order() {
        let states = StateSet::new(vec!["cold".to_string(), "cool".to_string()]).unwrap();
        let stats = vec![seen(0, 7.0, 0, 1), seen(10, 7.0, 0, 1)];
        let rows = emit(&states, &stats);
        assert_eq!(rows[0].state, "cold");
        assert_eq!(rows[1].state, "cool");
    }

    #[test]
    fn unseen_states_have_no_numeric_placeholder() {
        let states = StateSet::new(vec!["cold".to_string()]).unwrap();
        let rows = emit(&states, &[StateRunStats::default()]);
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["last_value"], serde_json::Value::Null);
    }
}
