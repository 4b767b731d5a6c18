use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::types::ClassifiedSample;

/// Timestamp and calibrated value of the most recent sample classified into a
/// state. Absent until the state is observed at least once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Running statistics for one tracked state. `duration_seconds` sums the
/// maximal contiguous runs of the state, measured through the last observed
/// sample; `occurrence_count` counts transitions into the state, not samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateRunStats {
    pub last_seen: Option<SamplePoint>,
    pub duration_seconds: i64,
    pub occurrence_count: u64,
}

#[derive(Debug, Default)]
struct Machine {
    run_start: Option<DateTime<Utc>>,
    stats: StateRunStats,
}

/// One 2-state machine (inactive/active) per tracked state, all stepped
/// simultaneously on every classified sample. Samples must arrive in
/// non-decreasing timestamp order; the tracker owns its statistics for the
/// duration of a pipeline run and is not shared across runs.
#[derive(Debug)]
pub struct RunTracker {
    last_ts: Option<DateTime<Utc>>,
    machines: Vec<Machine>,
}

impl RunTracker {
    pub fn new(state_count: usize) -> Self {
        Self {
            last_ts: None,
            machines: (0..state_count).map(|_| Machine::default()).collect(),
        }
    }

    /// Step every machine with one sample. Rejects a sample earlier than the
    /// previous one: out-of-order input makes duration accounting undefined,
    /// so ordering is a hard precondition here, guaranteed by the joiner.
    pub fn observe(&mut self, sample: &ClassifiedSample) -> Result<(), PipelineError> {
        let t = sample.sample.timestamp;
        if let Some(previous) = self.last_ts {
            if t < previous {
                return Err(PipelineError::OutOfOrder {
                    previous,
                    observed: t,
                });
            }
        }
        self.last_ts = Some(t);

        for (index, machine) in self.machines.iter_mut().enumerate() {
            let occupied = index == sample.state;
            match (occupied, machine.run_start) {
                // transition into the state: a new contiguous run begins
                (true, None) => {
                    machine.stats.occurrence_count += 1;
                    machine.run_start = Some(t);
                }
                (true, Some(_)) => {}
                // transition out: close the run
                (false, Some(start)) => {
                    machine.stats.duration_seconds += (t - start).num_seconds();
                    machine.run_start = None;
                }
                (false, None) => {}
            }
            if occupied {
                machine.stats.last_seen = Some(SamplePoint {
                    timestamp: t,
                    value: sample.sample.calibrated_value,
                });
            }
        }
        Ok(())
    }

    /// Per-state statistics in state order. An in-progress run is counted up
    /// to its most recent sample, never extended to wall-clock now; callers
    /// wanting duration-to-now must observe a synthetic trailing sample.
    pub fn snapshot(&self) -> Vec<StateRunStats> {
        self.machines
            .iter()
            .map(|machine| {
                let mut stats = machine.stats.clone();
                if let (Some(start), Some(last)) = (machine.run_start, stats.last_seen) {
                    stats.duration_seconds += (last.timestamp - start).num_seconds();
                }
                stats
            })
            .collect()
    }
}
