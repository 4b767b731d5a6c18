use std::future::Future;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classify::classify;
use crate::config::Config;
use crate::error::PipelineError;
use crate::join::join;
use crate::report::{emit, BandReportRow};
use crate::source::MetricSource;
use crate::thresholds;
use crate::tracker::RunTracker;
use crate::types::{ClassifiedSample, TimeWindow};

/// Guard a source-facing stage with the configured timeout and the run's
/// cancellation token. A cancelled or timed-out stage aborts the run before
/// any tracker state is built, so no partial aggregate can escape.
async fn guarded<T, E>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, PipelineError>
where
    E: Into<PipelineError>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(PipelineError::Timeout { seconds: timeout.as_secs() }),
        },
    }
}

/// One full pass: resolve thresholds, fetch and join the raw and offset
/// streams for `window`, classify, track runs, and emit the sorted rows.
/// Any source failure aborts with no output rows.
pub async fn run_window<S: MetricSource>(
    source: &S,
    config: &Config,
    window: TimeWindow,
    cancel: &CancellationToken,
) -> Result<Vec<BandReportRow>, PipelineError> {
    let states = config.state_set()?;
    let timeout = config.source_timeout();

    let thresholds = guarded(
        cancel,
        timeout,
        thresholds::resolve(source, config, &states),
    )
    .await?;
    let raw = guarded(
        cancel,
        timeout,
        source.query_range(&config.raw_query(), window.start, window.stop),
    )
    .await?;
    let offsets = guarded(
        cancel,
        timeout,
        source.query_range(&config.offset_query(), window.start, window.stop),
    )
    .await?;

    let raw_count = raw.len();
    let offset_count = offsets.len();
    let calibrated = join(raw, offsets, config.precision);

    let mut tracker = RunTracker::new(states.len());
    for sample in calibrated {
        let state = classify(sample.calibrated_value, &thresholds);
        tracker.observe(&ClassifiedSample { sample, state })?;
    }
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let rows = emit(&states, &tracker.snapshot());
    info!(
        raw = raw_count,
        offsets = offset_count,
        states = states.len(),
        "band analytics window complete"
    );
    Ok(rows)
}

/// Interval-driven wrapper for long-running use: re-runs the pipeline (and
/// hence re-resolves thresholds) over a sliding lookback window until
/// cancelled, handing each completed row set to `sink`. Failed polls are
/// logged and the next tick proceeds.
pub struct BandAnalyticsService<S> {
    source: S,
    config: Config,
    interval: Duration,
    lookback: ChronoDuration,
}

impl<S: MetricSource> BandAnalyticsService<S> {
    pub fn new(source: S, config: Config, interval: Duration, lookback: ChronoDuration) -> Self {
        Self {
            source,
            config,
            interval,
            lookback,
        }
    }

    pub async fn run<F>(self, cancel: CancellationToken, mut sink: F)
    where
        F: FnMut(Vec<BandReportRow>),
    {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let stop = Utc::now();
                    let window = TimeWindow { start: stop - self.lookback, stop };
                    match run_window(&self.source, &self.config, window, &cancel).await {
                        Ok(rows) => sink(rows),
                        Err(PipelineError::Cancelled) => break,
                        Err(err) => warn!(error = %err, "band analytics poll failed"),
                    }
                }
            }
        }
    }
}
