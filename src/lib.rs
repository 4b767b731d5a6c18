//! Band-occupancy analytics over two correlated metric streams.
//!
//! The pipeline joins raw readings with per-sensor calibration offsets,
//! classifies each calibrated sample into an ordered set of named states via
//! threshold comparison, and tracks per-state contiguous run durations and
//! entry counts across the time-ordered sequence. Storage is abstracted
//! behind [`source::MetricSource`]; a Postgres implementation and an
//! in-memory one for tests are provided.

pub mod classify;
pub mod config;
pub mod error;
pub mod join;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod thresholds;
pub mod tracker;
pub mod types;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{run_window, BandAnalyticsService};
pub use report::BandReportRow;
pub use source::{MemoryMetricSource, MetricSource, PgMetricSource, SampleQuery};
pub use thresholds::ThresholdSet;
pub use tracker::{RunTracker, SamplePoint, StateRunStats};
pub use types::{CalibratedSample, ClassifiedSample, Sample, StateSet, TimeWindow};
