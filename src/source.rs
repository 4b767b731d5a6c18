use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::types::Sample;

/// Filter for a metric source lookup: a series, the field within it, and any
/// number of exact-match tag filters.
#[derive(Debug, Clone)]
pub struct SampleQuery {
    pub series: String,
    pub field: String,
    pub tags: Vec<(String, String)>,
}

/// External time-series collaborator. Reads are idempotent and safe to retry;
/// implementations must attribute every sample to a `(timestamp, sensor_id,
/// unit)` key so the calibration join can align streams.
#[allow(async_fn_in_trait)]
pub trait MetricSource {
    /// Most recent sample matching the query, if any.
    async fn query_latest(&self, query: &SampleQuery) -> Result<Option<Sample>>;

    /// Samples with `start <= ts < stop`, ascending by timestamp.
    async fn query_range(
        &self,
        query: &SampleQuery,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Sample>>;
}

#[derive(Debug, Clone, FromRow)]
struct SampleRow {
    ts: DateTime<Utc>,
    value: f64,
    sensor_id: String,
    unit: String,
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Self {
            timestamp: row.ts,
            sensor_id: row.sensor_id,
            unit: row.unit,
            value: row.value,
        }
    }
}

/// Postgres-backed metric source over a `metrics` table with `series`,
/// `field`, `tags` (jsonb), `ts`, and `value` columns.
#[derive(Clone)]
pub struct PgMetricSource {
    pool: PgPool,
}

impl PgMetricSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .context("failed to connect to metrics database")?;
        Ok(Self::new(pool))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &SampleQuery) {
    qb.push(" WHERE series = ").push_bind(query.series.clone());
    qb.push(" AND field = ").push_bind(query.field.clone());
    for (key, value) in &query.tags {
        qb.push(" AND tags->>")
            .push_bind(key.clone())
            .push(" = ")
            .push_bind(value.clone());
    }
}

const SELECT_SAMPLE: &str = "SELECT ts, value, \
     COALESCE(tags->>'sensor_id', '') AS sensor_id, \
     COALESCE(tags->>'unit', '') AS unit \
     FROM metrics";

impl MetricSource for PgMetricSource {
    async fn query_latest(&self, query: &SampleQuery) -> Result<Option<Sample>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_SAMPLE);
        push_filters(&mut qb, query);
        qb.push(" ORDER BY ts DESC LIMIT 1");

        let row: Option<SampleRow> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("latest-sample query failed for field {}", query.field))?;
        Ok(row.map(Sample::from))
    }

    async fn query_range(
        &self,
        query: &SampleQuery,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_SAMPLE);
        push_filters(&mut qb, query);
        qb.push(" AND ts >= ").push_bind(start);
        qb.push(" AND ts < ").push_bind(stop);
        qb.push(" ORDER BY ts ASC");

        let rows: Vec<SampleRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("range query failed for field {}", query.field))?;
        Ok(rows.into_iter().map(Sample::from).collect())
    }
}

#[derive(Debug, Clone)]
struct MemoryRecord {
    series: String,
    field: String,
    tags: HashMap<String, String>,
    sample: Sample,
}

/// Deterministic in-memory metric source for tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetricSource {
    records: Vec<MemoryRecord>,
    fail_queries: bool,
}

impl MemoryMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every query fails, for exercising abort paths.
    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail_queries: true,
        }
    }

    pub fn push(&mut self, series: &str, field: &str, tags: &[(&str, &str)], sample: Sample) {
        let mut tag_map: HashMap<String, String> = tags
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        if !sample.sensor_id.is_empty() {
            tag_map
                .entry("sensor_id".to_string())
                .or_insert_with(|| sample.sensor_id.clone());
        }
        if !sample.unit.is_empty() {
            tag_map
                .entry("unit".to_string())
                .or_insert_with(|| sample.unit.clone());
        }
        self.records.push(MemoryRecord {
            series: series.to_string(),
            field: field.to_string(),
            tags: tag_map,
            sample,
        });
    }

    fn matching<'a>(&'a self, query: &'a SampleQuery) -> impl Iterator<Item = &'a MemoryRecord> {
        self.records.iter().filter(move |record| {
            record.series == query.series
                && record.field == query.field
                && query
                    .tags
                    .iter()
                    .all(|(key, value)| record.tags.get(key) == Some(value))
        })
    }
}

impl MetricSource for MemoryMetricSource {
    async fn query_latest(&self, query: &SampleQuery) -> Result<Option<Sample>> {
        if self.fail_queries {
            anyhow::bail!("memory source configured to fail");
        }
        Ok(self
            .matching(query)
            .max_by_key(|record| record.sample.timestamp)
            .map(|record| record.sample.clone()))
    }

    async fn query_range(
        &self,
        query: &SampleQuery,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        if self.fail_queries {
            anyhow::bail!("memory source configured to fail");
        }
        let mut samples: Vec<Sample> = self
            .matching(query)
            .filter(|record| record.sample.timestamp >= start && record.sample.timestamp < stop)
            .map(|record| record.sample.clone())
            .collect();
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(samples)
    }
}
