use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::error;

use band_analytics::{
    pipeline, BandAnalyticsService, BandReportRow, Config, PgMetricSource, TimeWindow,
};

#[derive(Debug, Parser)]
#[command(name = "band-analytics", about = "Per-state occupancy statistics from calibrated telemetry")]
struct Cli {
    /// Window start (RFC 3339). Requires --stop.
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Window stop (RFC 3339, exclusive). Requires --start.
    #[arg(long)]
    stop: Option<DateTime<Utc>>,

    /// Lookback from now when --start/--stop are not given.
    #[arg(long, default_value_t = 3600)]
    last_seconds: i64,

    #[arg(long, value_enum, default_value = "json")]
    format: Format,

    /// Re-run on this cadence instead of exiting after one pass.
    #[arg(long)]
    interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,band_analytics=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn resolve_window(cli: &Cli) -> Result<TimeWindow> {
    match (cli.start, cli.stop) {
        (Some(start), Some(stop)) => Ok(TimeWindow::new(start, stop)?),
        (None, None) => {
            let stop = Utc::now();
            let start = stop - ChronoDuration::seconds(cli.last_seconds.max(1));
            Ok(TimeWindow { start, stop })
        }
        _ => anyhow::bail!("--start and --stop must be given together"),
    }
}

fn write_rows(format: Format, rows: &[BandReportRow]) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::to_string_pretty(rows)?;
            println!("{out}");
        }
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .clone()
        .context("BAND_DATABASE_URL or DATABASE_URL is required")?;
    let source = PgMetricSource::connect(&database_url, config.db_pool_size).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            cancel.cancel();
        });
    }

    if let Some(interval) = cli.interval_seconds {
        let lookback = ChronoDuration::seconds(cli.last_seconds.max(1));
        let format = cli.format;
        let service = BandAnalyticsService::new(
            source,
            config,
            Duration::from_secs(interval.max(1)),
            lookback,
        );
        service
            .run(cancel, move |rows| {
                if let Err(err) = write_rows(format, &rows) {
                    error!(error = %err, "failed to write report rows");
                }
            })
            .await;
    } else {
        let window = resolve_window(&cli)?;
        let rows = pipeline::run_window(&source, &config, window, &cancel).await?;
        write_rows(cli.format, &rows)?;
    }

    Ok(())
}
