// iv_chart/src/main.rs
//
// Headless driver: polls the IV endpoint for one symbol, optionally backfills
// from the CSV export first, and logs every pipeline outcome.
//
//   iv_chart <SYMBOL> [--bulk]
//
// Log level via RUST_LOG (e.g. RUST_LOG=iv_chart=debug,pipeline.apply=debug).

use anyhow::{bail, Context, Result};
use iv_chart::poller::{self, Poller};
use iv_chart::source::{CsvBulkLoader, HttpSource};
use iv_chart::{HeadlessSink, PipelineConfig, PipelineEvent, UpdateScheduler};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Args {
    symbol: String,
    bulk: bool,
}

fn parse_args() -> Result<Args> {
    let mut symbol = None;
    let mut bulk = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--bulk" => bulk = true,
            s if s.starts_with("--") => bail!("unknown flag {s}"),
            s => symbol = Some(s.to_string()),
        }
    }
    let Some(symbol) = symbol.filter(|s| !s.trim().is_empty()) else {
        bail!("usage: iv_chart <SYMBOL> [--bulk]");
    };
    Ok(Args { symbol, bulk })
}

fn load_config() -> Result<PipelineConfig> {
    let path = PipelineConfig::resolve_path()?;
    let cfg = PipelineConfig::load(&path);
    if !path.exists() {
        // First run: leave an editable copy behind.
        if let Err(err) = cfg.save(&path) {
            tracing::warn!("could not write default config to {:?}: {err:#}", path);
        }
    }
    tracing::info!("config {:?}", path);
    Ok(cfg)
}

fn report(ev: &PipelineEvent) {
    match ev {
        PipelineEvent::Reset { symbol } => tracing::info!("switched to {symbol}"),
        PipelineEvent::Applied {
            symbol,
            origin,
            points,
            viewport,
        } => tracing::info!(
            "{symbol}: {} batch applied, {points} points, viewport {}",
            origin.as_str(),
            viewport.as_str()
        ),
        PipelineEvent::StaleDropped { symbol, origin } => {
            tracing::debug!("{symbol}: stale {} batch dropped", origin.as_str())
        }
        PipelineEvent::Recovered { symbol, error } => {
            tracing::warn!("{symbol}: batch rejected ({error}); showing last good data")
        }
        PipelineEvent::Rejected { symbol, error } => {
            tracing::warn!("{symbol}: batch rejected ({error}); nothing to show yet")
        }
        PipelineEvent::RenderWarning { symbol, message } => {
            tracing::error!("{symbol}: chart update failed: {message}")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let cfg = load_config()?;

    let (scheduler, mut events) = UpdateScheduler::new(HeadlessSink::new(), &cfg);
    scheduler.switch_symbol(&args.symbol);

    if args.bulk {
        let loader = CsvBulkLoader::new(&cfg.data_dir);
        match poller::backfill(&scheduler, &loader).await {
            Ok(true) => {}
            Ok(false) => tracing::info!("backfill for {} skipped", args.symbol),
            Err(err) => tracing::warn!("backfill for {} failed: {err}", args.symbol),
        }
    }

    let source = HttpSource::new(&cfg.base_url, cfg.request_timeout())
        .context("building HTTP client")?;
    let poller = Poller::spawn(scheduler.clone(), Arc::new(source), cfg.poll_interval());
    tracing::info!(
        "polling {} every {:?} for {}",
        cfg.base_url,
        cfg.poll_interval(),
        args.symbol
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            Some(ev) = events.recv() => report(&ev),
            _ = &mut ctrl_c => {
                tracing::info!("ctrl-c; stopping");
                break;
            }
        }
    }

    poller.stop();
    scheduler.flush().await;
    if let Some(snap) = scheduler.snapshot() {
        tracing::info!("final snapshot for {}: {} points", snap.symbol, snap.series.len());
    }
    Ok(())
}
