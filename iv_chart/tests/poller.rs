use async_trait::async_trait;
use iv_chart::poller::{backfill, Poller};
use iv_chart::source::{BulkLoader, CsvBulkLoader, DataSource};
use iv_chart::{
    HeadlessSink, PipelineConfig, PipelineEvent, RawBatch, RawScalar, SourceError, UpdateScheduler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const T0: i64 = 1_735_722_900;

fn config() -> PipelineConfig {
    PipelineConfig {
        settle_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

/// Grows the series by one minute per call; every third call fails.
struct ScriptedSource {
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedSource {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn fetch_series(&self, symbol: &str) -> Result<RawBatch, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if n % 3 == 0 {
            return Err(SourceError::Status {
                status: 503,
                url: "http://test/api/get_iv_data".into(),
            });
        }
        let ts = (0..n).map(|i| RawScalar::from(T0 + 60 * i as i64)).collect();
        let vals = (0..n).map(|i| Some(RawScalar::from(12.0 + i as f64 * 0.25))).collect();
        Ok(RawBatch::new(symbol, ts, vals))
    }
}

#[tokio::test]
async fn poller_feeds_active_symbol_and_skips_failures() {
    let (scheduler, mut events) = UpdateScheduler::new(HeadlessSink::new(), &config());
    let source = Arc::new(ScriptedSource::new(Duration::ZERO));

    // Idle ticks before a symbol is chosen are harmless.
    let poller = Poller::spawn(scheduler.clone(), source.clone(), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    scheduler.switch_symbol("NIFTY");
    while source.calls.load(Ordering::SeqCst) < 5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    poller.stop();
    scheduler.flush().await;

    let mut applied = 0;
    while let Ok(ev) = events.try_recv() {
        if let PipelineEvent::Applied { symbol, .. } = ev {
            assert_eq!(symbol, "NIFTY");
            applied += 1;
        }
    }
    assert!(applied >= 3);
    assert!(scheduler.with_sink(|s| s.applies()).await >= 3);
}

#[tokio::test]
async fn in_flight_poll_for_previous_symbol_is_dropped() {
    let (scheduler, mut events) = UpdateScheduler::new(HeadlessSink::new(), &config());
    let source = Arc::new(ScriptedSource::new(Duration::from_millis(60)));
    scheduler.switch_symbol("NIFTY");
    scheduler.flush().await;

    let poller = Poller::spawn(scheduler.clone(), source.clone(), Duration::from_secs(3600));
    // First tick fires immediately; switch while the fetch is sleeping.
    while source.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    scheduler.switch_symbol("BANKNIFTY");
    tokio::time::sleep(Duration::from_millis(120)).await;
    poller.stop();
    scheduler.flush().await;

    assert!(scheduler.snapshot().is_none());
    assert_eq!(scheduler.with_sink(|s| s.applies()).await, 0);
    let mut saw_stale = false;
    while let Ok(ev) = events.try_recv() {
        assert!(!matches!(ev, PipelineEvent::Applied { .. }));
        saw_stale |= matches!(ev, PipelineEvent::StaleDropped { ref symbol, .. } if symbol == "NIFTY");
    }
    assert!(saw_stale);
}

#[tokio::test]
async fn backfill_loads_csv_for_active_symbol() {
    let dir = std::env::temp_dir().join(format!("iv_chart_backfill_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("NIFTY_24500_CE.csv"),
        "date,iv,close,fclose\n\
         2025-01-01 09:15:00,14.5,24500,24600\n\
         2025-01-01 09:16:00,14.7,24505,24610\n\
         2025-01-01 09:16:00,14.9,24506,24611\n\
         2025-01-01 09:17:00,15.1,24512,24620\n",
    )
    .unwrap();

    let (scheduler, _events) = UpdateScheduler::new(HeadlessSink::new(), &config());
    let loader = CsvBulkLoader::new(&dir);

    // No active symbol yet.
    assert!(!backfill(&scheduler, &loader).await.unwrap());

    scheduler.switch_symbol("NIFTY 24500 CE");
    assert!(backfill(&scheduler, &loader).await.unwrap());
    scheduler.flush().await;

    let snap = scheduler.snapshot().unwrap();
    assert_eq!(snap.series.len(), 3);
    assert_eq!(snap.series.samples()[1].value, 14.9);
    assert_eq!(snap.series.last().and_then(|s| s.aux_b), Some(24620.0));
}

#[tokio::test]
async fn backfill_surfaces_missing_file() {
    let (scheduler, _events) = UpdateScheduler::new(HeadlessSink::new(), &config());
    scheduler.switch_symbol("NOPE");
    let loader = CsvBulkLoader::new(std::env::temp_dir().join("iv_chart_no_such_dir"));
    let err = backfill(&scheduler, &loader).await.unwrap_err();
    assert!(matches!(err, SourceError::Io { .. }));
    assert!(loader.load_bulk("NOPE").await.is_err());
}
