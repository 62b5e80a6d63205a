use crate::debug_hooks;
use crate::error::SourceError;
use crate::sample::{RawBatch, RawScalar};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Live producer: one fetch per poll tick.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    async fn fetch_series(&self, symbol: &str) -> Result<RawBatch, SourceError>;
}

/// Historical producer: one load per backfill.
#[async_trait]
pub trait BulkLoader: Send + Sync + 'static {
    async fn load_bulk(&self, symbol: &str) -> Result<RawBatch, SourceError>;
}

/// Body of `/api/get_iv_data`.
#[derive(Debug, Deserialize)]
struct IvPayload {
    #[serde(default)]
    timestamps: Vec<RawScalar>,
    #[serde(default)]
    iv_values: Vec<Option<RawScalar>>,
    #[serde(default)]
    close_prices: Option<Vec<Option<RawScalar>>>,
    #[serde(default)]
    fclose_prices: Option<Vec<Option<RawScalar>>>,
    #[serde(default)]
    #[allow(dead_code)]
    last_update: Option<String>,
}

impl IvPayload {
    fn into_batch(self, symbol: &str) -> RawBatch {
        RawBatch::new(symbol, self.timestamps, self.iv_values)
            .with_aux(self.close_prices, self.fclose_prices)
    }
}

#[derive(Clone)]
pub struct HttpSource {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent("iv_chart/0.3")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self) -> String {
        format!("{}/api/get_iv_data", self.base_url)
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch_series(&self, symbol: &str) -> Result<RawBatch, SourceError> {
        let url = self.url();
        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = resp.bytes().await?;
        let payload: IvPayload = serde_json::from_slice(&body)?;
        Ok(payload.into_batch(symbol))
    }
}

/// File-system name for a symbol: anything a path cannot carry becomes `_`.
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            c => c,
        })
        .collect()
}

/// Reads `<data_dir>/<symbol>.csv` exports with a `date,iv[,close][,fclose]`
/// header. Column order is taken from the header.
#[derive(Debug, Clone)]
pub struct CsvBulkLoader {
    data_dir: PathBuf,
}

impl CsvBulkLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", sanitize_symbol(symbol)))
    }
}

#[async_trait]
impl BulkLoader for CsvBulkLoader {
    async fn load_bulk(&self, symbol: &str) -> Result<RawBatch, SourceError> {
        let path = self.path_for(symbol);
        let symbol_owned = symbol.to_string();
        let read_path = path.clone();
        let batch = tokio::task::spawn_blocking(move || read_csv(&read_path, &symbol_owned))
            .await
            .map_err(|e| SourceError::Csv {
                path: path.display().to_string(),
                reason: format!("reader task failed: {e}"),
            })??;
        debug_hooks::log_bulk_result(symbol, batch.timestamps.len(), &path);
        Ok(batch)
    }
}

struct Columns {
    date: usize,
    iv: usize,
    close: Option<usize>,
    fclose: Option<usize>,
}

fn header_columns(header: &str) -> Option<Columns> {
    let names: Vec<String> = header
        .split(',')
        .map(|h| h.trim().trim_matches('"').to_ascii_lowercase())
        .collect();
    let find = |want: &str| names.iter().position(|n| n == want);
    Some(Columns {
        date: find("date")?,
        iv: find("iv")?,
        close: find("close"),
        fclose: find("fclose"),
    })
}

// Empty or unparseable cells stay None and are counted by the validator.
fn cell(parts: &[&str], idx: usize) -> Option<RawScalar> {
    let raw = parts.get(idx)?.trim().trim_matches('"');
    raw.parse::<f64>().ok().map(RawScalar::Number)
}

fn read_csv(path: &Path, symbol: &str) -> Result<RawBatch, SourceError> {
    let f = File::open(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut lines = BufReader::new(f).lines();

    let header = match lines.next() {
        Some(Ok(h)) => h,
        Some(Err(source)) => {
            return Err(SourceError::Io {
                path: path.display().to_string(),
                source,
            })
        }
        None => {
            return Err(SourceError::Csv {
                path: path.display().to_string(),
                reason: "file is empty".to_string(),
            })
        }
    };
    let cols = header_columns(header.trim_start_matches('\u{feff}')).ok_or_else(|| SourceError::Csv {
        path: path.display().to_string(),
        reason: "header must name `date` and `iv` columns".to_string(),
    })?;

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    let mut close = Vec::new();
    let mut fclose = Vec::new();

    for line in lines.map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();
        let Some(date) = parts.get(cols.date) else { continue; };

        timestamps.push(RawScalar::Text(date.trim().trim_matches('"').to_string()));
        values.push(cell(&parts, cols.iv));
        if let Some(i) = cols.close {
            close.push(cell(&parts, i));
        }
        if let Some(i) = cols.fclose {
            fclose.push(cell(&parts, i));
        }
    }

    Ok(RawBatch::new(symbol, timestamps, values).with_aux(
        cols.close.map(|_| close),
        cols.fclose.map(|_| fclose),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("iv_chart_csv_{}_{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize_symbol("NIFTY 24500 CE"), "NIFTY_24500_CE");
        assert_eq!(sanitize_symbol("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_symbol("BANKNIFTY"), "BANKNIFTY");
    }

    #[test]
    fn payload_maps_to_batch() {
        let body = r#"{
            "timestamps": ["2025-01-01 09:15:00", "2025-01-01 09:16:00"],
            "iv_values": [14.2, null],
            "close_prices": [24500.5, 24510.0],
            "fclose_prices": [],
            "last_update": "2025-01-01 09:16:00"
        }"#;
        let payload: IvPayload = serde_json::from_str(body).unwrap();
        let batch = payload.into_batch("NIFTY");
        assert_eq!(batch.symbol, "NIFTY");
        assert_eq!(batch.timestamps.len(), 2);
        assert_eq!(batch.values[1], None);
        assert_eq!(batch.aux_a.as_ref().map(Vec::len), Some(2));

        let series = validate(&batch).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.samples()[0].aux_a, Some(24500.5));
        assert_eq!(series.samples()[0].aux_b, None);
    }

    #[test]
    fn payload_without_aux_fields() {
        let payload: IvPayload =
            serde_json::from_str(r#"{"timestamps": [1735722900], "iv_values": [12.0]}"#).unwrap();
        let batch = payload.into_batch("X");
        assert!(batch.aux_a.is_none());
        assert!(batch.aux_b.is_none());
    }

    #[test]
    fn null_timestamp_drops_only_its_sample() {
        let body = r#"{"timestamps": [null, "2025-01-01 09:16:00", true], "iv_values": [5, 6, 7]}"#;
        let payload: IvPayload = serde_json::from_str(body).unwrap();
        let batch = payload.into_batch("NIFTY");
        assert_eq!(batch.timestamps.len(), 3);

        let v = crate::validate::validate_with_stats(&batch).unwrap();
        assert_eq!(v.series.len(), 1);
        assert_eq!(v.series.samples()[0].value, 6.0);
        assert_eq!(v.stats.bad_timestamps, 2);
    }

    #[tokio::test]
    async fn csv_loads_with_header_order() {
        let dir = scratch("order");
        std::fs::write(
            dir.join("NIFTY_24500_CE.csv"),
            "fclose,date,iv,close\n\
             24600,2025-01-01 09:15:00,14.5,24500\n\
             \n\
             24610,2025-01-01 09:16:00,,24505\n\
             24620,2025-01-01 09:17:00,15.1,24512\n",
        )
        .unwrap();

        let loader = CsvBulkLoader::new(&dir);
        let batch = loader.load_bulk("NIFTY 24500 CE").await.unwrap();
        assert_eq!(batch.symbol, "NIFTY 24500 CE");
        assert_eq!(batch.timestamps.len(), 3);
        assert_eq!(batch.values[1], None);

        let series = validate(&batch).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.samples()[1].value, 15.1);
        assert_eq!(series.samples()[1].aux_a, Some(24512.0));
        assert_eq!(series.samples()[1].aux_b, Some(24620.0));
    }

    #[tokio::test]
    async fn csv_without_iv_column_is_an_error() {
        let dir = scratch("noiv");
        std::fs::write(dir.join("X.csv"), "date,close\n2025-01-01 09:15:00,1\n").unwrap();
        let err = CsvBulkLoader::new(&dir).load_bulk("X").await.unwrap_err();
        assert!(matches!(err, SourceError::Csv { .. }));
    }

    #[tokio::test]
    async fn missing_csv_is_io_error() {
        let dir = scratch("missing");
        let err = CsvBulkLoader::new(&dir).load_bulk("NOPE").await.unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
