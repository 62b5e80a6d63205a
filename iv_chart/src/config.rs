// iv_chart/src/config.rs

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Bump when you change config schema.
const CONFIG_VERSION: u32 = 1;

pub const CONFIG_ENV: &str = "IV_CHART_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub version: u32,

    // retention + stalled-tail cut
    pub max_points: usize,
    pub flat_epsilon: f64,

    // viewport
    pub follow_tolerance_secs: i64,
    pub follow_points: usize,

    // crosshair
    pub crosshair_tolerance_secs: i64,

    // scheduler
    pub settle_delay_ms: u64,
    pub event_buffer: usize,

    // producers
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub base_url: String,
    pub data_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,

            max_points: 10_000,
            flat_epsilon: 1e-4,

            follow_tolerance_secs: 5 * 60,
            follow_points: 50,

            crosshair_tolerance_secs: 60,

            settle_delay_ms: 100,
            event_buffer: 256,

            poll_interval_ms: 2_000,
            request_timeout_ms: 10_000,
            base_url: "http://127.0.0.1:5000".to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    /// `$IV_CHART_CONFIG` if set, else the platform config dir.
    pub fn resolve_path() -> Result<PathBuf> {
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            if !p.trim().is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        default_config_path()
    }

    /// Missing file means defaults. A file that fails to parse is moved aside
    /// and defaults are used, so a bad edit never blocks startup.
    pub fn load(path: &Path) -> PipelineConfig {
        if !path.exists() {
            return PipelineConfig::default();
        }
        match read_json::<PipelineConfig>(path) {
            Ok(mut cfg) => {
                // simple migration hook
                if cfg.version == 0 {
                    cfg.version = CONFIG_VERSION;
                }
                cfg
            }
            Err(err) => {
                archive_corrupt(path, &err);
                PipelineConfig::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("config path has no parent")?;
        fs::create_dir_all(parent).with_context(|| format!("create config dir {:?}", parent))?;
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }
}

fn default_config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "ivchart", "iv_chart")
        .context("ProjectDirs::from returned None")?;
    Ok(proj.config_dir().join("config.json"))
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "ivchart", "iv_chart")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {:?}", path))?;
    let value = serde_json::from_slice::<T>(&bytes).with_context(|| "parse json")?;
    Ok(value)
}

fn archive_corrupt(path: &Path, err: &anyhow::Error) {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let archived = path.with_extension(format!("corrupt.{ts}.json"));
    let _ = fs::rename(path, &archived);
    log::warn!(target: "config", "config corrupt; archived to {:?}. error: {err:#}", archived);
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().context("no parent dir for config path")?;
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    {
        let mut f = fs::File::create(&tmp).with_context(|| format!("create tmp {:?}", tmp))?;
        f.write_all(bytes).with_context(|| "write tmp")?;
        let _ = f.sync_all();
    }

    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("iv_chart_cfg_{}_{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("config.json")
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = scratch("missing");
        assert_eq!(PipelineConfig::load(&path), PipelineConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch("partial");
        fs::write(&path, r#"{ "max_points": 500, "poll_interval_ms": 750 }"#).unwrap();
        let cfg = PipelineConfig::load(&path);
        assert_eq!(cfg.max_points, 500);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(750));
        assert_eq!(cfg.follow_points, 50);
        assert_eq!(cfg.version, CONFIG_VERSION);
    }

    #[test]
    fn corrupt_file_is_archived() {
        let path = scratch("corrupt");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(PipelineConfig::load(&path), PipelineConfig::default());
        assert!(!path.exists());
    }

    #[test]
    fn save_then_load() {
        let path = scratch("save");
        let mut cfg = PipelineConfig::default();
        cfg.base_url = "http://feed.local:8080".to_string();
        cfg.flat_epsilon = 0.01;
        cfg.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path), cfg);
    }

    #[test]
    #[serial]
    fn env_var_overrides_path() {
        std::env::set_var(CONFIG_ENV, "/tmp/iv_chart_custom.json");
        let p = PipelineConfig::resolve_path().unwrap();
        std::env::remove_var(CONFIG_ENV);
        assert_eq!(p, PathBuf::from("/tmp/iv_chart_custom.json"));
    }
}
