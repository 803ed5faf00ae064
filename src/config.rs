// SYNOID Dub Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Run settings, from the environment (.env + SYNOID_DUB_*) or a JSON file,
// plus the logging setup shared by every entry point.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::{DubError, DubResult};
use crate::timeline::{BoundaryPolicy, CorrectionPolicy};

const ENV_PREFIX: &str = "SYNOID_DUB_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DubConfig {
    /// Length of one dialogue window in seconds.
    pub window_seconds: f64,
    /// Sample rate of the assembled dub track.
    pub sample_rate: u32,
    /// Clips synthesized at once. 1 keeps the cloning model strictly sequential.
    pub max_concurrent_clips: usize,
    /// Parent of the per-run scratch directories.
    pub work_dir: PathBuf,
    /// Whisper model cache.
    pub cache_dir: PathBuf,
    pub whisper_model: String,
    /// Spoken language hint for ASR; auto-detect when unset.
    pub language: Option<String>,
    pub use_gpu: bool,
    pub python: String,
    pub clone_script: PathBuf,
    pub correction: CorrectionPolicy,
    pub boundary: BoundaryPolicy,
    /// Keep clip renders, transcript and dub track after a successful run.
    pub keep_intermediates: bool,
}

impl Default for DubConfig {
    fn default() -> Self {
        Self {
            window_seconds: 30.0,
            sample_rate: 44_100,
            max_concurrent_clips: 1,
            work_dir: PathBuf::from(".synoid_dub"),
            cache_dir: default_cache_dir(),
            whisper_model: "small".to_string(),
            language: None,
            use_gpu: false,
            python: "python".to_string(),
            clone_script: PathBuf::from("tools/synoid_clone.py"),
            correction: CorrectionPolicy::default(),
            boundary: BoundaryPolicy::default(),
            keep_intermediates: false,
        }
    }
}

/// `$SYNOID_CACHE_DIR/models`, else the platform cache dir.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(cache_env) = std::env::var("SYNOID_CACHE_DIR") {
        PathBuf::from(cache_env).join("models")
    } else {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synoid")
            .join("models")
    }
}

impl DubConfig {
    /// Defaults overridden by `.env` and `SYNOID_DUB_*` variables.
    pub fn from_env() -> DubResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_json_file(path: &Path) -> DubResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DubError::input(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DubError::input(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        info!("[DUB] Loaded config from {:?}", path);
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DubResult<Self> {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(v) = var("WINDOW_SECONDS") {
            config.window_seconds = parse_var("WINDOW_SECONDS", &v)?;
        }
        if let Some(v) = var("SAMPLE_RATE") {
            config.sample_rate = parse_var("SAMPLE_RATE", &v)?;
        }
        if let Some(v) = var("CONCURRENCY") {
            config.max_concurrent_clips = parse_var("CONCURRENCY", &v)?;
        }
        if let Some(v) = var("WORK_DIR") {
            config.work_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SYNOID_CACHE_DIR").filter(|v| !v.is_empty()) {
            config.cache_dir = PathBuf::from(v).join("models");
        }
        if let Some(v) = var("WHISPER_MODEL") {
            config.whisper_model = v;
        }
        if let Some(v) = var("LANGUAGE") {
            config.language = Some(v);
        }
        if let Some(v) = var("USE_GPU") {
            config.use_gpu = parse_flag("USE_GPU", &v)?;
        }
        if let Some(v) = var("PYTHON") {
            config.python = v;
        }
        if let Some(v) = var("CLONE_SCRIPT") {
            config.clone_script = PathBuf::from(v);
        }
        if let Some(v) = var("BOUNDARY") {
            config.boundary = match v.to_lowercase().as_str() {
                "fully_contained" | "contained" => BoundaryPolicy::FullyContained,
                "midpoint" => BoundaryPolicy::Midpoint,
                other => {
                    return Err(DubError::input(format!(
                        "{}BOUNDARY: unknown policy '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(v) = var("KEEP_INTERMEDIATES") {
            config.keep_intermediates = parse_flag("KEEP_INTERMEDIATES", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DubResult<()> {
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(DubError::input(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if self.sample_rate == 0 {
            return Err(DubError::input("sample_rate must be non-zero"));
        }
        if self.max_concurrent_clips == 0 {
            return Err(DubError::input("max_concurrent_clips must be at least 1"));
        }
        let c = &self.correction;
        if !(c.min_rate > 0.0 && c.min_rate <= 1.0 && c.max_rate >= 1.0) {
            return Err(DubError::input(format!(
                "correction rates must bracket 1.0, got {}..{}",
                c.min_rate, c.max_rate
            )));
        }
        if c.tolerance_secs < 0.0 || c.min_render_secs < 0.0 {
            return Err(DubError::input("correction thresholds must be non-negative"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> DubResult<T> {
    value.parse().map_err(|_| {
        DubError::input(format!("{}{}: cannot parse '{}'", ENV_PREFIX, name, value))
    })
}

fn parse_flag(name: &str, value: &str) -> DubResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DubError::input(format!(
            "{}{}: expected a boolean, got '{}'",
            ENV_PREFIX, name, value
        ))),
    }
}

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_logging() {
    // Silence noisy decoder logs unless the user asked otherwise
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,symphonia=error,whisper_rs=warn");
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DubConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.window_seconds, 30.0);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.max_concurrent_clips, 1);
        assert_eq!(config.boundary, BoundaryPolicy::FullyContained);
        assert!(!config.keep_intermediates);
    }

    #[test]
    fn test_env_overrides() {
        let config = DubConfig::from_lookup(lookup(&[
            ("SYNOID_DUB_WINDOW_SECONDS", "10"),
            ("SYNOID_DUB_CONCURRENCY", "3"),
            ("SYNOID_DUB_BOUNDARY", "midpoint"),
            ("SYNOID_DUB_LANGUAGE", "en"),
            ("SYNOID_DUB_KEEP_INTERMEDIATES", "yes"),
            ("SYNOID_CACHE_DIR", "/data/cache"),
        ]))
        .unwrap();
        assert_eq!(config.window_seconds, 10.0);
        assert_eq!(config.max_concurrent_clips, 3);
        assert_eq!(config.boundary, BoundaryPolicy::Midpoint);
        assert_eq!(config.language.as_deref(), Some("en"));
        assert!(config.keep_intermediates);
        assert_eq!(config.cache_dir, PathBuf::from("/data/cache/models"));
    }

    #[test]
    fn test_bad_values_are_input_errors() {
        for (k, v) in [
            ("SYNOID_DUB_WINDOW_SECONDS", "0"),
            ("SYNOID_DUB_WINDOW_SECONDS", "soon"),
            ("SYNOID_DUB_CONCURRENCY", "0"),
            ("SYNOID_DUB_BOUNDARY", "nearest"),
            ("SYNOID_DUB_USE_GPU", "maybe"),
        ] {
            let err = DubConfig::from_lookup(lookup(&[(k, v)])).unwrap_err();
            assert!(matches!(err, DubError::Input(_)), "{}={} gave {}", k, v, err);
        }
    }

    #[test]
    fn test_json_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dub.json");
        std::fs::write(
            &path,
            r#"{ "window_seconds": 12.5, "correction": { "tolerance_secs": 0.1 } }"#,
        )
        .unwrap();

        let config = DubConfig::from_json_file(&path).unwrap();
        assert_eq!(config.window_seconds, 12.5);
        assert_eq!(config.correction.tolerance_secs, 0.1);
        assert_eq!(config.correction.max_rate, 2.0);
        assert_eq!(config.sample_rate, 44_100);
    }

    #[test]
    fn test_json_file_rejects_inverted_rates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dub.json");
        std::fs::write(&path, r#"{ "correction": { "min_rate": 2.0, "max_rate": 0.5 } }"#)
            .unwrap();
        assert!(matches!(
            DubConfig::from_json_file(&path),
            Err(DubError::Input(_))
        ));
    }
}
