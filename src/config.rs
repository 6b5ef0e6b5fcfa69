//! Tiered configuration (§6, §10): compiled-in defaults < `cascade.yml` <
//! environment variables, last writer wins. Mirrors the layered-YAML config
//! style used elsewhere in this codebase, simplified to scalar fields since
//! §6 has no array-valued settings to union-merge.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine-wide tunables (§6 "Environment / configuration (enumerated)").
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub embedder_enabled: bool,
    pub cache_capacity: usize,
    pub fts_candidate_cap: usize,
    pub hybrid_alpha: f32,
    pub hybrid_threshold: f32,
    pub metadata_max_results: usize,
    pub embedder_model_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            embedder_enabled: true,
            cache_capacity: 512,
            fts_candidate_cap: 20,
            hybrid_alpha: 0.7,
            hybrid_threshold: 0.5,
            metadata_max_results: 5,
            embedder_model_id: "minishlab/potion-base-8M".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cascade-docs")
}

/// Optional on-disk overlay — every field is optional so a partial
/// `cascade.yml` only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    embedder_enabled: Option<bool>,
    cache_capacity: Option<usize>,
    fts_candidate_cap: Option<usize>,
    hybrid_alpha: Option<f32>,
    hybrid_threshold: Option<f32>,
    metadata_max_results: Option<usize>,
    embedder_model_id: Option<String>,
}

impl Config {
    /// Load defaults, overlay `path` if it exists and parses, then overlay
    /// environment variables. Parse errors in the file are logged and
    /// the tier is treated as empty rather than aborting — matching this
    /// codebase's existing "file tier is best-effort" convention.
    pub fn load(path: &Path) -> Self {
        let mut cfg = Config::default();
        cfg.apply_file(path);
        cfg.apply_env();
        cfg
    }

    /// Defaults + environment only, no file tier. Useful for tests and for
    /// embedding this crate where no `cascade.yml` is expected to exist.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        cfg.apply_env();
        cfg
    }

    fn apply_file(&mut self, path: &Path) {
        let Ok(text) = std::fs::read_to_string(path) else {
            return;
        };
        match serde_yaml::from_str::<ConfigFile>(&text) {
            Ok(file) => self.merge_file(file),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cascade.yml parse error, ignoring file tier"),
        }
    }

    fn merge_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.embedder_enabled {
            self.embedder_enabled = v;
        }
        if let Some(v) = file.cache_capacity {
            self.cache_capacity = v;
        }
        if let Some(v) = file.fts_candidate_cap {
            self.fts_candidate_cap = v;
        }
        if let Some(v) = file.hybrid_alpha {
            self.hybrid_alpha = v;
        }
        if let Some(v) = file.hybrid_threshold {
            self.hybrid_threshold = v;
        }
        if let Some(v) = file.metadata_max_results {
            self.metadata_max_results = v;
        }
        if let Some(v) = file.embedder_model_id {
            self.embedder_model_id = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CASCADE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_bool("CASCADE_EMBEDDER_ENABLED") {
            self.embedder_enabled = v;
        }
        if let Some(v) = env_parse("CASCADE_CACHE_CAPACITY") {
            self.cache_capacity = v;
        }
        if let Some(v) = env_parse("CASCADE_FTS_CANDIDATE_CAP") {
            self.fts_candidate_cap = v;
        }
        if let Some(v) = env_parse("CASCADE_HYBRID_ALPHA") {
            self.hybrid_alpha = v;
        }
        if let Some(v) = env_parse("CASCADE_HYBRID_THRESHOLD") {
            self.hybrid_threshold = v;
        }
        if let Some(v) = env_parse("CASCADE_METADATA_MAX_RESULTS") {
            self.metadata_max_results = v;
        }
        if let Ok(v) = std::env::var("CASCADE_EMBEDDER_MODEL_ID") {
            self.embedder_model_id = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}
