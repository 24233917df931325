//! Knowledge base configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists or it does not parse.

use crate::search::SearchOptions;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    pub data: DataConfig,
    pub search: SearchConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the record files (one subdirectory per kind).
    pub dir: PathBuf,
    /// File extensions read as records.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    /// Append glossary terms related to glossary hits.
    pub expand_related: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_depth: usize,
    /// Upper bound on traversal depth; larger requests are clamped.
    pub max_depth: usize,
}

// ============================================================
// Defaults
// ============================================================

impl Default for DataConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("data"), extensions: vec!["yaml".into(), "yml".into()] }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 20, expand_related: false }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_depth: 2, max_depth: 6 }
    }
}

// ============================================================
// Loading
// ============================================================

impl KbConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// `<config dir>/anticorrupt/kb.toml`, or `kb.toml` when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("anticorrupt").join("kb.toml"))
            .unwrap_or_else(|| PathBuf::from("kb.toml"))
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn store(&self) -> RecordStore {
        RecordStore::new(&self.data.dir).with_extensions(&self.data.extensions)
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions { limit: Some(self.search.default_limit), expand_related: self.search.expand_related }
    }

    pub fn clamp_depth(&self, depth: Option<usize>) -> usize {
        depth.unwrap_or(self.query.default_depth).min(self.query.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kb.toml");
        std::fs::write(&path, "[query]\nmax_depth = 3\n").unwrap();
        let config = KbConfig::load(&path);
        assert_eq!(config.query.max_depth, 3);
        assert_eq!(config.query.default_depth, 2);
        assert_eq!(config.search.default_limit, 20);
        assert_eq!(config.data.dir, PathBuf::from("data"));
    }

    #[test]
    fn missing_or_broken_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(KbConfig::load(&tmp.path().join("absent.toml")), KbConfig::default());
        let broken = tmp.path().join("broken.toml");
        std::fs::write(&broken, "[query\n").unwrap();
        assert_eq!(KbConfig::load(&broken), KbConfig::default());
    }

    #[test]
    fn dump_reparses() {
        let text = KbConfig::default().to_toml();
        let back: KbConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, KbConfig::default());
    }

    #[test]
    fn depth_is_clamped() {
        let config = KbConfig::default();
        assert_eq!(config.clamp_depth(None), 2);
        assert_eq!(config.clamp_depth(Some(50)), 6);
    }
}
