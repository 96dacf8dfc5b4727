//! Harvest configuration, loaded from TOML or JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::harvest::analyzers::{
    ANNOTATION_ANALYZER, ENHANCER_ANALYZER, OVERRIDE_ANALYZER, SOURCE_ANALYZER, STORY_ANALYZER,
};
use crate::harvest::context::{ChainConfig, MergeStrategy, StageConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for a harvest over a source tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarvestConfig {
    /// Declared UI framework
    pub framework: String,

    pub design_library: Option<String>,
    pub base_import_path: Option<String>,
    pub strategy: MergeStrategy,
    pub continue_on_error: bool,

    /// Subjects harvested at once
    pub concurrency: usize,

    /// File-name markers selecting subjects
    pub include: Vec<String>,

    /// Directory names never descended into
    pub exclude: Vec<String>,

    pub stages: Vec<StageConfig>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            framework: "react".to_string(),
            design_library: None,
            base_import_path: None,
            strategy: MergeStrategy::Merge,
            continue_on_error: true,
            concurrency: 4,
            include: [".stories.tsx", ".stories.ts", ".stories.jsx", ".stories.js", ".stories.mdx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: ["node_modules", ".git", "dist"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stages: default_stages(),
        }
    }
}

/// Story, annotations, source, enhancer (off) and overrides, in that order.
pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::new(STORY_ANALYZER, 10),
        StageConfig::new(ANNOTATION_ANALYZER, 20),
        StageConfig::new(SOURCE_ANALYZER, 30),
        StageConfig::new(ENHANCER_ANALYZER, 40).disabled(),
        StageConfig::new(OVERRIDE_ANALYZER, 100),
    ]
}

impl HarvestConfig {
    /// Loads and validates a config file; the extension picks the format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let config: HarvestConfig = match extension.as_deref() {
            Some("toml") => toml::from_str(&read(path)?)?,
            Some("json") => serde_json::from_str(&read(path)?)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.framework.trim().is_empty() {
            return Err(ConfigError::Invalid("framework must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.analyzer.trim().is_empty() {
                return Err(ConfigError::Invalid("stage without an analyzer".to_string()));
            }
            if !seen.insert(stage.analyzer.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "stage '{}' declared twice",
                    stage.analyzer
                )));
            }
        }
        Ok(())
    }

    /// Chain configuration for the pipeline.
    pub fn chain(&self) -> ChainConfig {
        ChainConfig::new(self.stages.clone())
            .with_continue_on_error(self.continue_on_error)
            .with_strategy(self.strategy)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
