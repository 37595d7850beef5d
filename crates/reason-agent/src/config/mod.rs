//! Configuration loading for the `reason` binary.
//! Reads reason.toml from the current directory or the path in REASON_CONFIG.

use reason_common::AnalysisConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Evidence bundle (.json, .yaml or .yml)
    pub bundle: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Base URL of the simulation service; feedback is skipped when unset
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for timestamped report files; stdout when unset
    pub dir: Option<String>,
    #[serde(default = "default_validation_k")]
    pub validation_k: usize,
}

fn default_validation_k() -> usize { 10 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: None, validation_k: default_validation_k() }
    }
}


impl Config {
    /// Load configuration from reason.toml.
    /// Checks REASON_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("REASON_CONFIG")
            .unwrap_or_else(|_| "reason.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy reason.example.toml to reason.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// REASON_BUNDLE and REASON_SIMULATOR_URL override the file.
    fn apply_env(&mut self) {
        if let Ok(bundle) = std::env::var("REASON_BUNDLE") {
            self.input.bundle = bundle;
        }
        if let Ok(url) = std::env::var("REASON_SIMULATOR_URL") {
            self.simulator.url = (!url.is_empty()).then_some(url);
        }
    }

    /// Report file for `disease` started at `now`, when an output directory is set.
    pub fn report_path(&self, disease: &str, now: chrono::DateTime<chrono::Utc>) -> Option<PathBuf> {
        let dir = self.output.dir.as_ref()?;
        let slug: String = disease
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        Some(Path::new(dir).join(format!("{}_{}.json", slug, now.format("%Y%m%dT%H%M%SZ"))))
    }
}
