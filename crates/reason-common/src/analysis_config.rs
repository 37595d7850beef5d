//! Analysis configuration for one disease run.
//!
//! Loaded from TOML/YAML/JSON; every field has a serde default so a config
//! file only needs to name what it overrides. `validate()` must pass before
//! any stage runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ReasonError, Result};

/// Complete analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Disease under analysis (e.g., "Parkinson disease")
    #[serde(default)]
    pub disease: String,

    /// Depth of the analysis
    #[serde(default)]
    pub level: AnalysisLevel,

    #[serde(default)]
    pub propagation: PropagationConfig,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            disease: String::new(),
            level: AnalysisLevel::default(),
            propagation: PropagationConfig::default(),
            fusion: FusionConfig::default(),
            ranking: RankingConfig::default(),
            feedback: FeedbackConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

// ── Analysis Level ───────────────────────────────────────────────────────────

/// How far the pipeline goes after ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLevel {
    /// Propagate, fuse and rank only; no simulation feedback.
    Basic,
    /// Run the configured number of feedback passes.
    #[default]
    Standard,
    /// Run feedback up to the pass cap.
    Comprehensive,
}

// ── Propagation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Share of each iterate carried over from neighbours, in (0, 1)
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Convergence threshold on the maximum absolute score change
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Iteration cap; hitting it is reported, not fatal
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Compute each iteration across worker threads
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_damping() -> f64 { 0.85 }
fn default_epsilon() -> f64 { 1e-6 }
fn default_max_iterations() -> usize { 100 }
fn default_true() -> bool { true }

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            epsilon: default_epsilon(),
            max_iterations: default_max_iterations(),
            parallel: true,
        }
    }
}

// ── Fusion ───────────────────────────────────────────────────────────────────

/// How raw propagation scores are mapped into the [0, 1] propagation channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropagationNormalisation {
    /// |score| / max |score| over the candidates of one kind
    #[default]
    MaxAbs,
    /// Rank-based: best |score| → 1.0, worst → 1/N
    Rank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Channel name → prior weight; must sum to ~1.0
    #[serde(default = "default_priors")]
    pub priors: BTreeMap<String, f64>,

    /// Variance charged per unit of missing evidence mass (≥ 1.0)
    #[serde(default = "default_missing_penalty")]
    pub missing_evidence_penalty: f64,

    /// Confidence attached to the propagation channel
    #[serde(default = "default_propagation_confidence")]
    pub propagation_confidence: f64,

    #[serde(default)]
    pub propagation_normalisation: PropagationNormalisation,
}

pub fn default_priors() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("propagation".to_string(),          0.30),
        ("docking".to_string(),              0.20),
        ("literature".to_string(),           0.20),
        ("omics_significance".to_string(),   0.20),
        ("structural_tractability".to_string(), 0.10),
    ])
}
fn default_missing_penalty() -> f64 { 1.0 }
fn default_propagation_confidence() -> f64 { 0.8 }

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            priors: default_priors(),
            missing_evidence_penalty: default_missing_penalty(),
            propagation_confidence: default_propagation_confidence(),
            propagation_normalisation: PropagationNormalisation::default(),
        }
    }
}

/// Allowed distance of the prior sum from 1.0.
pub const PRIOR_SUM_TOLERANCE: f64 = 1e-3;

impl FusionConfig {
    pub fn prior_sum(&self) -> f64 {
        self.priors.values().sum()
    }

    /// First pair of prior keys that name the same channel, if any.
    pub fn duplicate_prior(&self) -> Option<(&str, &str)> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for name in self.priors.keys().map(String::as_str) {
            if let Some(first) = seen.insert(canonical_channel_name(name), name) {
                return Some((first, name));
            }
        }
        None
    }
}

/// Canonical spelling of an evidence channel name. Known channels and their
/// aliases fold to one name; anything else keeps its trimmed spelling.
pub fn canonical_channel_name(name: &str) -> String {
    let known = match name.trim().to_lowercase().replace('-', "_").as_str() {
        "propagation" => "propagation",
        "docking" => "docking",
        "literature" => "literature",
        "omics_significance" | "omics" => "omics_significance",
        "structural_tractability" | "structural" => "structural_tractability",
        _ => return name.trim().to_string(),
    };
    known.to_string()
}

// ── Ranking ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RankingConfig {
    /// Candidates below this composite score are excluded
    #[serde(default)]
    pub min_composite_score: f64,

    /// Channels every ranked candidate must carry
    #[serde(default)]
    pub required_channels: Vec<String>,

    /// Candidates with a wider uncertainty interval are excluded
    #[serde(default)]
    pub max_uncertainty_width: Option<f64>,
}

// ── Simulation feedback ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Candidates per ranked list submitted to the simulator
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Refinement passes requested
    #[serde(default = "default_passes")]
    pub passes: usize,

    /// Hard cap on refinement passes
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Multiplier applied to a contradicted candidate's composite score
    #[serde(default = "default_penalty")]
    pub penalty_multiplier: f64,

    /// Per-request simulator timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Added to each side of the interval on an inconclusive outcome
    #[serde(default = "default_widening")]
    pub inconclusive_widening: f64,
}

fn default_top_k() -> usize { 10 }
fn default_passes() -> usize { 1 }
fn default_max_passes() -> usize { 3 }
fn default_penalty() -> f64 { 0.5 }
fn default_timeout_secs() -> u64 { 300 }
fn default_widening() -> f64 { 0.1 }

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
            passes: default_passes(),
            max_passes: default_max_passes(),
            penalty_multiplier: default_penalty(),
            timeout_secs: default_timeout_secs(),
            inconclusive_widening: default_widening(),
        }
    }
}

// ── Execution ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker threads for propagation and fusion (0 = one per core)
    #[serde(default = "default_workers")]
    pub parallel_workers: usize,
}

fn default_workers() -> usize { 4 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { parallel_workers: default_workers() }
    }
}

// ── Helper Methods ───────────────────────────────────────────────────────────

impl AnalysisConfig {
    /// Load from TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load by file extension (.toml, .yaml/.yml, .json)
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(path),
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            Some("json") => Self::from_json(path),
            other => anyhow::bail!("Unsupported config format {:?} for {}", other, path.display()),
        }
    }

    /// Number of feedback passes this run will attempt.
    pub fn effective_feedback_passes(&self) -> usize {
        if !self.feedback.enabled {
            return 0;
        }
        match self.level {
            AnalysisLevel::Basic => 0,
            AnalysisLevel::Standard => self.feedback.passes.min(self.feedback.max_passes),
            AnalysisLevel::Comprehensive => self.feedback.max_passes,
        }
    }

    /// Reject configurations that would make any stage ill-defined.
    pub fn validate(&self) -> Result<()> {
        let p = &self.propagation;
        if !(p.damping > 0.0 && p.damping < 1.0) {
            return Err(config_err(format!("damping must be in (0, 1), got {}", p.damping)));
        }
        if !(p.epsilon.is_finite() && p.epsilon > 0.0) {
            return Err(config_err(format!("epsilon must be positive, got {}", p.epsilon)));
        }
        if p.max_iterations == 0 {
            return Err(config_err("max_iterations must be at least 1".into()));
        }

        let f = &self.fusion;
        if f.priors.is_empty() {
            return Err(config_err("at least one channel prior is required".into()));
        }
        for (name, w) in &f.priors {
            if !(w.is_finite() && *w >= 0.0) {
                return Err(config_err(format!("prior for channel '{name}' must be non-negative, got {w}")));
            }
        }
        if let Some((a, b)) = f.duplicate_prior() {
            return Err(config_err(format!("priors '{a}' and '{b}' name the same channel")));
        }
        let sum = f.prior_sum();
        if (sum - 1.0).abs() > PRIOR_SUM_TOLERANCE {
            return Err(config_err(format!("channel priors must sum to 1.0, got {sum:.4}")));
        }
        if !(f.missing_evidence_penalty.is_finite() && f.missing_evidence_penalty >= 1.0) {
            return Err(config_err(format!(
                "missing_evidence_penalty must be >= 1.0, got {}",
                f.missing_evidence_penalty
            )));
        }
        if !(0.0..=1.0).contains(&f.propagation_confidence) {
            return Err(config_err(format!(
                "propagation_confidence must be in [0, 1], got {}",
                f.propagation_confidence
            )));
        }

        let r = &self.ranking;
        if !(0.0..=1.0).contains(&r.min_composite_score) {
            return Err(config_err(format!(
                "min_composite_score must be in [0, 1], got {}",
                r.min_composite_score
            )));
        }
        if let Some(w) = r.max_uncertainty_width {
            if !(w.is_finite() && w > 0.0) {
                return Err(config_err(format!("max_uncertainty_width must be positive, got {w}")));
            }
        }

        let fb = &self.feedback;
        if fb.top_k == 0 {
            return Err(config_err("top_k must be at least 1".into()));
        }
        if fb.max_passes == 0 {
            return Err(config_err("max_passes must be at least 1".into()));
        }
        if fb.passes > fb.max_passes {
            return Err(config_err(format!(
                "passes ({}) exceeds max_passes ({})",
                fb.passes, fb.max_passes
            )));
        }
        if !(0.0..=1.0).contains(&fb.penalty_multiplier) {
            return Err(config_err(format!(
                "penalty_multiplier must be in [0, 1], got {}",
                fb.penalty_multiplier
            )));
        }
        if fb.timeout_secs == 0 {
            return Err(config_err("timeout_secs must be at least 1".into()));
        }
        if !(fb.inconclusive_widening.is_finite() && fb.inconclusive_widening >= 0.0) {
            return Err(config_err(format!(
                "inconclusive_widening must be non-negative, got {}",
                fb.inconclusive_widening
            )));
        }

        Ok(())
    }
}

fn config_err(msg: String) -> ReasonError {
    ReasonError::Configuration(msg)
}

// ── Tests ────────────────────────────────────────────────────────────────────
