//! Channel prior weights for evidence fusion.
//!
//! Priors are external configuration, never learned. Each channel may be
//! named once, under its canonical name or an alias.

use std::collections::BTreeMap;

use reason_common::{FusionConfig, ReasonError, Result, PRIOR_SUM_TOLERANCE};
use serde::{Deserialize, Serialize};

use crate::channels::EvidenceChannel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPriors {
    weights: BTreeMap<EvidenceChannel, f64>,
}

impl Default for ChannelPriors {
    fn default() -> Self {
        let weights = FusionConfig::default()
            .priors
            .iter()
            .map(|(name, w)| (EvidenceChannel::parse(name), *w))
            .collect();
        Self { weights }
    }
}

impl ChannelPriors {
    /// Resolve configured prior names onto channels. Two keys that resolve
    /// to the same channel are a configuration error.
    pub fn from_config(config: &FusionConfig) -> Result<Self> {
        let mut weights = BTreeMap::new();
        let mut names: BTreeMap<EvidenceChannel, &str> = BTreeMap::new();
        for (name, w) in &config.priors {
            let channel = EvidenceChannel::parse(name);
            if let Some(first) = names.insert(channel.clone(), name) {
                return Err(ReasonError::Configuration(format!(
                    "priors '{first}' and '{name}' name the same channel"
                )));
            }
            weights.insert(channel, *w);
        }
        Ok(Self { weights })
    }

    /// Prior for a channel; channels without a prior contribute nothing.
    pub fn prior(&self, channel: &EvidenceChannel) -> f64 {
        self.weights.get(channel).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Validate that all weights sum to ~1.0
    pub fn validate(&self) -> bool {
        (self.sum() - 1.0).abs() <= PRIOR_SUM_TOLERANCE
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EvidenceChannel, f64)> {
        self.weights.iter().map(|(c, w)| (c, *w))
    }
}
