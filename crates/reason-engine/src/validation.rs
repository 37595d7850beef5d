//! Agreement of a finished run with known annotations.

use std::collections::{BTreeMap, HashSet};

use reason_common::CandidateKind;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::report::RunReport;

/// Known disease genes/targets, drugs, treatments and pathways.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownAnnotations {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub drugs: Vec<String>,
    #[serde(default)]
    pub treatments: Vec<String>,
    #[serde(default)]
    pub pathways: Vec<String>,
}

impl KnownAnnotations {
    pub fn for_kind(&self, kind: CandidateKind) -> &[String] {
        match kind {
            CandidateKind::Target => &self.targets,
            CandidateKind::Drug => &self.drugs,
            CandidateKind::Treatment => &self.treatments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.drugs.is_empty() && self.treatments.is_empty() && self.pathways.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryValidation {
    pub known: usize,
    pub k: usize,
    /// Known entries found in the top k, in ranked order
    pub hits: Vec<String>,
    pub precision_at_k: f64,
    pub recall_at_k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    /// Keyed by "target", "drug", "treatment", "pathway"
    pub categories: BTreeMap<String, CategoryValidation>,
    /// Mean recall@k over categories with known entries; 0.0 if none
    pub overall_score: f64,
}

fn score_category(ranked: &[&str], known: &[String], k: usize) -> CategoryValidation {
    let known_set: HashSet<&str> = known.iter().map(String::as_str).collect();
    let k = k.min(ranked.len());
    let hits: Vec<String> = ranked[..k]
        .iter()
        .filter(|id| known_set.contains(*id))
        .map(|id| id.to_string())
        .collect();
    let precision_at_k = if k == 0 { 0.0 } else { hits.len() as f64 / k as f64 };
    let recall_at_k = if known_set.is_empty() { 0.0 } else { hits.len() as f64 / known_set.len() as f64 };
    CategoryValidation { known: known_set.len(), k, hits, precision_at_k, recall_at_k }
}

/// Precision/recall at `k` of every ranked list and the pathway list.
pub fn validate_against_known(report: &RunReport, known: &KnownAnnotations, k: usize) -> ValidationSummary {
    let mut categories = BTreeMap::new();

    for kind in CandidateKind::ALL {
        let expected = known.for_kind(kind);
        if expected.is_empty() {
            continue;
        }
        let ranked = report.ranked_ids(kind);
        categories.insert(kind.to_string(), score_category(&ranked, expected, k));
    }
    if !known.pathways.is_empty() {
        let pathways: Vec<&str> = report.pathways.iter().map(|p| p.pathway_id.as_str()).collect();
        categories.insert("pathway".to_string(), score_category(&pathways, &known.pathways, k));
    }

    let overall_score = if categories.is_empty() {
        0.0
    } else {
        categories.values().map(|c| c.recall_at_k).sum::<f64>() / categories.len() as f64
    };
    info!(categories = categories.len(), overall_score, "Validated against known annotations");
    ValidationSummary { categories, overall_score }
}
