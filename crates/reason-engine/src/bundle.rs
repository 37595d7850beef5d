//! Evidence bundle: everything one disease run consumes, in one file.

use std::collections::HashSet;
use std::path::Path;

use reason_common::{ReasonError, Result};
use reason_kg::{EvidenceGraph, EvidenceRecord, InteractionRecord, LoadSummary, SeededGraph};
use reason_ranker::{CandidateSpec, ChannelRegistry, ChannelScoreRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{disease_key, GraphCache};
use crate::validation::KnownAnnotations;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    #[serde(default)]
    pub disease: String,
    #[serde(default)]
    pub entities: Vec<EvidenceRecord>,
    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
    #[serde(default)]
    pub channel_scores: Vec<ChannelScoreRecord>,
    /// Explicit candidates; when empty, derived from entity kinds
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
    #[serde(default)]
    pub known: Option<KnownAnnotations>,
}

/// Graph, candidates and channel providers ready for a run.
pub struct AnalysisInputs {
    pub graph: SeededGraph,
    pub candidates: Vec<CandidateSpec>,
    pub registry: ChannelRegistry,
    /// Present when the graph was built for these inputs; `None` on a cache hit
    pub load_summary: Option<LoadSummary>,
}

impl EvidenceBundle {
    pub fn from_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load by file extension (.json, .yaml/.yml)
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            other => anyhow::bail!("Unsupported bundle format {:?} for {}", other, path.display()),
        }
    }

    pub fn build_graph(&self) -> Result<(EvidenceGraph, LoadSummary)> {
        EvidenceGraph::from_records(&self.entities, &self.interactions)
    }

    /// Declared candidates, or one per entity whose kind maps to a candidate kind.
    pub fn candidate_specs(&self) -> Vec<CandidateSpec> {
        if !self.candidates.is_empty() {
            return self.candidates.clone();
        }
        let mut seen = HashSet::new();
        self.entities
            .iter()
            .filter_map(|e| {
                let kind = e.entity_kind.default_candidate_kind()?;
                seen.insert(e.entity_id.as_str())
                    .then(|| CandidateSpec::new(e.entity_id.clone(), kind))
            })
            .collect()
    }

    /// Build and freeze the graph, then check every candidate refers to it.
    pub fn into_inputs(self) -> Result<AnalysisInputs> {
        let (graph, load_summary) = self.build_graph()?;
        self.finish_inputs(graph.freeze(), Some(load_summary))
    }

    /// Like `into_inputs`, but reuse the graph cached for this disease or
    /// cache the one built here. Bundles without a disease are never cached.
    pub fn into_inputs_cached(self, cache: &GraphCache) -> Result<AnalysisInputs> {
        if disease_key(&self.disease).is_empty() {
            return self.into_inputs();
        }
        let mut load_summary = None;
        let graph = cache.get_or_build(&self.disease, || {
            let (graph, summary) = self.build_graph()?;
            load_summary = Some(summary);
            Ok(graph.freeze())
        })?;
        self.finish_inputs(graph, load_summary)
    }

    fn finish_inputs(self, graph: SeededGraph, load_summary: Option<LoadSummary>) -> Result<AnalysisInputs> {
        let candidates = self.candidate_specs();
        for spec in &candidates {
            if graph.index_of(&spec.entity_id).is_none() {
                return Err(ReasonError::UnknownEntity(spec.entity_id.clone()));
            }
        }
        let registry = ChannelRegistry::from_records(&self.channel_scores)?;
        info!(
            disease = %self.disease,
            candidates = candidates.len(),
            channels = registry.len(),
            cached_graph = load_summary.is_none(),
            "Evidence bundle loaded"
        );
        Ok(AnalysisInputs { graph, candidates, registry, load_summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reason_common::{CandidateKind, EntityKind};

    fn record(id: &str, kind: EntityKind) -> EvidenceRecord {
        EvidenceRecord {
            entity_id: id.into(),
            entity_kind: kind,
            value: None,
            confidence: None,
            source_tag: None,
        }
    }

    #[test]
    fn test_candidates_derived_from_entity_kinds() {
        let bundle = EvidenceBundle {
            entities: vec![
                record("LRRK2", EntityKind::Gene),
                record("dopamine", EntityKind::Metabolite),
                record("levodopa", EntityKind::Compound),
                record("DBS", EntityKind::Treatment),
            ],
            ..Default::default()
        };
        let specs = bundle.candidate_specs();
        assert_eq!(
            specs,
            vec![
                CandidateSpec::new("LRRK2", CandidateKind::Target),
                CandidateSpec::new("levodopa", CandidateKind::Drug),
                CandidateSpec::new("DBS", CandidateKind::Treatment),
            ]
        );
    }

    #[test]
    fn test_candidate_outside_graph_rejected() {
        let bundle = EvidenceBundle {
            entities: vec![record("LRRK2", EntityKind::Gene)],
            candidates: vec![CandidateSpec::new("GBA", CandidateKind::Target)],
            ..Default::default()
        };
        assert!(matches!(bundle.into_inputs(), Err(ReasonError::UnknownEntity(id)) if id == "GBA"));
    }

    #[test]
    fn test_bundle_without_disease_bypasses_cache() {
        let cache = GraphCache::new();
        let bundle = EvidenceBundle { entities: vec![record("LRRK2", EntityKind::Gene)], ..Default::default() };
        let inputs = bundle.into_inputs_cached(&cache).unwrap();
        assert!(inputs.load_summary.is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bundle_parses_from_yaml() {
        let yaml = r#"
disease: Parkinson disease
entities:
  - { entity_id: SNCA, entity_kind: gene, value: 2.0, confidence: 0.9, source_tag: rnaseq }
  - { entity_id: levodopa, entity_kind: compound }
interactions:
  - { from_id: levodopa, to_id: SNCA, kind: regulates, weight: 0.3 }
channel_scores:
  - { candidate_id: levodopa, channel_name: docking, normalized_score: 0.8 }
"#;
        let bundle: EvidenceBundle = serde_yaml::from_str(yaml).unwrap();
        let inputs = bundle.into_inputs().unwrap();
        assert_eq!(inputs.graph.entity_count(), 2);
        assert_eq!(inputs.candidates.len(), 2);
        assert_eq!(inputs.registry.len(), 1);
        assert_eq!(inputs.load_summary.unwrap().seeds, 1);
    }
}
