//! Seeded graphs cached by disease.
//!
//! A cached graph is an immutable snapshot; runs share it through
//! `SeededGraph`'s `Arc` without locking.

use dashmap::DashMap;
use reason_common::Result;
use reason_kg::SeededGraph;
use tracing::debug;

#[derive(Default)]
pub struct GraphCache {
    graphs: DashMap<String, SeededGraph>,
}

/// "Parkinson's Disease", "parkinson's-disease" and "  parkinson's  disease "
/// share one key.
pub fn disease_key(disease: &str) -> String {
    disease
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, disease: &str) -> Option<SeededGraph> {
        self.graphs.get(&disease_key(disease)).map(|g| g.value().clone())
    }

    pub fn insert(&self, disease: &str, graph: SeededGraph) {
        self.graphs.insert(disease_key(disease), graph);
    }

    /// Cached snapshot, or build, cache and return one. A failed build caches
    /// nothing.
    ///
    /// The build runs without holding a map lock, so it may itself read the
    /// cache. Concurrent misses on one key may each build; the first insert
    /// wins and every caller gets that snapshot.
    pub fn get_or_build<F>(&self, disease: &str, build: F) -> Result<SeededGraph>
    where
        F: FnOnce() -> Result<SeededGraph>,
    {
        let key = disease_key(disease);
        if let Some(graph) = self.graphs.get(&key) {
            debug!(disease = %key, "Graph cache hit");
            return Ok(graph.value().clone());
        }
        debug!(disease = %key, "Graph cache miss; building");
        let built = build()?;
        let graph = self.graphs.entry(key).or_insert(built).value().clone();
        Ok(graph)
    }

    pub fn remove(&self, disease: &str) -> Option<SeededGraph> {
        self.graphs.remove(&disease_key(disease)).map(|(_, g)| g)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn clear(&self) {
        self.graphs.clear();
        debug!("Graph cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reason_common::{EntityKind, ReasonError};
    use reason_kg::{Entity, EvidenceGraph};

    fn graph() -> Result<SeededGraph> {
        let mut g = EvidenceGraph::new();
        g.add_entity(Entity::new("SNCA", EntityKind::Gene))?;
        Ok(g.freeze())
    }

    #[test]
    fn test_disease_key_normalization() {
        assert_eq!(disease_key("  Parkinson's   Disease "), "parkinson's disease");
        assert_eq!(disease_key("parkinson's-disease"), "parkinson's disease");
    }

    #[test]
    fn test_get_or_build_reuses_snapshot() {
        let cache = GraphCache::new();
        let first = cache.get_or_build("Parkinson disease", graph).unwrap();
        let second = cache
            .get_or_build("parkinson_disease", || panic!("should not rebuild"))
            .unwrap();
        assert!(std::ptr::eq(&*first, &*second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_build_may_touch_cache_and_first_insert_wins() {
        let cache = GraphCache::new();
        let winner = graph().unwrap();
        let got = cache
            .get_or_build("ALS", || {
                assert!(cache.get("als").is_none());
                cache.insert("als", winner.clone());
                graph()
            })
            .unwrap();
        assert!(std::ptr::eq(&*got, &*winner));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_build_caches_nothing() {
        let cache = GraphCache::new();
        let err = cache.get_or_build("ALS", || Err(ReasonError::UnknownEntity("SOD1".into())));
        assert!(err.is_err());
        assert!(cache.is_empty());
        cache.insert("ALS", graph().unwrap());
        cache.clear();
        assert!(cache.get("als").is_none());
    }
}
