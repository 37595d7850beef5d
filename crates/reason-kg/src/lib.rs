//! reason-kg — Evidence graph construction and network propagation.

pub mod conflict;
pub mod graph;
pub mod impact;
pub mod ingest;
pub mod propagation;

pub use conflict::{ConflictType, EdgeConflict};
pub use graph::{
    Direction, Edge, EdgeInsert, Entity, EvidenceGraph, Interaction, Neighbors, Provenance,
    SeedEvidence, SeededGraph,
};
pub use impact::{pathway_impacts, PathwayImpact};
pub use ingest::{load_records, EvidenceRecord, InteractionRecord, LoadSummary};
pub use propagation::{ImpactPropagator, PropagationResult};
