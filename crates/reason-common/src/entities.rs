/// Core entity and relation vocabularies for the evidence graph.
/// Serialized forms are the snake_case strings used in evidence bundles.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Gene,
    Protein,
    Metabolite,
    Pathway,
    Compound,
    Target,
    Treatment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Gene       => "gene",
            EntityKind::Protein    => "protein",
            EntityKind::Metabolite => "metabolite",
            EntityKind::Pathway    => "pathway",
            EntityKind::Compound   => "compound",
            EntityKind::Target     => "target",
            EntityKind::Treatment  => "treatment",
        }
    }

    /// Candidate list an entity of this kind is ranked in by default.
    /// Metabolites and pathways are scored but never ranked as candidates.
    pub fn default_candidate_kind(&self) -> Option<CandidateKind> {
        match self {
            EntityKind::Gene | EntityKind::Protein | EntityKind::Target => Some(CandidateKind::Target),
            EntityKind::Compound  => Some(CandidateKind::Drug),
            EntityKind::Treatment => Some(CandidateKind::Treatment),
            EntityKind::Metabolite | EntityKind::Pathway => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Relation kind (interaction edges)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Activates,
    Inhibits,
    Binds,
    ParticipatesIn,
    Catalyzes,
    Expresses,
    Regulates,
    Treats,
    AssociatedWith,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Activates      => "activates",
            RelationKind::Inhibits       => "inhibits",
            RelationKind::Binds          => "binds",
            RelationKind::ParticipatesIn => "participates_in",
            RelationKind::Catalyzes      => "catalyzes",
            RelationKind::Expresses      => "expresses",
            RelationKind::Regulates      => "regulates",
            RelationKind::Treats         => "treats",
            RelationKind::AssociatedWith => "associated_with",
        }
    }

    /// Sign an interaction weight is expected to carry, if the relation implies one.
    pub fn expected_sign(&self) -> Option<f64> {
        match self {
            RelationKind::Activates => Some(1.0),
            RelationKind::Inhibits  => Some(-1.0),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Candidate kind (ranked lists are never mixed across kinds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Target,
    Drug,
    Treatment,
}

impl CandidateKind {
    pub const ALL: [CandidateKind; 3] = [CandidateKind::Target, CandidateKind::Drug, CandidateKind::Treatment];

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Target    => "target",
            CandidateKind::Drug      => "drug",
            CandidateKind::Treatment => "treatment",
        }
    }
}

impl std::fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
