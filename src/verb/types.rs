//! Data types for verbs, the typed directed edges of the graph (§3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::metadata::Metadata;
use crate::types::{Embedding, NounId, VerbId};

/// The closed set of relationship kinds a verb may carry.
///
/// Unlike [`crate::noun::NounType`], this enumeration has no `Other`
/// escape hatch: a verb's type is part of the graph's traversal contract
/// (`get_verbs_by_type`, `connected` query clauses), so unrecognized
/// strings are rejected rather than accepted loosely (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerbType {
    RelatedTo,
    Supports,
    Contradicts,
    Elaborates,
    Supersedes,
    Implies,
    Causes,
    Requires,
    PartOf,
    MemberOf,
    Owns,
    Created,
    Uses,
    Follows,
    Precedes,
    LocatedAt,
    WorksOn,
    Mentions,
    DerivedFrom,
    SimilarTo,
}

impl VerbType {
    /// Returns the canonical string form, for storage keys and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatedTo => "RelatedTo",
            Self::Supports => "Supports",
            Self::Contradicts => "Contradicts",
            Self::Elaborates => "Elaborates",
            Self::Supersedes => "Supersedes",
            Self::Implies => "Implies",
            Self::Causes => "Causes",
            Self::Requires => "Requires",
            Self::PartOf => "PartOf",
            Self::MemberOf => "MemberOf",
            Self::Owns => "Owns",
            Self::Created => "Created",
            Self::Uses => "Uses",
            Self::Follows => "Follows",
            Self::Precedes => "Precedes",
            Self::LocatedAt => "LocatedAt",
            Self::WorksOn => "WorksOn",
            Self::Mentions => "Mentions",
            Self::DerivedFrom => "DerivedFrom",
            Self::SimilarTo => "SimilarTo",
        }
    }

    /// Parses a string into a `VerbType`.
    ///
    /// # Errors
    /// Returns [`ValidationError::unknown_verb_type`] if `s` is not one of
    /// the closed set of variants.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Ok(match s {
            "RelatedTo" => Self::RelatedTo,
            "Supports" => Self::Supports,
            "Contradicts" => Self::Contradicts,
            "Elaborates" => Self::Elaborates,
            "Supersedes" => Self::Supersedes,
            "Implies" => Self::Implies,
            "Causes" => Self::Causes,
            "Requires" => Self::Requires,
            "PartOf" => Self::PartOf,
            "MemberOf" => Self::MemberOf,
            "Owns" => Self::Owns,
            "Created" => Self::Created,
            "Uses" => Self::Uses,
            "Follows" => Self::Follows,
            "Precedes" => Self::Precedes,
            "LocatedAt" => Self::LocatedAt,
            "WorksOn" => Self::WorksOn,
            "Mentions" => Self::Mentions,
            "DerivedFrom" => Self::DerivedFrom,
            "SimilarTo" => Self::SimilarTo,
            other => return Err(ValidationError::unknown_verb_type(other)),
        })
    }
}

/// Direction for querying verbs incident to a given noun.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerbDirection {
    /// Verbs where the noun is the source (source → target).
    Outgoing,
    /// Verbs where the noun is the target (source → target).
    Incoming,
    /// Both outgoing and incoming verbs.
    Both,
}

/// A directed, typed edge between two nouns.
///
/// Like a noun, a verb carries its own embedding vector (derived from
/// `"<type> relationship with <serialized metadata>"` unless supplied
/// directly) and its own metadata document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verb {
    pub id: VerbId,
    pub source_id: NounId,
    pub target_id: NounId,
    pub verb_type: VerbType,
    /// Strength of the relationship, `[0.0, 1.0]`, default `0.5`.
    pub weight: f32,
    /// Optional confidence in the relationship, `[0.0, 1.0]`.
    pub confidence: Option<f32>,
    #[serde(skip)]
    pub embedding: Embedding,
    pub metadata: Metadata,
}

impl Verb {
    /// Returns true if this verb is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.metadata.lifecycle().deleted
    }
}

/// Input for creating a new verb via `add_verb`.
#[derive(Clone, Debug)]
pub struct NewVerb {
    pub source_id: NounId,
    pub target_id: NounId,
    pub verb_type: VerbType,
    pub weight: Option<f32>,
    pub confidence: Option<f32>,
    pub vector: Option<Embedding>,
    pub properties: Map<String, Value>,
}

/// Default weight assigned to a verb when the caller doesn't supply one.
pub const DEFAULT_VERB_WEIGHT: f32 = 0.5;

/// Validates a [`NewVerb`] before storage: no self-relations, weight and
/// confidence in range. Does not check that `source_id`/`target_id`
/// resolve to existing nouns — that requires a storage lookup, handled by
/// the facade.
pub(crate) fn validate_new_verb(verb: &NewVerb) -> Result<(), ValidationError> {
    if verb.source_id == verb.target_id {
        return Err(ValidationError::invalid_field(
            "target_id",
            "cannot create a self-relation (source_id == target_id)",
        ));
    }
    if let Some(weight) = verb.weight {
        if !(0.0..=1.0).contains(&weight) {
            return Err(ValidationError::invalid_field(
                "weight",
                format!("must be between 0.0 and 1.0, got {weight}"),
            ));
        }
    }
    if let Some(confidence) = verb.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::invalid_field(
                "confidence",
                format!("must be between 0.0 and 1.0, got {confidence}"),
            ));
        }
    }
    Ok(())
}
