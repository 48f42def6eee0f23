//! Verb management: typed directed edges between nouns.
//!
//! A **verb** connects two nouns, forming the knowledge graph that
//! traversal queries (`connected` clauses, `get_verbs_by_source/target`)
//! walk. Verb vectors share the noun embedding space and the same HNSW
//! index (§4.1, §9).
//!
//! # Operations
//!
//! All verb operations are available on [`BrainyDb`](crate::BrainyDb):
//!
//! - [`add_verb(new_verb)`](crate::BrainyDb::add_verb)
//! - [`get_verb(id)`](crate::BrainyDb::get_verb)
//! - [`delete_verb(id)`](crate::BrainyDb::delete_verb)
//! - [`restore_verb(id)`](crate::BrainyDb::restore_verb)
//!
//! # Constraints
//!
//! - Verbs cannot be self-referential (`source_id != target_id`)
//! - `weight` and `confidence`, if given, must be in `[0.0, 1.0]`
//! - `verb_type` must be one of the closed [`VerbType`] variants

pub mod types;

pub(crate) use types::validate_new_verb;
pub use types::{NewVerb, Verb, VerbDirection, VerbType, DEFAULT_VERB_WEIGHT};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NounId;
    use serde_json::Map;

    #[test]
    fn test_reexports_compile() {
        let new_verb = NewVerb {
            source_id: NounId::new(),
            target_id: NounId::new(),
            verb_type: VerbType::RelatedTo,
            weight: None,
            confidence: None,
            vector: None,
            properties: Map::new(),
        };
        assert!(validate_new_verb(&new_verb).is_ok());
    }
}
