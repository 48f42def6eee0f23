//! Data types for nouns, the primary entities of the graph (§3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::metadata::Metadata;
use crate::types::{Embedding, NounId};

/// The closed set of entity kinds a noun may be tagged with.
///
/// `Other(String)` accepts any caller-supplied tag outside this set rather
/// than rejecting it — unlike [`crate::verb::VerbType`], noun typing is
/// advisory (used for filtering and display) rather than a closed
/// contract the graph enforces.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NounType {
    Person,
    Organization,
    Document,
    Event,
    Concept,
    Thing,
    Place,
    Skill,
    Tool,
    Project,
    Idea,
    Group,
    Process,
    Rule,
    Goal,
    Problem,
    Solution,
    Question,
    Answer,
    Resource,
    Topic,
    Tag,
    Role,
    Product,
    Service,
    System,
    Metric,
    Risk,
    Decision,
    Asset,
    /// A caller-defined tag not in the closed set above.
    Other(String),
}

impl NounType {
    /// Returns the canonical string form, for storage keys and display.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "Person",
            Self::Organization => "Organization",
            Self::Document => "Document",
            Self::Event => "Event",
            Self::Concept => "Concept",
            Self::Thing => "Thing",
            Self::Place => "Place",
            Self::Skill => "Skill",
            Self::Tool => "Tool",
            Self::Project => "Project",
            Self::Idea => "Idea",
            Self::Group => "Group",
            Self::Process => "Process",
            Self::Rule => "Rule",
            Self::Goal => "Goal",
            Self::Problem => "Problem",
            Self::Solution => "Solution",
            Self::Question => "Question",
            Self::Answer => "Answer",
            Self::Resource => "Resource",
            Self::Topic => "Topic",
            Self::Tag => "Tag",
            Self::Role => "Role",
            Self::Product => "Product",
            Self::Service => "Service",
            Self::System => "System",
            Self::Metric => "Metric",
            Self::Risk => "Risk",
            Self::Decision => "Decision",
            Self::Asset => "Asset",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Parses a string into a `NounType`, falling back to `Other` for
    /// anything not in the closed set.
    pub fn parse(s: &str) -> Self {
        match s {
            "Person" => Self::Person,
            "Organization" => Self::Organization,
            "Document" => Self::Document,
            "Event" => Self::Event,
            "Concept" => Self::Concept,
            "Thing" => Self::Thing,
            "Place" => Self::Place,
            "Skill" => Self::Skill,
            "Tool" => Self::Tool,
            "Project" => Self::Project,
            "Idea" => Self::Idea,
            "Group" => Self::Group,
            "Process" => Self::Process,
            "Rule" => Self::Rule,
            "Goal" => Self::Goal,
            "Problem" => Self::Problem,
            "Solution" => Self::Solution,
            "Question" => Self::Question,
            "Answer" => Self::Answer,
            "Resource" => Self::Resource,
            "Topic" => Self::Topic,
            "Tag" => Self::Tag,
            "Role" => Self::Role,
            "Product" => Self::Product,
            "Service" => Self::Service,
            "System" => Self::System,
            "Metric" => Self::Metric,
            "Risk" => Self::Risk,
            "Decision" => Self::Decision,
            "Asset" => Self::Asset,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A primary entity in the graph: a stable id, an embedding vector, a
/// [`NounType`] tag, and a metadata document carrying both caller
/// properties and the reserved `_brainy` lifecycle namespace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Noun {
    pub id: NounId,
    pub noun_type: NounType,
    /// Stored separately from the record (see [`crate::storage::schema`]'s
    /// shared embeddings table), never serialized inline.
    #[serde(skip)]
    pub embedding: Embedding,
    pub metadata: Metadata,
}

impl Noun {
    /// Returns true if this noun is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.metadata.lifecycle().deleted
    }
}

/// Input for creating a new noun via `add_noun`.
///
/// Exactly one of `vector` or `content` must be supplied: a direct vector
/// bypasses embedding generation, while `content` is embedded by the
/// facade's configured `EmbeddingService`.
#[derive(Clone, Debug, Default)]
pub struct NewNoun {
    pub noun_type: NounType,
    pub vector: Option<Embedding>,
    pub content: Option<String>,
    pub properties: Map<String, Value>,
}

impl Default for NounType {
    fn default() -> Self {
        Self::Thing
    }
}

/// Partial update for `update_noun`: any field left `None` is unchanged.
/// `properties` is merged into the existing metadata document, not
/// replaced wholesale.
#[derive(Clone, Debug, Default)]
pub struct NounUpdate {
    pub vector: Option<Embedding>,
    pub content: Option<String>,
    pub properties: Option<Map<String, Value>>,
}

/// Validates a [`NewNoun`] before storage. Does not check the embedding
/// dimension against the database's configured dimension — that requires
/// the facade's `Config`, checked by the caller.
pub(crate) fn validate_new_noun(noun: &NewNoun) -> Result<(), ValidationError> {
    if noun.vector.is_none() && noun.content.is_none() {
        return Err(ValidationError::required_field("vector_or_content"));
    }
    if let Some(ref v) = noun.vector {
        if v.is_empty() {
            return Err(ValidationError::invalid_field("vector", "must not be empty"));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(ValidationError::invalid_field("vector", "must contain only finite values"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noun_type_roundtrip_known_variants() {
        let variants = [
            NounType::Person,
            NounType::Organization,
            NounType::Document,
            NounType::Event,
            NounType::Concept,
            NounType::Thing,
            NounType::Place,
            NounType::Skill,
            NounType::Tool,
            NounType::Project,
            NounType::Idea,
            NounType::Group,
            NounType::Process,
            NounType::Rule,
            NounType::Goal,
            NounType::Problem,
            NounType::Solution,
            NounType::Question,
            NounType::Answer,
            NounType::Resource,
            NounType::Topic,
            NounType::Tag,
            NounType::Role,
            NounType::Product,
            NounType::Service,
            NounType::System,
            NounType::Metric,
            NounType::Risk,
            NounType::Decision,
            NounType::Asset,
        ];
        for v in &variants {
            assert_eq!(NounType::parse(v.as_str()), *v);
        }
    }

    #[test]
    fn test_noun_type_unknown_falls_back_to_other() {
        let parsed = NounType::parse("Widget");
        assert_eq!(parsed, NounType::Other("Widget".to_string()));
        assert_eq!(parsed.as_str(), "Widget");
    }

    #[test]
    fn test_noun_type_bincode_roundtrip() {
        let t = NounType::Other("Gadget".to_string());
        let bytes = bincode::serialize(&t).unwrap();
        let restored: NounType = bincode::deserialize(&bytes).unwrap();
        assert_eq!(t, restored);
    }

    #[test]
    fn test_validate_requires_vector_or_content() {
        let new_noun = NewNoun {
            noun_type: NounType::Concept,
            vector: None,
            content: None,
            properties: Map::new(),
        };
        assert!(validate_new_noun(&new_noun).is_err());
    }

    #[test]
    fn test_validate_accepts_vector_only() {
        let new_noun = NewNoun {
            noun_type: NounType::Concept,
            vector: Some(vec![0.1, 0.2]),
            content: None,
            properties: Map::new(),
        };
        assert!(validate_new_noun(&new_noun).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_vector() {
        let new_noun = NewNoun {
            noun_type: NounType::Concept,
            vector: Some(vec![]),
            content: None,
            properties: Map::new(),
        };
        assert!(validate_new_noun(&new_noun).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_vector() {
        let new_noun = NewNoun {
            noun_type: NounType::Concept,
            vector: Some(vec![f32::NAN, 0.2]),
            content: None,
            properties: Map::new(),
        };
        assert!(validate_new_noun(&new_noun).is_err());
    }

    #[test]
    fn test_validate_accepts_content_only() {
        let new_noun = NewNoun {
            noun_type: NounType::Concept,
            vector: None,
            content: Some("hello".to_string()),
            properties: Map::new(),
        };
        assert!(validate_new_noun(&new_noun).is_ok());
    }

    #[test]
    fn test_noun_is_deleted() {
        let metadata = Metadata::new(Map::new(), crate::types::Timestamp::from_millis(0));
        let mut noun = Noun {
            id: NounId::new(),
            noun_type: NounType::Concept,
            embedding: vec![0.1],
            metadata,
        };
        assert!(!noun.is_deleted());
        noun.metadata.mark_deleted(crate::types::Timestamp::from_millis(1));
        assert!(noun.is_deleted());
        let _ = json!({});
    }
}
