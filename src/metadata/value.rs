//! The tagged metadata document attached to every noun and verb.
//!
//! A metadata document is a flat-ish JSON object split into three
//! namespaces (§3, §4.2):
//!
//! - `_brainy` — reserved, database-managed lifecycle fields
//!   (`deleted`, `indexed`, `version`, `created`, `updated`). Callers may
//!   read these but cannot write them directly.
//! - `_augmentations` — reserved for derived/computed fields a future
//!   enrichment pipeline may attach (embeddings summaries, extracted
//!   entities, etc). Currently just reserved namespace, not populated.
//! - everything else — caller-supplied properties, freely filterable
//!   through the Brainy Field Operators (see [`super::filter`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::storage::schema::{MAX_METADATA_KEYS, MAX_METADATA_KEY_LENGTH, MAX_METADATA_SIZE};
use crate::types::Timestamp;

/// Reserved namespace key for lifecycle bookkeeping.
pub const BRAINY_NS: &str = "_brainy";

/// Reserved namespace key for derived/augmented fields.
pub const AUGMENTATIONS_NS: &str = "_augmentations";

/// A metadata document: caller properties plus the reserved `_brainy`
/// lifecycle namespace.
///
/// Wraps a `serde_json::Map` rather than exposing it directly so the
/// reserved namespaces stay under this module's control.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Metadata(Map<String, Value>);

/// Lifecycle fields tracked under `_brainy` (§3).
#[derive(Clone, Debug, PartialEq)]
pub struct Lifecycle {
    pub deleted: bool,
    pub indexed: bool,
    pub version: u64,
    pub created: Timestamp,
    pub updated: Timestamp,
}

impl Metadata {
    /// Creates a fresh metadata document with `_brainy` stamped for a
    /// newly created entity: not deleted, not yet indexed, version 1,
    /// `created == updated == now`.
    pub fn new(properties: Map<String, Value>, now: Timestamp) -> Self {
        let mut doc = Map::new();
        doc.insert(
            BRAINY_NS.to_string(),
            Value::Object(lifecycle_to_json(&Lifecycle {
                deleted: false,
                indexed: false,
                version: 1,
                created: now,
                updated: now,
            })),
        );
        for (k, v) in properties {
            if k != BRAINY_NS && k != AUGMENTATIONS_NS {
                doc.insert(k, v);
            }
        }
        Self(doc)
    }

    /// Returns the caller-visible properties (everything but the
    /// reserved namespaces).
    pub fn properties(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != BRAINY_NS && k.as_str() != AUGMENTATIONS_NS)
    }

    /// Looks up a single property value by field name, resolving dot
    /// notation over nested objects (§3, §4.2): `"address.city"` walks
    /// into `{"address": {"city": ...}}`. Returns `None` for missing
    /// properties, the reserved namespaces, or a path that descends into
    /// a non-object.
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == BRAINY_NS || field == AUGMENTATIONS_NS {
            return None;
        }
        let mut segments = field.split('.');
        let mut value = self.0.get(segments.next()?)?;
        for segment in segments {
            value = value.as_object()?.get(segment)?;
        }
        Some(value)
    }

    /// Returns the parsed `_brainy` lifecycle block.
    ///
    /// # Panics
    /// Panics if `_brainy` is missing or malformed — this should never
    /// happen for a document that went through [`Metadata::new`] or
    /// storage deserialization, since the storage layer always writes it.
    pub fn lifecycle(&self) -> Lifecycle {
        let raw = self
            .0
            .get(BRAINY_NS)
            .and_then(|v| v.as_object())
            .expect("_brainy namespace missing or malformed");
        lifecycle_from_json(raw)
    }

    /// Replaces the `_brainy` lifecycle block (storage-layer use only).
    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.0
            .insert(BRAINY_NS.to_string(), Value::Object(lifecycle_to_json(&lifecycle)));
    }

    /// Merges new caller properties into this document, bumping
    /// `_brainy.version` and `_brainy.updated`. Reserved namespace keys in
    /// `updates` are silently ignored.
    pub fn merge(&mut self, updates: Map<String, Value>, now: Timestamp) {
        for (k, v) in updates {
            if k != BRAINY_NS && k != AUGMENTATIONS_NS {
                self.0.insert(k, v);
            }
        }
        let mut lifecycle = self.lifecycle();
        lifecycle.version += 1;
        lifecycle.updated = now;
        self.set_lifecycle(lifecycle);
    }

    /// Marks this document as soft-deleted.
    pub fn mark_deleted(&mut self, now: Timestamp) {
        let mut lifecycle = self.lifecycle();
        lifecycle.deleted = true;
        lifecycle.updated = now;
        self.set_lifecycle(lifecycle);
    }

    /// Marks this document as restored (un-deleted).
    pub fn mark_restored(&mut self, now: Timestamp) {
        let mut lifecycle = self.lifecycle();
        lifecycle.deleted = false;
        lifecycle.updated = now;
        self.set_lifecycle(lifecycle);
    }

    /// Marks this document as present in the vector/metadata indexes.
    pub fn mark_indexed(&mut self) {
        let mut lifecycle = self.lifecycle();
        lifecycle.indexed = true;
        self.set_lifecycle(lifecycle);
    }

    /// Validates size and shape constraints (§4.2):
    /// - total serialized size ≤ [`MAX_METADATA_SIZE`]
    /// - at most [`MAX_METADATA_KEYS`] caller properties
    /// - each key ≤ [`MAX_METADATA_KEY_LENGTH`] bytes and excludes NUL
    /// - no caller key collides with a reserved namespace
    pub fn validate(&self) -> Result<(), ValidationError> {
        let key_count = self.properties().count();
        if key_count > MAX_METADATA_KEYS {
            return Err(ValidationError::too_many_items(
                "metadata",
                key_count,
                MAX_METADATA_KEYS,
            ));
        }
        for (key, _) in self.properties() {
            if key.len() > MAX_METADATA_KEY_LENGTH {
                return Err(ValidationError::invalid_field(
                    "metadata key",
                    format!("'{key}' exceeds {MAX_METADATA_KEY_LENGTH} bytes"),
                ));
            }
            if key.contains('\0') {
                return Err(ValidationError::invalid_field(
                    "metadata key",
                    format!("'{key}' must not contain NUL bytes"),
                ));
            }
        }
        let size = serde_json::to_vec(&self.0)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX);
        if size > MAX_METADATA_SIZE {
            return Err(ValidationError::content_too_large(size, MAX_METADATA_SIZE));
        }
        Ok(())
    }
}

fn lifecycle_to_json(lifecycle: &Lifecycle) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("deleted".into(), Value::Bool(lifecycle.deleted));
    m.insert("indexed".into(), Value::Bool(lifecycle.indexed));
    m.insert("version".into(), Value::Number(lifecycle.version.into()));
    m.insert(
        "created".into(),
        Value::Number(lifecycle.created.as_millis().into()),
    );
    m.insert(
        "updated".into(),
        Value::Number(lifecycle.updated.as_millis().into()),
    );
    m
}

fn lifecycle_from_json(raw: &Map<String, Value>) -> Lifecycle {
    Lifecycle {
        deleted: raw.get("deleted").and_then(Value::as_bool).unwrap_or(false),
        indexed: raw.get("indexed").and_then(Value::as_bool).unwrap_or(false),
        version: raw.get("version").and_then(Value::as_u64).unwrap_or(1),
        created: Timestamp::from_millis(raw.get("created").and_then(Value::as_i64).unwrap_or(0)),
        updated: Timestamp::from_millis(raw.get("updated").and_then(Value::as_i64).unwrap_or(0)),
    }
}
