//! Core type definitions for Brainy identifiers and timestamps.
//!
//! This module defines the fundamental ID types used throughout the crate.
//! All ID types use UUID v7 for time-ordered unique identification.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Noun identifier (UUID v7 for time-ordering).
///
/// Nouns are the primary entities of the graph: people, documents, concepts,
/// and everything else drawn from [`crate::noun::NounType`].
///
/// # Example
/// ```
/// use brainy_db::NounId;
///
/// let id = NounId::new();
/// println!("Created noun: {}", id);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NounId(pub Uuid);

impl NounId {
    /// Creates a new NounId with a UUID v7 (time-ordered).
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a nil (all zeros) NounId.
    /// Useful for testing or sentinel values.
    #[inline]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns the raw UUID bytes for storage.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Creates a NounId from raw bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for NounId {
    /// Returns a nil (all zeros) NounId.
    ///
    /// For a new unique ID, use [`NounId::new()`].
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for NounId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verb identifier (UUID v7 for time-ordering).
///
/// Verbs are directed, typed edges between two nouns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbId(pub Uuid);

impl VerbId {
    /// Creates a new VerbId with a UUID v7 (time-ordered).
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a nil (all zeros) VerbId.
    #[inline]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns the raw UUID bytes for storage.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Creates a VerbId from raw bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for VerbId {
    /// Returns a nil (all zeros) VerbId.
    ///
    /// For a new unique ID, use [`VerbId::new()`].
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for VerbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An id that can stand for either a noun or a verb, used by the change log
/// and by the shared HNSW graph's id bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// Refers to a [`NounId`].
    Noun(NounId),
    /// Refers to a [`VerbId`].
    Verb(VerbId),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noun(id) => write!(f, "noun:{id}"),
            Self::Verb(id) => write!(f, "verb:{id}"),
        }
    }
}

/// Unix timestamp in milliseconds.
///
/// Using i64 allows representing dates far into the future and past.
/// Millisecond precision is sufficient for database bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch (should never happen
    /// in practice), returns a timestamp of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns big-endian bytes for storage (enables lexicographic ordering).
    #[inline]
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Returns a timestamp `millis` before this one, saturating at `i64::MIN`.
    #[inline]
    pub fn saturating_sub_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedding vector type alias.
///
/// Embeddings are f32 vectors of fixed dimension (typically 384 or 768).
pub type Embedding = Vec<f32>;
