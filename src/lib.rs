//! # Brainy
//!
//! Embedded hybrid vector+graph database core.
//!
//! Brainy stores **nouns** (vector-bearing entities with a metadata
//! document) connected by **verbs** (typed directed edges), and answers
//! queries that fuse vector similarity, metadata filtering, and one-hop
//! graph adjacency into a single ranked, paginated result set.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brainy_db::{BrainyDb, Config};
//! use brainy_db::noun::{NewNoun, NounType};
//! use brainy_db::query::{QueryOptions, QueryTarget};
//!
//! let db = BrainyDb::open("./brainy.db", Config::default())?;
//!
//! let id = db.add_noun(NewNoun {
//!     noun_type: NounType::Concept,
//!     vector: Some(query_embedding.clone()),
//!     ..Default::default()
//! })?;
//!
//! let page = db.search(
//!     QueryTarget::Vector(query_embedding),
//!     QueryOptions::from_config(&db.config().query),
//! )?;
//!
//! db.shut_down()?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Noun
//!
//! A **noun** is the primary entity of the graph: a typed, vector-bearing
//! record with an attached metadata document. Nouns are soft-deleted and
//! restorable; physical removal is the cleanup coordinator's job.
//!
//! ### Verb
//!
//! A **verb** is a typed directed edge between two nouns, forming the
//! knowledge graph that `connected` query clauses and traversal helpers
//! walk.
//!
//! ### Embedding Providers
//!
//! Brainy supports two modes for embeddings:
//!
//! - **External** (default): you provide pre-computed embeddings from your
//!   own model or service.
//! - **Builtin**: Brainy generates embeddings using a bundled ONNX model
//!   (requires the `builtin-embeddings` feature).
//!
//! ## Features
//!
//! - `builtin-embeddings` - Enable built-in ONNX embedding generation.
//! - `sync` - Enable the background cleanup/cache-maintenance task spawner.
//!
//! ## Thread Safety
//!
//! [`BrainyDb`] is `Send + Sync` and can be shared across threads using
//! `Arc`. Mutations are serialized behind an internal writer guard; reads
//! proceed concurrently with each other.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod bridge;
mod cache;
mod cleanup;
mod config;
mod db;
mod error;
mod graph;
mod hooks;
mod types;
mod wal;

pub mod embedding;
pub mod metadata;
pub mod noun;
pub mod query;
pub mod storage;
pub mod vector;
pub mod verb;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main database interface
pub use db::{BrainyDb, Statistics, StatisticsOptions};

// Extension points
pub use hooks::BrainyHook;

// Configuration
pub use config::{
    CacheConfig, CleanupConfig, Config, EmbeddingDimension, EmbeddingProvider, HnswConfig,
    QueryConfig, SyncMode, WalConfig,
};

// Error handling
pub use error::{BrainyError, NotFoundError, Result, StorageError, ValidationError};

// Core types
pub use types::{Embedding, EntityId, NounId, Timestamp, VerbId};

// Domain types
pub use noun::{NewNoun, Noun, NounType, NounUpdate};
pub use verb::{NewVerb, Verb, VerbDirection, VerbType, DEFAULT_VERB_WEIGHT};

// Querying
pub use query::{ConnectedSpec, Query, QueryHit, QueryOptions, QueryPage, QueryTarget};

// Metadata
pub use metadata::{FilterNode, Metadata};

// Storage (for advanced users)
pub use storage::DatabaseMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common Brainy usage.
///
/// ```rust
/// use brainy_db::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, EmbeddingDimension, SyncMode};
    pub use crate::db::BrainyDb;
    pub use crate::error::{BrainyError, Result};
    pub use crate::noun::{NewNoun, Noun, NounType};
    pub use crate::query::{Query, QueryOptions, QueryTarget};
    pub use crate::types::{EntityId, NounId, Timestamp, VerbId};
    pub use crate::verb::{NewVerb, Verb, VerbType};
}
