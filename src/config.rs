//! Configuration types for the Brainy database core.
//!
//! The [`Config`] struct controls database behavior including:
//! - Embedding provider (builtin ONNX or external)
//! - Embedding dimension (384, 768, or custom)
//! - HNSW index tuning, unified cache sizing, cleanup cadence, and WAL mode
//!
//! # Example
//! ```rust
//! use brainy_db::{Config, EmbeddingProvider, EmbeddingDimension, SyncMode};
//!
//! // Use defaults (External provider, 384 dimensions)
//! let config = Config::default();
//!
//! // Customize for production
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     cache_size_mb: 128,
//!     sync_mode: SyncMode::Normal,
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Database configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use brainy_db::Config;
///
/// let config = Config {
///     cache_size_mb: 256,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// How embeddings are generated or provided.
    pub embedding_provider: EmbeddingProvider,

    /// Embedding vector dimension (must match provider output).
    pub embedding_dimension: EmbeddingDimension,

    /// Cache size in megabytes for the unified cache (§4.5).
    ///
    /// Higher values improve read performance but use more memory.
    /// Default: 64 MB
    pub cache_size_mb: usize,

    /// Durability mode for storage write operations.
    pub sync_mode: SyncMode,

    /// HNSW vector index parameters.
    ///
    /// Controls the quality and performance of semantic search.
    /// See [`HnswConfig`] for tuning guidelines.
    pub hnsw: HnswConfig,

    /// Unified cache tuning (eviction, fairness monitor).
    pub cache: CacheConfig,

    /// Cleanup coordinator cadence and batching.
    pub cleanup: CleanupConfig,

    /// Write-ahead log behavior.
    pub wal: WalConfig,

    /// Query engine fusion and pagination defaults.
    pub query: QueryConfig,

    /// When `true`, the database runs without a write-ahead log and without
    /// the cleanup/fairness background tasks — intended for tests and
    /// throwaway instances. Mirrors §4.6's "disabled in test/ephemeral
    /// mode" clause.
    pub ephemeral: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // External is the safe default - no ONNX dependency required
            embedding_provider: EmbeddingProvider::External,
            // 384 matches all-MiniLM-L6-v2, the default builtin model
            embedding_dimension: EmbeddingDimension::D384,
            cache_size_mb: 64,
            sync_mode: SyncMode::Normal,
            hnsw: HnswConfig::default(),
            cache: CacheConfig::default(),
            cleanup: CleanupConfig::default(),
            wal: WalConfig::default(),
            query: QueryConfig::default(),
            ephemeral: false,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for builtin embedding generation.
    ///
    /// This requires the `builtin-embeddings` feature to be enabled.
    ///
    /// # Example
    /// ```rust
    /// use brainy_db::Config;
    ///
    /// let config = Config::with_builtin_embeddings();
    /// ```
    pub fn with_builtin_embeddings() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Builtin { model_path: None },
            ..Default::default()
        }
    }

    /// Creates a Config for external embedding provider.
    ///
    /// When using external embeddings, you must provide pre-computed
    /// embedding vectors when adding nouns and verbs.
    ///
    /// # Example
    /// ```rust
    /// use brainy_db::{Config, EmbeddingDimension};
    ///
    /// // OpenAI ada-002 uses 1536 dimensions
    /// let config = Config::with_external_embeddings(EmbeddingDimension::Custom(1536));
    /// ```
    pub fn with_external_embeddings(dimension: EmbeddingDimension) -> Self {
        Self {
            embedding_provider: EmbeddingProvider::External,
            embedding_dimension: dimension,
            ..Default::default()
        }
    }

    /// Creates a Config suitable for tests: ephemeral (no WAL, no
    /// background tasks), small cache.
    pub fn ephemeral() -> Self {
        Self {
            ephemeral: true,
            cache_size_mb: 8,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `BrainyDb::open()`. You can also call this
    /// explicitly to check configuration before attempting to open.
    ///
    /// # Errors
    /// Returns `ValidationError` if any field is out of its documented
    /// range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cache_size_mb == 0 {
            return Err(ValidationError::invalid_field(
                "cache_size_mb",
                "must be greater than 0",
            ));
        }

        self.hnsw.validate()?;
        self.cache.validate()?;
        self.cleanup.validate()?;
        self.query.validate()?;

        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > 4096 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must not exceed 4096",
                ));
            }
        }

        Ok(())
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }
}

/// Embedding provider configuration.
///
/// Determines how embedding vectors are generated for nouns and verbs.
#[derive(Clone, Debug)]
pub enum EmbeddingProvider {
    /// The database generates embeddings using a built-in ONNX model.
    ///
    /// Requires the `builtin-embeddings` feature. The default model is
    /// all-MiniLM-L6-v2 (384 dimensions).
    Builtin {
        /// Custom ONNX model path. If `None`, uses the bundled model.
        model_path: Option<PathBuf>,
    },

    /// Caller provides pre-computed embedding vectors.
    ///
    /// Use this when you have your own embedding service (OpenAI, Cohere,
    /// etc.) or want to use a model not bundled with this crate.
    External,
}

impl EmbeddingProvider {
    /// Returns true if this is the builtin provider.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }

    /// Returns true if this is the external provider.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

/// Embedding vector dimensions.
///
/// Standard dimensions are provided for common models. Use `Custom` for
/// other embedding services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (all-MiniLM-L6-v2, default builtin model).
    #[default]
    D384,

    /// 768 dimensions (bge-base-en-v1.5, BERT-base).
    D768,

    /// Custom dimension for other embedding models.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use brainy_db::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::D768.size(), 768);
    /// assert_eq!(EmbeddingDimension::Custom(1536).size(), 1536);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::Custom(n) => *n,
        }
    }
}

/// Durability mode for storage write operations.
///
/// Controls the trade-off between write performance and crash safety.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    ///
    /// This is the default and recommended setting. Provides good
    /// performance while ensuring committed data survives crashes.
    #[default]
    Normal,

    /// Async sync (faster writes, may lose recent data on crash).
    ///
    /// Use for development or when you can tolerate losing the last few
    /// seconds of writes. Significantly faster than `Normal`.
    Fast,

    /// Sync every write operation (slowest, maximum durability).
    ///
    /// Use when data loss is absolutely unacceptable. Very slow for
    /// high write volumes.
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode syncs on every write.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode is async (may lose data on crash).
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }
}

/// Configuration for the hand-rolled HNSW vector index (§4.1).
///
/// Controls the trade-off between index build time, memory usage,
/// and search accuracy. The defaults match the spec's documented values.
///
/// # Tuning Guide
///
/// | Use Case     | m  | ef_construction | ef_search |
/// |--------------|----|-----------------|-----------|
/// | Low memory   |  8 |             100 |        60 |
/// | Balanced     | 16 |             200 |       200 |
/// | High recall  | 32 |             400 |       400 |
#[derive(Clone, Debug)]
pub struct HnswConfig {
    /// Maximum bidirectional connections per node at layers ≥ 1 (`M`).
    ///
    /// Higher values improve recall but increase memory and build time.
    /// Default: 16
    pub m: usize,

    /// Maximum connections per node at layer 0 (`M_max0`).
    ///
    /// Layer 0 contains every node, so it is given roughly double the
    /// budget of the upper layers. Default: 32
    pub m_max0: usize,

    /// Number of candidates tracked during index construction.
    ///
    /// Higher values produce a better quality graph but slow down
    /// insertion. Rule of thumb: `ef_construction >= 2 * m`.
    /// Default: 200
    pub ef_construction: usize,

    /// Number of candidates tracked during search (`ef_search`).
    ///
    /// Higher values improve recall but increase search latency. The
    /// effective beam width used by a search is `max(k, ef_search)`.
    /// Default: 200
    pub ef_search: usize,

    /// Seed for the PRNG used to assign insertion layers.
    ///
    /// Fixing the seed makes the graph shape fully reproducible for a
    /// given insertion order (§4.1 "Determinism"). Default: 0x5EED_5EED
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: 32,
            ef_construction: 200,
            ef_search: 200,
            seed: 0x5EED_5EED,
        }
    }
}

impl HnswConfig {
    /// Level-generation multiplier `mL = 1 / ln(m)`.
    pub fn ml(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.m == 0 {
            return Err(ValidationError::invalid_field("hnsw.m", "must be greater than 0"));
        }
        if self.m_max0 == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.m_max0",
                "must be greater than 0",
            ));
        }
        if self.ef_construction == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_construction",
                "must be greater than 0",
            ));
        }
        if self.ef_search == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_search",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Configuration for the unified cache (§4.5).
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Maximum total size in bytes across all entry types.
    /// Default: 64 MiB
    pub max_size_bytes: u64,

    /// Whether eviction picks the minimum set of victims that frees enough
    /// bytes (`true`), or evicts one lowest-value entry at a time until
    /// there is room (`false`). Default: `true`
    pub size_aware_eviction: bool,

    /// How often the fairness monitor runs, in seconds. Default: 60
    pub fairness_interval_secs: u64,

    /// Byte-share threshold that marks a type as dominating the cache.
    /// Default: 0.9
    pub fairness_byte_share_threshold: f64,

    /// Access-share threshold below which a dominating type is considered
    /// unfairly starving other types. Default: 0.1
    pub fairness_access_share_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 64 * 1024 * 1024,
            size_aware_eviction: true,
            fairness_interval_secs: 60,
            fairness_byte_share_threshold: 0.9,
            fairness_access_share_threshold: 0.1,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size_bytes == 0 {
            return Err(ValidationError::invalid_field(
                "cache.max_size_bytes",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.fairness_byte_share_threshold) {
            return Err(ValidationError::invalid_field(
                "cache.fairness_byte_share_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.fairness_access_share_threshold) {
            return Err(ValidationError::invalid_field(
                "cache.fairness_access_share_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

/// Configuration for the cleanup coordinator (§4.8).
#[derive(Clone, Debug)]
pub struct CleanupConfig {
    /// Whether the background cleanup task runs at all. Disabled
    /// automatically when the database is read-only or frozen regardless
    /// of this setting. Default: `true`
    pub enabled: bool,

    /// How often a cleanup pass runs, in seconds. Default: 900 (15 min)
    pub interval_secs: u64,

    /// Maximum number of soft-deleted items hard-removed per pass.
    /// Default: 100
    pub batch_size: usize,

    /// Minimum age (seconds since `_brainy.updated`) before a soft-deleted
    /// item is eligible for hard removal. Default: 3600 (1 hour)
    pub max_age_secs: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 900,
            batch_size: 100,
            max_age_secs: 3600,
        }
    }
}

impl CleanupConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::invalid_field(
                "cleanup.batch_size",
                "must be greater than 0",
            ));
        }
        if self.max_age_secs < 0 {
            return Err(ValidationError::invalid_field(
                "cleanup.max_age_secs",
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Configuration for the write-ahead log (§4.6).
#[derive(Clone, Debug)]
pub struct WalConfig {
    /// Whether the WAL is active. Forced off when `Config::ephemeral` is
    /// `true`. Default: `true`
    pub enabled: bool,

    /// Number of applied records accumulated before a checkpoint
    /// (truncation) is attempted. Default: 256
    pub checkpoint_batch: usize,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            checkpoint_batch: 256,
        }
    }
}

/// Configuration for the query engine's fusion scoring and pagination
/// defaults (§4.4).
#[derive(Clone, Debug)]
pub struct QueryConfig {
    /// Metadata cardinality above which the engine treats `where` as
    /// non-selective and scans the universe instead of probing the index
    /// first. Default: 10,000
    pub selective_threshold: usize,

    /// Default weight applied to vector similarity in fusion scoring
    /// (`w_v`). Default: 1.0
    pub vector_weight: f32,

    /// Default weight applied to metadata boost in fusion scoring
    /// (`w_m`). Default: 0.0
    pub metadata_weight: f32,

    /// Default result page size when the caller does not specify `limit`.
    /// Default: 10
    pub default_limit: usize,

    /// Hard ceiling on `limit`, per §6 query options (`limit ∈ [1,
    /// 10000]`). Default: 10,000
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            selective_threshold: 10_000,
            vector_weight: 1.0,
            metadata_weight: 0.0,
            default_limit: 10,
            max_limit: 10_000,
        }
    }
}

impl QueryConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_limit == 0 {
            return Err(ValidationError::invalid_field(
                "query.max_limit",
                "must be greater than 0",
            ));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ValidationError::invalid_field(
                "query.default_limit",
                "must be between 1 and max_limit",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.embedding_provider.is_external());
        assert_eq!(config.embedding_dimension, EmbeddingDimension::D384);
        assert_eq!(config.cache_size_mb, 64);
        assert_eq!(config.sync_mode, SyncMode::Normal);
        assert!(!config.ephemeral);
    }

    #[test]
    fn test_with_builtin_embeddings() {
        let config = Config::with_builtin_embeddings();
        assert!(config.embedding_provider.is_builtin());
    }

    #[test]
    fn test_with_external_embeddings() {
        let config = Config::with_external_embeddings(EmbeddingDimension::Custom(1536));
        assert!(config.embedding_provider.is_external());
        assert_eq!(config.dimension(), 1536);
    }

    #[test]
    fn test_ephemeral_config() {
        let config = Config::ephemeral();
        assert!(config.ephemeral);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_success() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_cache_size_zero() {
        let config = Config {
            cache_size_mb: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidField { field, .. } if field == "cache_size_mb")
        );
    }

    #[test]
    fn test_validate_custom_dimension_zero() {
        let config = Config {
            embedding_dimension: EmbeddingDimension::Custom(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_custom_dimension_too_large() {
        let config = Config {
            embedding_dimension: EmbeddingDimension::Custom(5000),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_custom_dimension_valid() {
        let config = Config {
            embedding_dimension: EmbeddingDimension::Custom(1536),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_dimension_sizes() {
        assert_eq!(EmbeddingDimension::D384.size(), 384);
        assert_eq!(EmbeddingDimension::D768.size(), 768);
        assert_eq!(EmbeddingDimension::Custom(512).size(), 512);
    }

    #[test]
    fn test_sync_mode_checks() {
        assert!(!SyncMode::Normal.is_fast());
        assert!(!SyncMode::Normal.is_paranoid());
        assert!(SyncMode::Fast.is_fast());
        assert!(SyncMode::Paranoid.is_paranoid());
    }

    #[test]
    fn test_hnsw_config_defaults() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.m_max0, 32);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 200);
    }

    #[test]
    fn test_hnsw_ml() {
        let config = HnswConfig::default();
        assert!((config.ml() - 1.0 / (16f64).ln()).abs() < 1e-9);
    }

    #[test]
    fn test_config_includes_hnsw() {
        let config = Config::default();
        assert_eq!(config.hnsw.m, 16);
    }

    #[test]
    fn test_validate_hnsw_zero_m() {
        let config = Config {
            hnsw: HnswConfig {
                m: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "hnsw.m"
        ));
    }

    #[test]
    fn test_validate_hnsw_zero_ef_construction() {
        let config = Config {
            hnsw: HnswConfig {
                ef_construction: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_hnsw_zero_ef_search() {
        let config = Config {
            hnsw: HnswConfig {
                ef_search: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_cache_zero_size() {
        let config = Config {
            cache: CacheConfig {
                max_size_bytes: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_cleanup_zero_batch() {
        let config = Config {
            cleanup: CleanupConfig {
                batch_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_query_limit_bounds() {
        let config = Config {
            query: QueryConfig {
                default_limit: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_embedding_dimension_serialization() {
        let dim = EmbeddingDimension::D768;
        let bytes = bincode::serialize(&dim).unwrap();
        let restored: EmbeddingDimension = bincode::deserialize(&bytes).unwrap();
        assert_eq!(dim, restored);
    }
}
