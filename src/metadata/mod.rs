//! Metadata documents, secondary indexes, and the Brainy Field Operator
//! filter compiler (§3, §4.2).

pub mod filter;
pub mod index;
mod value;

pub use filter::{CompiledFilter, FilterNode, NumericCmp, MAX_FILTER_DEPTH};
pub use index::{flatten_leaves, index_target, IndexTarget, DOT_PATH_DEPTH_LIMIT};
pub use value::{Lifecycle, Metadata, AUGMENTATIONS_NS, BRAINY_NS};
