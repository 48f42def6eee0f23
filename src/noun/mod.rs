//! Noun management: the primary entities of the graph.
//!
//! A **noun** is a vector-bearing entity tagged with a [`NounType`] and a
//! metadata document. Nouns are created with `add_noun`, mutated with
//! `update_noun` (vector replaced if supplied, properties merged), and
//! logically removed by soft-delete; physical removal is the cleanup
//! coordinator's job (§4.8).
//!
//! # Operations
//!
//! All noun operations are available on [`BrainyDb`](crate::BrainyDb):
//!
//! - [`add_noun(new_noun)`](crate::BrainyDb::add_noun)
//! - [`get_noun(id)`](crate::BrainyDb::get_noun)
//! - [`update_noun(id, update)`](crate::BrainyDb::update_noun)
//! - [`delete_noun(id)`](crate::BrainyDb::delete_noun)
//! - [`restore_noun(id)`](crate::BrainyDb::restore_noun)

pub mod types;

pub(crate) use types::validate_new_noun;
pub use types::{NewNoun, Noun, NounType, NounUpdate};
