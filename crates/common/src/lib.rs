//! Common types and traits shared across Keepsake crates.
//!
//! This crate holds the memory item model, the weight invariants used by the
//! sampler and the update engine, the error taxonomy, and the capability
//! traits for the external collaborators (relevance scoring and description
//! fusion) so that the engine and the LLM adapters can meet without a
//! circular dependency.

pub mod error;
pub mod item;
pub mod traits;
pub mod weight;

pub use error::{KeepsakeError, Result};
pub use item::{ItemView, MemoryItem};
pub use traits::{DescriptionFuser, Relevance, RelevanceOracle};
pub use weight::{DEFAULT_WEIGHT, WEIGHT_FLOOR, clamp_score, effective_weight};
