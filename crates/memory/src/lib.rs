//! Weighted memory store and sampling engine for Keepsake.
//!
//! This crate owns the two pieces of Keepsake with real algorithmic content:
//!
//! - **Sampling**: weighted random selection without replacement (A-ES),
//!   followed by best-effort weight suppression of what was served
//! - **Weight updates**: relevance-driven reinforcement across the whole
//!   collection, and a reset back to the neutral weight
//!
//! # Architecture
//!
//! ```text
//!   sample(k)                          update(query)
//!      │                                    │
//!      ▼                                    ▼
//! ┌─────────────────┐              ┌─────────────────┐
//! │ SamplingService │              │  WeightEngine   │──► RelevanceOracle
//! │  (A-ES + decay) │              │ (score + write) │──► DescriptionFuser
//! └────────┬────────┘              └────────┬────────┘
//!          │        list / update_field     │
//!          └──────────────┬─────────────────┘
//!                         ▼
//!                 ┌───────────────┐
//!                 │   ItemStore   │
//!                 └───────────────┘
//! ```

pub mod sampler;
pub mod service;
pub mod store;
pub mod types;
pub mod weights;

pub use sampler::{Selected, sample, sample_indices};
pub use service::SamplingService;
pub use store::{FieldUpdate, InMemoryItemStore, ItemStore};
pub use types::{
    DecayMode, DecayPolicy, Draw, SamplingConfig, ScoredItem, UpdateSummary, WeightConfig,
};
pub use weights::WeightEngine;
