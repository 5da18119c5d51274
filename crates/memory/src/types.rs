//! Engine configuration and result types.

use keepsake_common::ItemView;
use serde::{Deserialize, Serialize};

/// What happens to a selected item's weight after it is served.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayPolicy {
    /// Overwrite the stored weight so the item is unlikely to be drawn again
    /// until a query or a reset replenishes it.
    Suppress { weight: f64 },
    /// Leave weights untouched.
    Disabled,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        DecayPolicy::Suppress {
            weight: default_decay_weight(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    #[default]
    Suppress,
    Disabled,
}

/// Configuration for the sampling service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Post-selection behaviour
    #[serde(default)]
    pub decay: DecayMode,

    /// Weight written to selected items when `decay = "suppress"`
    #[serde(default = "default_decay_weight")]
    pub decay_weight: f64,
}

fn default_decay_weight() -> f64 {
    0.0
}

impl SamplingConfig {
    pub fn policy(&self) -> DecayPolicy {
        match self.decay {
            DecayMode::Suppress => DecayPolicy::Suppress {
                weight: self.decay_weight,
            },
            DecayMode::Disabled => DecayPolicy::Disabled,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            decay: DecayMode::default(),
            decay_weight: default_decay_weight(),
        }
    }
}

/// Configuration for the weight update engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Items scored in parallel during one update
    #[serde(default = "default_max_concurrent_scoring")]
    pub max_concurrent_scoring: usize,

    /// Upper bound for a single oracle call
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
}

fn default_max_concurrent_scoring() -> usize {
    4
}

fn default_oracle_timeout_ms() -> u64 {
    30_000
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scoring: default_max_concurrent_scoring(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

/// The outcome of one sampling request.
#[derive(Debug, Clone, Serialize)]
pub struct Draw {
    /// Selected items, most strongly keyed first, with their pre-decay weights
    pub items: Vec<ItemView>,

    /// Decay writes that failed; the selection is still valid
    pub decay_failures: usize,
}

/// One scored item from a weight update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub id: String,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_description: Option<String>,
    pub similarity_score: f64,
    pub reasoning: String,
    pub old_weight: f64,
    pub new_weight: f64,
}

/// Summary of a weight update across the whole collection.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub message: String,
    pub query: String,
    pub total_documents: usize,
    pub skipped_no_caption: usize,
    /// Items whose scoring or write failed
    pub failed: usize,
    /// Successfully updated items, in store order
    pub updated_images: Vec<ScoredItem>,
    /// The same items ranked by descending score
    pub all_scores: Vec<ScoredItem>,
}
