//! Memory item model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::weight::DEFAULT_WEIGHT;

/// A stored memory: a media reference, the caregiver's caption, and the
/// sampling weight that the engine adjusts over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique ID
    pub id: String,

    /// Stored file name (`{uuid}_{original}`)
    pub filename: String,

    /// Where the media content lives
    pub url: String,

    /// Caption written by the caregiver
    #[serde(default)]
    pub caption: String,

    /// Cached fusion of caption and visual analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_description: Option<String>,

    /// Sampling weight
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

impl MemoryItem {
    /// Register a newly uploaded item. The stored file name is prefixed with
    /// the generated id so two uploads of `photo.jpg` never collide.
    pub fn new(original_filename: &str, url: impl Into<String>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let filename = format!("{}_{}", id, original_filename);

        Self {
            id,
            filename,
            url: url.into(),
            caption: String::new(),
            combined_description: None,
            weight: DEFAULT_WEIGHT,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_combined_description(mut self, description: impl Into<String>) -> Self {
        self.combined_description = Some(description.into());
        self
    }

    /// The cached combined description, if it is non-empty.
    pub fn cached_description(&self) -> Option<&str> {
        self.combined_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Whether the cached combined description can be trusted.
    ///
    /// A fused description must differ from the caption and carry at least ten
    /// characters beyond it; anything shorter is a stale or failed fusion.
    pub fn has_fresh_description(&self) -> bool {
        let caption = self.caption.trim();
        match self.cached_description() {
            Some(desc) => {
                desc != caption && desc.chars().count() > caption.chars().count() + 10
            }
            None => false,
        }
    }

    pub fn view(&self) -> ItemView {
        ItemView::from(self)
    }
}

/// The public shape of an item as served to the caregiving apps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub caption: String,
    pub weight: f64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&MemoryItem> for ItemView {
    fn from(item: &MemoryItem) -> Self {
        Self {
            id: item.id.clone(),
            filename: item.filename.clone(),
            url: item.url.clone(),
            caption: item.caption.clone(),
            weight: item.weight,
            uploaded_at: item.uploaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_creation() {
        let item = MemoryItem::new("beach.jpg", "https://cdn.example/beach.jpg");

        assert!(item.filename.ends_with("_beach.jpg"));
        assert!(item.filename.starts_with(&item.id));
        assert_eq!(item.weight, 1.0);
        assert!(item.caption.is_empty());
        assert!(item.combined_description.is_none());
    }

    #[test]
    fn test_item_unique_ids() {
        let a = MemoryItem::new("a.jpg", "u");
        let b = MemoryItem::new("a.jpg", "u");
        assert_ne!(a.id, b.id);
        assert_ne!(a.filename, b.filename);
    }

    #[test]
    fn test_fresh_description_must_be_longer_than_caption() {
        let item = MemoryItem::new("a.jpg", "u")
            .with_caption("Grandma's garden")
            .with_combined_description("Grandma's garden, sunny");
        // 23 chars vs 16 + 10
        assert!(!item.has_fresh_description());

        let item = item.with_combined_description(
            "Grandma's garden in June, full of roses and tomato vines",
        );
        assert!(item.has_fresh_description());
    }

    #[test]
    fn test_description_equal_to_caption_is_stale() {
        let caption = "A very long caption describing the whole family at dinner";
        let item = MemoryItem::new("a.jpg", "u")
            .with_caption(caption)
            .with_combined_description(caption);
        assert!(!item.has_fresh_description());
    }

    #[test]
    fn test_blank_description_is_not_cached() {
        let item = MemoryItem::new("a.jpg", "u").with_combined_description("   ");
        assert!(item.cached_description().is_none());
        assert!(!item.has_fresh_description());
    }

    #[test]
    fn test_missing_weight_defaults_on_deserialize() {
        let json = r#"{
            "id": "abc",
            "filename": "abc_dog.jpg",
            "url": "https://cdn.example/dog.jpg",
            "uploaded_at": "2025-03-01T12:00:00Z"
        }"#;
        let item: MemoryItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.weight, 1.0);
        assert_eq!(item.caption, "");
    }

    #[test]
    fn test_view_omits_description() {
        let item = MemoryItem::new("a.jpg", "u")
            .with_caption("Dog")
            .with_combined_description("A golden retriever on the porch");
        let json = serde_json::to_value(item.view()).unwrap();
        assert_eq!(json["caption"], "Dog");
        assert!(json.get("combined_description").is_none());
        assert_eq!(json["weight"], 1.0);
    }
}
