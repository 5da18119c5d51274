//! Item storage.
//!
//! The store is the only shared mutable resource. Updates are per item and
//! committed independently; there is no multi-item transaction and concurrent
//! writers to the same weight are last-write-wins.

use async_trait::async_trait;
use keepsake_common::{KeepsakeError, MemoryItem, Result};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A single-field change applied atomically to one item.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Weight(f64),
    Caption(String),
    CombinedDescription(Option<String>),
}

impl FieldUpdate {
    fn apply(self, item: &mut MemoryItem) {
        match self {
            FieldUpdate::Weight(w) => item.weight = w,
            FieldUpdate::Caption(c) => item.caption = c,
            FieldUpdate::CombinedDescription(d) => item.combined_description = d,
        }
    }

    fn field_name(&self) -> &'static str {
        match self {
            FieldUpdate::Weight(_) => "weight",
            FieldUpdate::Caption(_) => "caption",
            FieldUpdate::CombinedDescription(_) => "combined_description",
        }
    }
}

/// Key-value collection of memory items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// All items, in insertion order.
    async fn list(&self) -> Result<Vec<MemoryItem>>;

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>>;

    async fn insert(&self, item: MemoryItem) -> Result<()>;

    /// Apply one field update to one item. Fails with `NotFound` for an unknown id.
    async fn update_field(&self, id: &str, update: FieldUpdate) -> Result<()>;

    /// Remove an item. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}

/// In-process store with optional JSON snapshot persistence.
pub struct InMemoryItemStore {
    items: RwLock<Vec<MemoryItem>>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a JSON snapshot file. A missing file starts empty.
    pub async fn with_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let items: Vec<MemoryItem> = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
            Ok(_) => Vec::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            items = items.len(),
            "Opened item store snapshot"
        );

        Ok(Self {
            items: RwLock::new(items),
            snapshot_path: Some(path),
        })
    }

    pub fn from_items(items: Vec<MemoryItem>) -> Self {
        Self {
            items: RwLock::new(items),
            snapshot_path: None,
        }
    }

    /// Rewrite the snapshot. Called with the write lock held so snapshots are
    /// never written out of order.
    async fn persist(&self, items: &[MemoryItem]) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(items)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| KeepsakeError::Store(format!("Failed to write snapshot: {e}")))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| KeepsakeError::Store(format!("Failed to replace snapshot: {e}")))?;

        debug!(path = %path.display(), items = items.len(), "Snapshot written");
        Ok(())
    }

    /// Apply `change` so that it only becomes visible once the snapshot
    /// holding it has been written.
    async fn commit<F>(&self, items: &mut Vec<MemoryItem>, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<MemoryItem>) + Send,
    {
        if self.snapshot_path.is_none() {
            change(items);
            return Ok(());
        }

        let mut next = items.clone();
        change(&mut next);
        self.persist(&next).await?;
        *items = next;
        Ok(())
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn list(&self) -> Result<Vec<MemoryItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>> {
        Ok(self.items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn insert(&self, item: MemoryItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.iter().any(|i| i.id == item.id) {
            return Err(KeepsakeError::InvalidInput(format!(
                "Item '{}' already exists",
                item.id
            )));
        }

        debug!(item_id = %item.id, "Inserting item");
        self.commit(&mut items, |all| all.push(item)).await
    }

    async fn update_field(&self, id: &str, update: FieldUpdate) -> Result<()> {
        let mut items = self.items.write().await;
        let index = items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| KeepsakeError::NotFound(format!("Item '{id}'")))?;

        debug!(item_id = %id, field = update.field_name(), "Updating item field");
        self.commit(&mut items, |all| update.apply(&mut all[index]))
            .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut items = self.items.write().await;
        if !items.iter().any(|i| i.id == id) {
            return Ok(false);
        }

        self.commit(&mut items, |all| all.retain(|i| i.id != id))
            .await?;
        debug!(item_id = %id, "Deleted item");
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.items.read().await.len())
    }
}
