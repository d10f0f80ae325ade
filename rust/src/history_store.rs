use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StorageBackend;

pub const HISTORY_STORAGE_KEY: &str = "vision_prompt_history_v1";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub image_name: String,
    /// Data URL of the source image.
    pub image_data: String,
    pub prompt: String,
}

impl HistoryItem {
    pub fn new(image_name: &str, image_data: &str, prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            image_name: image_name.to_string(),
            image_data: image_data.to_string(),
            prompt: prompt.to_string(),
        }
    }
}

/// Newest-first list of past generations, capped at `capacity` and written
/// back whole after every change.
pub struct HistoryStore {
    backend: Box<dyn StorageBackend>,
    capacity: usize,
    items: Vec<HistoryItem>,
}

impl HistoryStore {
    /// Reads the persisted record. A missing, unreadable or unparsable record
    /// yields an empty history; this never fails.
    pub fn load(backend: Box<dyn StorageBackend>, capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            capacity
        };
        let mut store = Self {
            backend,
            capacity,
            items: Vec::new(),
        };

        let raw = match store.backend.read(HISTORY_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return store,
            Err(err) => {
                log::warn!("failed to read history, starting empty: {err:#}");
                return store;
            }
        };

        match serde_json::from_str::<Vec<HistoryItem>>(&raw) {
            Ok(mut items) => {
                items.truncate(capacity);
                log::info!("loaded {} history entries", items.len());
                store.items = items;
            }
            Err(err) => {
                log::warn!("failed to parse history, starting empty: {err}");
                if let Err(err) = store.backend.quarantine(HISTORY_STORAGE_KEY) {
                    log::warn!("{err:#}");
                }
            }
        }

        store
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn append(&mut self, item: HistoryItem) -> Result<()> {
        self.items.insert(0, item);
        self.items.truncate(self.capacity);
        self.persist()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.persist()
    }

    pub fn persist(&mut self) -> Result<()> {
        let payload =
            serde_json::to_string(&self.items).context("failed to serialize history json")?;
        self.backend
            .write(HISTORY_STORAGE_KEY, &payload)
            .context("failed to save history")
    }
}
