//! Unique-id issuing and metadata directory
//!
//! Runtime metadata of an item moves into the directory when the item is
//! bound to a unique id. The directory also owns per-template tags and
//! category paths.

use crate::item::{Metadata, Uid};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Directory service consumed by containers, items and factories
pub trait MetadataDirectory: Send + Sync {
    /// Issue a fresh unique id and store its metadata
    fn assign_uid(&self, metadata: Option<Metadata>) -> Uid;

    /// Metadata bound to a unique id
    fn metadata(&self, uid: Uid) -> Option<Metadata>;

    /// Replace metadata bound to a unique id
    fn set_metadata(&self, uid: Uid, metadata: Option<Metadata>);

    /// Forget a unique id
    fn release(&self, uid: Uid);

    /// Whether a unique id is registered
    fn contains(&self, uid: Uid) -> bool;

    /// Replace the tags of an item template
    fn set_tags(&self, item_id: &str, tags: Vec<String>);

    /// Tags of an item template
    fn tags(&self, item_id: &str) -> Vec<String>;

    /// Whether an item template carries a tag
    fn has_tag(&self, item_id: &str, tag: &str) -> bool {
        self.tags(item_id).iter().any(|t| t == tag)
    }

    /// Set the category path of an item template (e.g. "Weapon/Sword")
    fn set_category(&self, item_id: &str, path: &str);

    /// Category path of an item template
    fn category(&self, item_id: &str) -> Option<String>;
}

#[derive(Default)]
struct DirectoryState {
    metadata: HashMap<Uid, Option<Metadata>>,
    tags: HashMap<String, Vec<String>>,
    categories: HashMap<String, String>,
}

/// Thread-safe in-memory directory
pub struct InMemoryDirectory {
    next_uid: AtomicU64,
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            next_uid: AtomicU64::new(1),
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Create an empty shared directory
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Process-wide directory used by containers created without one
    pub fn global() -> Arc<InMemoryDirectory> {
        static GLOBAL: OnceLock<Arc<InMemoryDirectory>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(InMemoryDirectory::shared))
    }

    /// Number of registered unique ids
    pub fn registered_count(&self) -> usize {
        self.state.read().metadata.len()
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataDirectory for InMemoryDirectory {
    fn assign_uid(&self, metadata: Option<Metadata>) -> Uid {
        let uid = Uid(self.next_uid.fetch_add(1, Ordering::Relaxed));
        self.state.write().metadata.insert(uid, metadata);
        uid
    }

    fn metadata(&self, uid: Uid) -> Option<Metadata> {
        self.state.read().metadata.get(&uid).cloned().flatten()
    }

    fn set_metadata(&self, uid: Uid, metadata: Option<Metadata>) {
        self.state.write().metadata.insert(uid, metadata);
    }

    fn release(&self, uid: Uid) {
        self.state.write().metadata.remove(&uid);
    }

    fn contains(&self, uid: Uid) -> bool {
        self.state.read().metadata.contains_key(&uid)
    }

    fn set_tags(&self, item_id: &str, tags: Vec<String>) {
        self.state.write().tags.insert(item_id.to_string(), tags);
    }

    fn tags(&self, item_id: &str) -> Vec<String> {
        self.state.read().tags.get(item_id).cloned().unwrap_or_default()
    }

    fn set_category(&self, item_id: &str, path: &str) {
        self.state
            .write()
            .categories
            .insert(item_id.to_string(), path.to_string());
    }

    fn category(&self, item_id: &str) -> Option<String> {
        self.state.read().categories.get(item_id).cloned()
    }
}
