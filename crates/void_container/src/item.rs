//! Items, unique ids and runtime metadata

use crate::directory::MetadataDirectory;
use crate::shape::ItemShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-instance key/value data that distinguishes otherwise identical items
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<MetadataValue>),
}

impl MetadataValue {
    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Globally unique per-instance identity, issued by a [`MetadataDirectory`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(pub u64);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid#{}", self.0)
    }
}

/// Closed set of item variants
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ItemKind {
    /// Occupies a single cell
    #[default]
    Standard,
    /// Occupies the cells described by a shape in a grid container
    Grid(ItemShape),
}

/// Capability shared by every item variant: binding a unique id and
/// resolving runtime metadata through the directory once bound.
pub trait MetadataBinding {
    /// Bound unique id, if any
    fn uid(&self) -> Option<Uid>;

    /// Bind a unique id
    fn bind_uid(&mut self, uid: Uid);

    /// Drop the bound unique id
    fn clear_uid(&mut self);

    /// Metadata held locally while unbound
    fn local_metadata(&self) -> Option<&Metadata>;

    /// Take the locally held metadata
    fn take_local_metadata(&mut self) -> Option<Metadata>;

    /// Assign a unique id if unassigned, handing local metadata to the directory
    fn ensure_uid(&mut self, directory: &dyn MetadataDirectory) -> Uid {
        if let Some(uid) = self.uid() {
            return uid;
        }
        let uid = directory.assign_uid(self.take_local_metadata());
        self.bind_uid(uid);
        uid
    }

    /// Effective metadata: directory-owned when bound, local otherwise.
    ///
    /// An empty map resolves to `None`, so an item whose last metadata key
    /// was removed compares equal to one that never had metadata. Stack
    /// compatibility follows the same rule.
    fn resolved_metadata(&self, directory: &dyn MetadataDirectory) -> Option<Metadata> {
        let metadata = match self.uid() {
            Some(uid) => directory.metadata(uid),
            None => self.local_metadata().cloned(),
        };
        metadata.filter(|m| !m.is_empty())
    }
}

/// A stack of identical item units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Template identity
    pub id: String,
    /// Display name
    pub name: String,
    /// Type tag
    pub item_type: String,
    /// Weight per unit
    pub weight: f32,
    /// Units in this stack
    pub count: u32,
    /// Maximum stack size (0 = unbounded)
    pub max_stack: u32,
    /// Whether units of this item can share a slot
    pub stackable: bool,
    /// Variant
    pub kind: ItemKind,
    uid: Option<Uid>,
    metadata: Option<Metadata>,
}

impl Item {
    /// Create a new stackable item with a count of one
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type: String::new(),
            weight: 0.0,
            count: 1,
            max_stack: 99,
            stackable: true,
            kind: ItemKind::Standard,
            uid: None,
            metadata: None,
        }
    }

    /// Set type tag
    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    /// Set weight per unit
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Set count
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set max stack size (0 = unbounded)
    pub fn with_max_stack(mut self, max: u32) -> Self {
        self.max_stack = max;
        self
    }

    /// Make non-stackable
    pub fn non_stackable(mut self) -> Self {
        self.stackable = false;
        self
    }

    /// Attach a grid shape
    pub fn with_shape(mut self, shape: ItemShape) -> Self {
        self.kind = ItemKind::Grid(shape);
        self
    }

    /// Add a local metadata entry (before a unique id is bound)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set a metadata entry, writing through to the directory when bound
    pub fn set_metadata(
        &mut self,
        directory: &dyn MetadataDirectory,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) {
        match self.uid {
            Some(uid) => {
                let mut metadata = directory.metadata(uid).unwrap_or_default();
                metadata.insert(key.into(), value.into());
                directory.set_metadata(uid, Some(metadata));
            }
            None => {
                self.metadata
                    .get_or_insert_with(Metadata::new)
                    .insert(key.into(), value.into());
            }
        }
    }

    /// Look up a single metadata entry
    pub fn metadata_value(&self, directory: &dyn MetadataDirectory, key: &str) -> Option<MetadataValue> {
        self.resolved_metadata(directory)?.get(key).cloned()
    }

    /// The null item carries no template identity
    pub fn is_null(&self) -> bool {
        self.id.is_empty()
    }

    /// Units a single slot may hold
    pub fn stack_limit(&self) -> u32 {
        if !self.stackable {
            1
        } else if self.max_stack == 0 {
            u32::MAX
        } else {
            self.max_stack
        }
    }

    /// Units that can still be stacked onto this item
    pub fn remaining_space(&self) -> u32 {
        self.stack_limit().saturating_sub(self.count)
    }

    /// Stackable and below its limit
    pub fn has_stack_room(&self) -> bool {
        self.stackable && self.count < self.stack_limit()
    }

    /// Weight of the whole stack
    pub fn total_weight(&self) -> f32 {
        self.weight * self.count as f32
    }

    /// Grid shape, if this is a grid item
    pub fn shape(&self) -> Option<&ItemShape> {
        match &self.kind {
            ItemKind::Grid(shape) => Some(shape),
            ItemKind::Standard => None,
        }
    }

    /// Independent copy: same count, unassigned unique id, metadata copied locally
    pub fn duplicate(&self, directory: &dyn MetadataDirectory) -> Item {
        let metadata = self.resolved_metadata(directory);
        Item {
            uid: None,
            metadata,
            ..self.clone()
        }
    }
}

impl MetadataBinding for Item {
    fn uid(&self) -> Option<Uid> {
        self.uid
    }

    fn bind_uid(&mut self, uid: Uid) {
        self.uid = Some(uid);
    }

    fn clear_uid(&mut self) {
        self.uid = None;
    }

    fn local_metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn take_local_metadata(&mut self) -> Option<Metadata> {
        self.metadata.take()
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Whether two items may share a slot. Symmetric.
pub fn can_stack(a: &Item, b: &Item, directory: &dyn MetadataDirectory) -> bool {
    a.id == b.id
        && a.item_type == b.item_type
        && a.stackable
        && b.stackable
        && a.resolved_metadata(directory) == b.resolved_metadata(directory)
}
