//! Item admission predicates

use crate::directory::MetadataDirectory;
use crate::item::{Item, MetadataValue};
use std::sync::Arc;

/// Predicate deciding whether an item may enter a container or slot
pub trait ItemCondition: Send + Sync {
    /// Check the item
    fn check(&self, item: &Item) -> bool;
}

impl<F> ItemCondition for F
where
    F: Fn(&Item) -> bool + Send + Sync,
{
    fn check(&self, item: &Item) -> bool {
        self(item)
    }
}

/// Accepts items whose type tag is in the allowed list
pub struct ItemTypeCondition {
    allowed: Vec<String>,
}

impl ItemTypeCondition {
    /// Allow a single type
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            allowed: vec![item_type.into()],
        }
    }

    /// Allow any of several types
    pub fn any_of<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl ItemCondition for ItemTypeCondition {
    fn check(&self, item: &Item) -> bool {
        self.allowed.iter().any(|t| *t == item.item_type)
    }
}

/// Accepts items whose metadata entry equals a value
pub struct AttributeCondition {
    key: String,
    value: MetadataValue,
    directory: Arc<dyn MetadataDirectory>,
}

impl AttributeCondition {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
        directory: Arc<dyn MetadataDirectory>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            directory,
        }
    }
}

impl ItemCondition for AttributeCondition {
    fn check(&self, item: &Item) -> bool {
        item.metadata_value(self.directory.as_ref(), &self.key)
            .map_or(false, |v| v == self.value)
    }
}

/// Accepts items whose per-unit weight does not exceed a limit
pub struct MaxWeightCondition(pub f32);

impl ItemCondition for MaxWeightCondition {
    fn check(&self, item: &Item) -> bool {
        item.weight <= self.0
    }
}

/// Inverts a condition
pub struct NotCondition(pub Box<dyn ItemCondition>);

impl ItemCondition for NotCondition {
    fn check(&self, item: &Item) -> bool {
        !self.0.check(item)
    }
}

/// Accepts when every inner condition accepts
#[derive(Default)]
pub struct AllConditions(pub Vec<Box<dyn ItemCondition>>);

impl ItemCondition for AllConditions {
    fn check(&self, item: &Item) -> bool {
        self.0.iter().all(|c| c.check(item))
    }
}

/// Accepts when any inner condition accepts
#[derive(Default)]
pub struct AnyCondition(pub Vec<Box<dyn ItemCondition>>);

impl ItemCondition for AnyCondition {
    fn check(&self, item: &Item) -> bool {
        self.0.iter().any(|c| c.check(item))
    }
}
