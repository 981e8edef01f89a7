//! Storage cells

use crate::condition::ItemCondition;
use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a container, issued at construction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

/// Count transition of a slot, reported to the owning container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QuantityChange {
    pub old: u32,
    pub new: u32,
    pub had_room: bool,
    pub has_room: bool,
}

/// A single storage cell holding at most one stack.
///
/// Invariant: an occupied slot's item has a count above zero.
#[derive(Clone)]
pub struct Slot {
    index: usize,
    container: ContainerId,
    item: Option<Item>,
    condition: Option<Arc<dyn ItemCondition>>,
}

impl Slot {
    pub(crate) fn new(index: usize, container: ContainerId) -> Self {
        Self {
            index,
            container,
            item: None,
            condition: None,
        }
    }

    /// Position in the owning container
    pub fn index(&self) -> usize {
        self.index
    }

    /// Owning container
    pub fn container(&self) -> ContainerId {
        self.container
    }

    /// Held item
    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    pub(crate) fn item_mut(&mut self) -> Option<&mut Item> {
        self.item.as_mut()
    }

    /// Whether the slot holds an item
    pub fn is_occupied(&self) -> bool {
        self.item.is_some()
    }

    /// Units held (0 when empty)
    pub fn count(&self) -> u32 {
        self.item.as_ref().map_or(0, |i| i.count)
    }

    /// Units that can still be stacked here (0 when empty)
    pub fn remaining_space(&self) -> u32 {
        self.item.as_ref().map_or(0, Item::remaining_space)
    }

    /// Holds a stackable item below its limit
    pub fn has_stack_room(&self) -> bool {
        self.item.as_ref().map_or(false, Item::has_stack_room)
    }

    /// Slot-level admission check
    pub fn accepts(&self, item: &Item) -> bool {
        self.condition.as_ref().map_or(true, |c| c.check(item))
    }

    pub(crate) fn set_condition(&mut self, condition: Option<Arc<dyn ItemCondition>>) {
        self.condition = condition;
    }

    /// Put an item into the slot, returning the previous occupant
    pub(crate) fn place(&mut self, item: Item) -> Option<Item> {
        debug_assert!(item.count > 0, "placing an empty stack");
        self.item.replace(item)
    }

    /// Remove the held item
    pub(crate) fn take(&mut self) -> Option<Item> {
        self.item.take()
    }

    /// Change the held count; reaching zero clears the slot
    pub(crate) fn set_count(&mut self, count: u32) -> Option<QuantityChange> {
        let item = self.item.as_mut()?;
        let old = item.count;
        let had_room = item.has_stack_room();
        item.count = count;
        let has_room = count > 0 && item.has_stack_room();
        if count == 0 {
            self.item = None;
        }
        Some(QuantityChange {
            old,
            new: count,
            had_room,
            has_room,
        })
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("container", &self.container)
            .field("item", &self.item)
            .field("conditioned", &self.condition.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_count_clears_at_zero() {
        let mut slot = Slot::new(0, ContainerId(1));
        slot.place(Item::new("arrow", "Arrow").with_count(5).with_max_stack(10));
        assert!(slot.is_occupied());
        assert_eq!(slot.remaining_space(), 5);

        let change = slot.set_count(10).unwrap();
        assert_eq!((change.old, change.new), (5, 10));
        assert!(change.had_room);
        assert!(!change.has_room);

        let change = slot.set_count(0).unwrap();
        assert!(!change.has_room);
        assert!(!slot.is_occupied());
        assert!(slot.set_count(3).is_none());
    }

    #[test]
    fn test_slot_condition() {
        let mut slot = Slot::new(2, ContainerId(1));
        assert!(slot.accepts(&Item::new("apple", "Apple")));

        slot.set_condition(Some(Arc::new(|item: &Item| item.item_type == "Weapon")));
        assert!(!slot.accepts(&Item::new("apple", "Apple")));
        assert!(slot.accepts(&Item::new("axe", "Axe").with_type("Weapon")));
    }
}
