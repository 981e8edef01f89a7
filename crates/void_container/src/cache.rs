//! Derived slot indices
//!
//! Four indices are derived from slot contents and must agree with them
//! after every public container call:
//!
//! - item id -> slot indices
//! - item type -> slot indices
//! - empty slot indices
//! - item id -> total count
//!
//! Pipelines collect their changes into a [`CacheDelta`] and apply it once.

use crate::item::Item;
use crate::slot::Slot;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Total-count transition produced by applying a delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalChange {
    pub item_id: String,
    pub old: u64,
    pub new: u64,
}

/// Aggregated index update for one container call
#[derive(Debug, Default)]
pub struct CacheDelta {
    counts: BTreeMap<String, i64>,
    slot_index: Vec<(String, usize, bool)>,
    type_index: Vec<(String, usize, bool)>,
    empty: Vec<(usize, bool)>,
}

impl CacheDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the total of an item id
    pub fn add_count(&mut self, item_id: &str, delta: i64) {
        if delta != 0 {
            *self.counts.entry(item_id.to_string()).or_insert(0) += delta;
        }
    }

    /// A slot became occupied by `item`
    pub fn slot_filled(&mut self, index: usize, item: &Item) {
        self.slot_index.push((item.id.clone(), index, true));
        self.type_index.push((item.item_type.clone(), index, true));
        self.empty.push((index, false));
    }

    /// A slot holding `item` became empty
    pub fn slot_cleared(&mut self, index: usize, item: &Item) {
        self.slot_index.push((item.id.clone(), index, false));
        self.type_index.push((item.item_type.clone(), index, false));
        self.empty.push((index, true));
    }

    /// A new empty slot was appended
    pub fn slot_created(&mut self, index: usize) {
        self.empty.push((index, true));
    }

    /// Nothing recorded
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
            && self.slot_index.is_empty()
            && self.type_index.is_empty()
            && self.empty.is_empty()
    }
}

/// The four derived indices
#[derive(Debug, Clone, Default)]
pub struct ContainerCache {
    item_slots: HashMap<String, BTreeSet<usize>>,
    type_slots: HashMap<String, BTreeSet<usize>>,
    empty_slots: BTreeSet<usize>,
    totals: HashMap<String, u64>,
}

impl ContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every index from scratch
    pub fn rebuild(&mut self, slots: &[Slot]) {
        self.item_slots.clear();
        self.type_slots.clear();
        self.empty_slots.clear();
        self.totals.clear();

        for slot in slots {
            match slot.item() {
                Some(item) => {
                    self.update_slot_index(&item.id, slot.index(), true);
                    self.update_type_index(&item.item_type, slot.index(), true);
                    self.update_count(&item.id, item.count as i64);
                }
                None => self.update_empty_slot(slot.index(), true),
            }
        }
    }

    /// Compare every index against the slots. Mismatches are logged.
    pub fn validate(&self, slots: &[Slot]) -> bool {
        let mut expected = ContainerCache::new();
        expected.rebuild(slots);

        let mut valid = true;
        if expected.totals != self.totals {
            log::warn!("Cache totals out of sync: cached {:?}, actual {:?}", self.totals, expected.totals);
            valid = false;
        }
        if expected.item_slots != self.item_slots {
            log::warn!("Cache item-id index out of sync");
            valid = false;
        }
        if expected.type_slots != self.type_slots {
            log::warn!("Cache item-type index out of sync");
            valid = false;
        }
        if expected.empty_slots != self.empty_slots {
            log::warn!(
                "Cache empty-slot set out of sync: cached {:?}, actual {:?}",
                self.empty_slots,
                expected.empty_slots
            );
            valid = false;
        }
        valid
    }

    /// Empty slot indices, ascending
    pub fn empty_slots(&self) -> &BTreeSet<usize> {
        &self.empty_slots
    }

    /// Slot indices holding an item id, ascending
    pub fn slots_for_id(&self, item_id: &str) -> Option<&BTreeSet<usize>> {
        self.item_slots.get(item_id)
    }

    /// Slot indices holding an item type, ascending
    pub fn slots_for_type(&self, item_type: &str) -> Option<&BTreeSet<usize>> {
        self.type_slots.get(item_type)
    }

    /// Total units of an item id
    pub fn total(&self, item_id: &str) -> u64 {
        self.totals.get(item_id).copied().unwrap_or(0)
    }

    /// Whether any unit of an item id is held
    pub fn has_id(&self, item_id: &str) -> bool {
        self.totals.contains_key(item_id)
    }

    /// Distinct item ids held
    pub fn unique_ids(&self) -> impl Iterator<Item = &str> {
        self.totals.keys().map(String::as_str)
    }

    /// Number of distinct item ids held
    pub fn unique_count(&self) -> usize {
        self.totals.len()
    }

    /// Adjust an item total; totals reaching zero are dropped
    pub fn update_count(&mut self, item_id: &str, delta: i64) {
        let current = self.total(item_id) as i64;
        let updated = (current + delta).max(0) as u64;
        if updated == 0 {
            self.totals.remove(item_id);
        } else {
            self.totals.insert(item_id.to_string(), updated);
        }
    }

    pub fn update_slot_index(&mut self, item_id: &str, index: usize, present: bool) {
        Self::update_set(&mut self.item_slots, item_id, index, present);
    }

    pub fn update_type_index(&mut self, item_type: &str, index: usize, present: bool) {
        Self::update_set(&mut self.type_slots, item_type, index, present);
    }

    pub fn update_empty_slot(&mut self, index: usize, empty: bool) {
        if empty {
            self.empty_slots.insert(index);
        } else {
            self.empty_slots.remove(&index);
        }
    }

    fn update_set(map: &mut HashMap<String, BTreeSet<usize>>, key: &str, index: usize, present: bool) {
        if present {
            map.entry(key.to_string()).or_default().insert(index);
        } else if let Some(set) = map.get_mut(key) {
            set.remove(&index);
            if set.is_empty() {
                map.remove(key);
            }
        }
    }

    /// Apply an aggregated delta, returning the totals that changed
    pub fn apply(&mut self, delta: CacheDelta) -> Vec<TotalChange> {
        for (id, index, present) in &delta.slot_index {
            self.update_slot_index(id, *index, *present);
        }
        for (item_type, index, present) in &delta.type_index {
            self.update_type_index(item_type, *index, *present);
        }
        for (index, empty) in &delta.empty {
            self.update_empty_slot(*index, *empty);
        }

        let mut changes = Vec::new();
        for (item_id, amount) in delta.counts {
            if amount == 0 {
                continue;
            }
            let old = self.total(&item_id);
            self.update_count(&item_id, amount);
            let new = self.total(&item_id);
            if old != new {
                changes.push(TotalChange { item_id, old, new });
            }
        }
        changes
    }
}
