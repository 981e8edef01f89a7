//! Container: ordered slots, derived indices and the mutation pipelines
//!
//! All mutation goes through `&mut self`; a container has a single writer.
//! Wrap it in a [`crate::ContainerHandle`] to serialize access from several
//! threads.

mod add;
mod batch;
mod remove;
mod transfer;

use crate::cache::{CacheDelta, ContainerCache, TotalChange};
use crate::condition::ItemCondition;
use crate::config::ContainerConfig;
use crate::directory::{InMemoryDirectory, MetadataDirectory};
use crate::error::SlotError;
use crate::events::{ContainerObserver, ObserverId, SlotQuantityEvent, TotalCountEvent};
use crate::factory::ItemFactory;
use crate::item::{Item, MetadataBinding, MetadataValue, Uid};
use crate::query::ContainerQuery;
use crate::slot::{ContainerId, Slot};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Total-count notification deferred while batching
struct PendingTotal {
    old: u64,
    item: Option<Item>,
}

/// Slot storage with derived indices
pub struct Container {
    id: ContainerId,
    name: String,
    container_type: String,
    config: ContainerConfig,
    slots: Vec<Slot>,
    cache: ContainerCache,
    conditions: Vec<Arc<dyn ItemCondition>>,
    directory: Arc<dyn MetadataDirectory>,
    factory: Option<Arc<dyn ItemFactory>>,
    observers: Vec<(ObserverId, Box<dyn ContainerObserver>)>,
    next_observer_id: u64,
    /// Occupied slots whose stackable item is below its limit
    stack_room_slots: usize,
    batch_depth: u32,
    pending_totals: BTreeMap<String, PendingTotal>,
}

impl Container {
    /// Create a container with default settings. `None` capacity is unbounded.
    pub fn new(
        name: impl Into<String>,
        container_type: impl Into<String>,
        capacity: Option<usize>,
    ) -> Self {
        Self::with_config(
            name,
            container_type,
            ContainerConfig {
                capacity,
                ..ContainerConfig::default()
            },
        )
    }

    /// Create a container from a config
    pub fn with_config(
        name: impl Into<String>,
        container_type: impl Into<String>,
        config: ContainerConfig,
    ) -> Self {
        let id = ContainerId(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed));
        let mut slots = Vec::new();
        if config.preallocate_slots {
            if let Some(capacity) = config.capacity {
                slots.extend((0..capacity).map(|i| Slot::new(i, id)));
            }
        }

        let mut container = Self {
            id,
            name: name.into(),
            container_type: container_type.into(),
            config,
            slots,
            cache: ContainerCache::new(),
            conditions: Vec::new(),
            directory: InMemoryDirectory::global(),
            factory: None,
            observers: Vec::new(),
            next_observer_id: 1,
            stack_room_slots: 0,
            batch_depth: 0,
            pending_totals: BTreeMap::new(),
        };
        container.rebuild_cache();
        container
    }

    /// Use a specific metadata directory
    pub fn with_directory(mut self, directory: Arc<dyn MetadataDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Enable template-driven adds
    pub fn with_factory(mut self, factory: Arc<dyn ItemFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Add an admission predicate
    pub fn with_condition(mut self, condition: impl ItemCondition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Add an admission predicate
    pub fn add_condition(&mut self, condition: Arc<dyn ItemCondition>) {
        self.conditions.push(condition);
    }

    /// Remove every admission predicate
    pub fn clear_conditions(&mut self) {
        self.conditions.clear();
    }

    /// Set or clear the admission predicate of one slot.
    /// Returns false if the slot does not exist.
    pub fn set_slot_condition(&mut self, index: usize, condition: Option<Arc<dyn ItemCondition>>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.set_condition(condition);
                true
            }
            None => false,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container_type(&self) -> &str {
        &self.container_type
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Maximum slot count (None = unbounded)
    pub fn capacity(&self) -> Option<usize> {
        self.config.capacity
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Slots created so far
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn cache(&self) -> &ContainerCache {
        &self.cache
    }

    pub fn directory(&self) -> &Arc<dyn MetadataDirectory> {
        &self.directory
    }

    pub fn factory(&self) -> Option<&Arc<dyn ItemFactory>> {
        self.factory.as_ref()
    }

    /// Saturated: at capacity, no empty slot, and no stack with room left
    pub fn is_full(&self) -> bool {
        match self.config.capacity {
            Some(capacity) => {
                self.slots.len() >= capacity
                    && self.cache.empty_slots().is_empty()
                    && self.stack_room_slots == 0
            }
            None => false,
        }
    }

    /// Whether an add of `count` units should be handed to a worker
    pub fn should_offload(&self, count: u32) -> bool {
        count > self.config.offload_count_threshold || self.slots.len() > self.config.offload_slot_threshold
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: impl ContainerObserver + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Recompute every index and the stack-room counter from the slots
    pub fn rebuild_cache(&mut self) {
        self.cache.rebuild(&self.slots);
        self.stack_room_slots = self.count_stack_room_slots();
    }

    /// Check every index and the stack-room counter against the slots
    pub fn validate_cache(&self) -> bool {
        let indices_valid = self.cache.validate(&self.slots);
        let counted = self.count_stack_room_slots();
        if counted != self.stack_room_slots {
            log::warn!(
                "{}: stack-room counter is {}, slots say {}",
                self.id,
                self.stack_room_slots,
                counted
            );
            return false;
        }
        indices_valid
    }

    fn count_stack_room_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.has_stack_room()).count()
    }

    /// Read-only query façade
    pub fn query(&self) -> ContainerQuery<'_> {
        ContainerQuery::new(&self.slots, &self.cache, self.directory.as_ref())
    }

    pub fn has_item(&self, item_id: &str) -> bool {
        self.query().has_item(item_id)
    }

    pub fn total_count(&self, item_id: &str) -> u64 {
        self.query().total_count(item_id)
    }

    pub fn find_slot_indices(&self, item_id: &str) -> Vec<usize> {
        self.query().find_slot_indices(item_id)
    }

    pub fn items_by_type(&self, item_type: &str) -> Vec<&Item> {
        self.query().items_by_type(item_type)
    }

    pub fn items_by_attribute(&self, key: &str, value: &MetadataValue) -> Vec<&Item> {
        self.query().items_by_attribute(key, value)
    }

    pub fn items_by_name(&self, name: &str) -> Vec<&Item> {
        self.query().items_by_name(name)
    }

    pub fn items_where(&self, predicate: impl Fn(&Item) -> bool) -> Vec<&Item> {
        self.query().items_where(predicate)
    }

    pub fn all_items(&self) -> Vec<&Item> {
        self.query().all_items()
    }

    pub fn unique_item_count(&self) -> usize {
        self.query().unique_item_count()
    }

    pub fn total_weight(&self) -> f32 {
        self.query().total_weight()
    }

    pub fn is_empty(&self) -> bool {
        self.query().is_empty()
    }

    /// Place an item directly into a slot, bypassing stacking and admission
    /// checks. `None` empties the slot. Returns the previous occupant.
    /// A bound item keeps its unique id as given.
    pub fn set_slot(&mut self, index: usize, item: Option<Item>) -> Result<Option<Item>, SlotError> {
        if item.as_ref().map_or(false, |i| i.is_null() || i.count == 0) {
            return Err(SlotError::InvalidItem(index));
        }

        let mut delta = CacheDelta::new();
        if !self.ensure_slot(index, &mut delta) {
            return Err(SlotError::NotFound(index));
        }

        let previous = self.take_from_slot(index, &mut delta);
        if let Some(mut item) = item {
            item.ensure_uid(self.directory.as_ref());
            self.place_in_slot(index, item, &mut delta);
        }
        self.commit(delta, previous.as_ref());
        Ok(previous)
    }

    /// Empty a slot, returning its item
    pub fn clear_slot(&mut self, index: usize) -> Option<Item> {
        if index >= self.slots.len() {
            return None;
        }
        let mut delta = CacheDelta::new();
        let previous = self.take_from_slot(index, &mut delta);
        self.commit(delta, previous.as_ref());
        previous
    }

    /// Empty every slot, returning the items in slot order
    pub fn clear_all_slots(&mut self) -> Vec<Item> {
        let mut delta = CacheDelta::new();
        let mut cleared = Vec::new();
        for index in 0..self.slots.len() {
            if let Some(item) = self.take_from_slot(index, &mut delta) {
                cleared.push(item);
            }
        }
        self.commit(delta, None);
        cleared
    }

    /// Merge compatible partial stacks and compact items toward the front,
    /// ordered by type then id.
    ///
    /// Each stack lands in the lowest free slot whose condition accepts it,
    /// or back in its own slot when no such slot exists. Returns `false`
    /// and leaves the container untouched when a stack has nowhere to go.
    pub fn organize(&mut self) -> bool {
        let mut items: Vec<(usize, Item)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.item().map(|item| (i, item.clone())))
            .collect();
        items.sort_by(|a, b| (&a.1.item_type, &a.1.id).cmp(&(&b.1.item_type, &b.1.id)));

        let mut merged: Vec<(usize, Item)> = Vec::with_capacity(items.len());
        let mut absorbed: Vec<Uid> = Vec::new();
        for (origin, mut item) in items {
            for (_, existing) in merged.iter_mut().filter(|(_, e)| e.id == item.id) {
                if item.count == 0 {
                    break;
                }
                if !crate::item::can_stack(existing, &item, self.directory.as_ref()) {
                    continue;
                }
                let put = existing.remaining_space().min(item.count);
                existing.count += put;
                item.count -= put;
            }
            if item.count > 0 {
                merged.push((origin, item));
            } else if let Some(uid) = item.uid() {
                absorbed.push(uid);
            }
        }

        let layout = match self.plan_layout(&merged) {
            Some(layout) => layout,
            None => {
                log::debug!("{}: organize skipped, a stack has no accepting slot", self.id);
                return false;
            }
        };

        let old_counts: Vec<u32> = self.slots.iter().map(Slot::count).collect();
        for slot in &mut self.slots {
            slot.take();
        }
        for ((_, item), index) in merged.into_iter().zip(layout) {
            self.slots[index].place(item);
        }
        for uid in absorbed {
            self.directory.release(uid);
        }
        self.rebuild_cache();

        for (index, old_count) in old_counts.into_iter().enumerate() {
            let new_count = self.slots[index].count();
            if new_count != old_count {
                let item = self.slots[index].item().cloned();
                self.emit_slot_change(index, item, old_count, new_count);
            }
        }
        log::debug!("{}: organized into {} stacks", self.id, self.cache.unique_count());
        true
    }

    /// Target slot for each merged stack, in order
    fn plan_layout(&self, merged: &[(usize, Item)]) -> Option<Vec<usize>> {
        let mut used = vec![false; self.slots.len()];
        let mut layout = Vec::with_capacity(merged.len());
        for (origin, item) in merged {
            let index = (0..self.slots.len())
                .find(|&i| !used[i] && self.slots[i].accepts(item))
                .or_else(|| Some(*origin).filter(|&i| !used[i]))?;
            used[index] = true;
            layout.push(index);
        }
        Some(layout)
    }

    // ---- internal slot mutation; every path records into a CacheDelta ----

    fn can_grow(&self) -> bool {
        self.config.capacity.map_or(true, |capacity| self.slots.len() < capacity)
    }

    fn append_slot(&mut self, delta: &mut CacheDelta) -> Option<usize> {
        if !self.can_grow() {
            return None;
        }
        let index = self.slots.len();
        self.slots.push(Slot::new(index, self.id));
        delta.slot_created(index);
        Some(index)
    }

    /// Create slots up to and including `index` if capacity allows
    fn ensure_slot(&mut self, index: usize, delta: &mut CacheDelta) -> bool {
        if self.config.capacity.map_or(false, |capacity| index >= capacity) {
            return false;
        }
        while self.slots.len() <= index {
            self.append_slot(delta);
        }
        true
    }

    fn track_room(&mut self, had_room: bool, has_room: bool) {
        match (had_room, has_room) {
            (true, false) => self.stack_room_slots = self.stack_room_slots.saturating_sub(1),
            (false, true) => self.stack_room_slots += 1,
            _ => {}
        }
    }

    fn place_in_slot(&mut self, index: usize, item: Item, delta: &mut CacheDelta) {
        debug_assert!(!self.slots[index].is_occupied(), "slot {index} already occupied");
        let count = item.count;
        self.track_room(false, item.has_stack_room());
        delta.slot_filled(index, &item);
        delta.add_count(&item.id, i64::from(count));
        let snapshot = item.clone();
        self.slots[index].place(item);
        self.emit_slot_change(index, Some(snapshot), 0, count);
    }

    fn take_from_slot(&mut self, index: usize, delta: &mut CacheDelta) -> Option<Item> {
        let item = self.slots[index].take()?;
        self.track_room(item.has_stack_room(), false);
        delta.slot_cleared(index, &item);
        delta.add_count(&item.id, -i64::from(item.count));
        self.emit_slot_change(index, Some(item.clone()), item.count, 0);
        Some(item)
    }

    /// Set the count of an occupied slot. Returns the item when the slot
    /// was cleared by reaching zero.
    fn change_slot_count(&mut self, index: usize, count: u32, delta: &mut CacheDelta) -> Option<Item> {
        let before = self.slots[index].item()?.clone();
        let change = self.slots[index].set_count(count)?;
        self.track_room(change.had_room, change.has_room);
        delta.add_count(&before.id, i64::from(count) - i64::from(change.old));

        if count == 0 {
            delta.slot_cleared(index, &before);
            self.emit_slot_change(index, Some(before.clone()), change.old, 0);
            Some(before)
        } else {
            let snapshot = self.slots[index].item().cloned();
            self.emit_slot_change(index, snapshot, change.old, count);
            None
        }
    }

    /// Whether a slot holding `item_id` carries this unique id
    fn holds_uid(&self, item_id: &str, uid: Uid) -> bool {
        self.cache.slots_for_id(item_id).map_or(false, |indices| {
            indices
                .iter()
                .filter_map(|&i| self.slots.get(i)?.item())
                .any(|item| item.uid() == Some(uid))
        })
    }

    /// Independent copy with a fresh unique id minted in this container's
    /// directory, via the factory when present
    fn fresh_copy(&self, item: &Item, count: u32) -> Item {
        match &self.factory {
            Some(factory) => factory.clone_with_count(item, count, self.directory.as_ref()),
            None => {
                let mut copy = item.duplicate(self.directory.as_ref()).with_count(count);
                copy.ensure_uid(self.directory.as_ref());
                copy
            }
        }
    }

    /// Apply a call's aggregated delta and report changed totals
    fn commit(&mut self, delta: CacheDelta, hint: Option<&Item>) {
        if delta.is_empty() {
            return;
        }
        for change in self.cache.apply(delta) {
            self.notify_total(change, hint);
        }
    }

    fn snapshot_for(&self, item_id: &str, hint: Option<&Item>) -> Option<Item> {
        self.cache
            .slots_for_id(item_id)
            .and_then(|indices| indices.iter().next())
            .and_then(|&i| self.slots.get(i)?.item().cloned())
            .or_else(|| hint.filter(|h| h.id == item_id).cloned())
    }

    fn notify_total(&mut self, change: TotalChange, hint: Option<&Item>) {
        let item = self.snapshot_for(&change.item_id, hint);
        if self.batch_depth > 0 {
            let pending = self
                .pending_totals
                .entry(change.item_id)
                .or_insert(PendingTotal {
                    old: change.old,
                    item: None,
                });
            if item.is_some() {
                pending.item = item;
            }
            return;
        }

        let event = TotalCountEvent {
            container: self.id,
            item_id: change.item_id,
            item,
            old_total: change.old,
            new_total: change.new,
        };
        self.emit(|o| o.on_item_total_changed(&event));
    }

    fn emit_slot_change(&mut self, slot: usize, item: Option<Item>, old_count: u32, new_count: u32) {
        if self.observers.is_empty() {
            return;
        }
        let event = SlotQuantityEvent {
            container: self.id,
            slot,
            item,
            old_count,
            new_count,
        };
        self.emit(|o| o.on_slot_quantity_changed(&event));
    }

    fn emit(&mut self, mut notify: impl FnMut(&mut dyn ContainerObserver)) {
        for (_, observer) in &mut self.observers {
            notify(observer.as_mut());
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("container_type", &self.container_type)
            .field("capacity", &self.config.capacity)
            .field("slots", &self.slots.len())
            .field("unique_items", &self.cache.unique_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelObserver, ContainerEvent};

    fn container(capacity: Option<usize>) -> Container {
        Container::new("test", "Bag", capacity).with_directory(InMemoryDirectory::shared())
    }

    #[test]
    fn test_creation() {
        let lazy = container(Some(10));
        assert_eq!(lazy.slot_count(), 0);
        assert!(lazy.is_empty());
        assert!(!lazy.is_full());

        let eager = Container::with_config("chest", "Chest", ContainerConfig::bounded(4).preallocated());
        assert_eq!(eager.slot_count(), 4);
        assert_eq!(eager.cache().empty_slots().len(), 4);
        assert_ne!(lazy.id(), eager.id());
    }

    #[test]
    fn test_set_and_clear_slot() {
        let mut c = container(Some(3));
        let previous = c.set_slot(1, Some(Item::new("gem", "Gem").with_count(4))).unwrap();
        assert!(previous.is_none());
        assert_eq!(c.slot_count(), 2);
        assert_eq!(c.total_count("gem"), 4);
        assert!(c.slot(1).unwrap().item().unwrap().uid().is_some());

        assert_eq!(c.set_slot(5, Some(Item::new("gem", "Gem"))), Err(SlotError::NotFound(5)));
        assert_eq!(
            c.set_slot(0, Some(Item::new("gem", "Gem").with_count(0))),
            Err(SlotError::InvalidItem(0))
        );

        let cleared = c.clear_slot(1).unwrap();
        assert_eq!(cleared.count, 4);
        assert!(!c.has_item("gem"));
        assert!(c.validate_cache());
    }

    #[test]
    fn test_clear_all_slots() {
        let mut c = container(None);
        c.set_slot(0, Some(Item::new("a", "A").with_count(2))).unwrap();
        c.set_slot(1, Some(Item::new("b", "B").with_count(3))).unwrap();

        let cleared = c.clear_all_slots();
        assert_eq!(cleared.len(), 2);
        assert!(c.is_empty());
        assert_eq!(c.cache().empty_slots().len(), 2);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_full_tracks_stack_room_incrementally() {
        let mut c = container(Some(2));
        c.set_slot(0, Some(Item::new("sword", "Sword").non_stackable())).unwrap();
        c.set_slot(1, Some(Item::new("arrow", "Arrow").with_max_stack(10).with_count(9))).unwrap();
        assert!(!c.is_full());

        let mut delta = CacheDelta::new();
        c.change_slot_count(1, 10, &mut delta);
        c.commit(delta, None);
        assert!(c.is_full());
        assert!(c.validate_cache());
    }

    #[test]
    fn test_observer_lifecycle() {
        let mut c = container(None);
        let (observer, events) = ChannelObserver::unbounded();
        let id = c.subscribe(observer);

        c.set_slot(0, Some(Item::new("gem", "Gem").with_count(2))).unwrap();
        let received: Vec<ContainerEvent> = events.try_iter().collect();
        assert!(received
            .iter()
            .any(|e| matches!(e, ContainerEvent::SlotQuantityChanged(s) if s.new_count == 2)));
        assert!(received.iter().any(
            |e| matches!(e, ContainerEvent::TotalCountChanged(t) if t.old_total == 0 && t.new_total == 2)
        ));

        assert!(c.unsubscribe(id));
        assert!(!c.unsubscribe(id));
        c.clear_slot(0);
        assert!(events.try_iter().next().is_none());
    }

    #[test]
    fn test_organize_merges_and_compacts() {
        let mut c = container(Some(6));
        c.set_slot(1, Some(Item::new("arrow", "Arrow").with_type("Ammo").with_count(30).with_max_stack(50))).unwrap();
        c.set_slot(3, Some(Item::new("apple", "Apple").with_type("Food").with_count(2))).unwrap();
        c.set_slot(5, Some(Item::new("arrow", "Arrow").with_type("Ammo").with_count(30).with_max_stack(50))).unwrap();

        assert!(c.organize());

        assert_eq!(c.slot(0).unwrap().item().unwrap().id, "arrow");
        assert_eq!(c.slot(0).unwrap().count(), 50);
        assert_eq!(c.slot(1).unwrap().count(), 10);
        assert_eq!(c.slot(2).unwrap().item().unwrap().id, "apple");
        assert!(!c.slot(5).unwrap().is_occupied());
        assert_eq!(c.total_count("arrow"), 60);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_organize_skips_rejecting_slots() {
        let mut c = container(Some(4));
        for index in 1..4 {
            c.set_slot(index, Some(Item::new("sword", "Sword").with_type("Weapon").non_stackable()))
                .unwrap();
        }
        c.set_slot_condition(0, Some(Arc::new(crate::condition::ItemTypeCondition::new("Food"))));

        assert!(c.organize());
        assert!(!c.slot(0).unwrap().is_occupied());
        assert_eq!(c.find_slot_indices("sword"), vec![1, 2, 3]);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_organize_fills_accepting_slots_first() {
        let mut c = container(Some(3));
        c.set_slot(2, Some(Item::new("apple", "Apple").with_type("Food").with_count(3))).unwrap();
        c.set_slot(1, Some(Item::new("sword", "Sword").with_type("Weapon").non_stackable())).unwrap();
        c.set_slot_condition(0, Some(Arc::new(crate::condition::ItemTypeCondition::new("Weapon"))));

        assert!(c.organize());
        let s0 = c.slot(0).unwrap();
        assert!(s0.accepts(s0.item().unwrap()));
        assert_eq!(s0.item().unwrap().id, "sword");
        assert_eq!(c.slot(1).unwrap().item().unwrap().id, "apple");
        assert!(c.validate_cache());
    }
}
