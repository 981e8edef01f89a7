//! Move and split pipelines

use super::Container;
use crate::cache::CacheDelta;
use crate::error::SplitError;
use crate::item::{can_stack, Item, MetadataBinding};
use crate::result::MoveItemResult;
use std::sync::Arc;

impl Container {
    /// Move the stack in `from` to `to` within this container.
    ///
    /// An empty target takes the stack, a compatible target absorbs as much
    /// as fits (with auto-stacking on), anything else swaps the two stacks.
    pub fn move_item(&mut self, from: usize, to: usize) -> MoveItemResult {
        let Some(source) = self.slots.get(from).and_then(|s| s.item()).cloned() else {
            let result = if from < self.slots.len() {
                MoveItemResult::SourceSlotEmpty
            } else {
                MoveItemResult::SourceSlotNotFound
            };
            log::debug!("{}: move from slot {} failed: {:?}", self.id, from, result);
            return result;
        };
        if from == to {
            return MoveItemResult::SameSlot;
        }

        let mut delta = CacheDelta::new();
        if !self.ensure_slot(to, &mut delta) {
            log::debug!("{}: move target slot {} is beyond capacity", self.id, to);
            return MoveItemResult::TargetSlotNotFound;
        }

        let result = match self.slots[to].item().cloned() {
            None => {
                if self.slots[to].accepts(&source) {
                    if let Some(item) = self.take_from_slot(from, &mut delta) {
                        self.place_in_slot(to, item, &mut delta);
                    }
                    MoveItemResult::Success
                } else {
                    MoveItemResult::ItemConditionNotMet
                }
            }
            Some(target) if self.config.auto_stack && can_stack(&target, &source, self.directory.as_ref()) => {
                let put = target.remaining_space().min(source.count);
                if put == 0 {
                    MoveItemResult::Failed
                } else {
                    self.change_slot_count(to, target.count + put, &mut delta);
                    if let Some(merged) = self.change_slot_count(from, source.count - put, &mut delta) {
                        if let Some(uid) = merged.uid() {
                            self.directory.release(uid);
                        }
                    }
                    if put == source.count {
                        MoveItemResult::Success
                    } else {
                        MoveItemResult::PartialSuccess
                    }
                }
            }
            Some(target) => {
                if self.slots[to].accepts(&source) && self.slots[from].accepts(&target) {
                    self.swap_slots(from, to, &mut delta);
                    MoveItemResult::Success
                } else {
                    MoveItemResult::ItemConditionNotMet
                }
            }
        };

        self.commit(delta, Some(&source));
        if !matches!(result, MoveItemResult::Success | MoveItemResult::PartialSuccess) {
            log::debug!("{}: move {} -> {} failed: {:?}", self.id, from, to, result);
        }
        result
    }

    /// Exchange two occupied slots. Counts per id are unchanged, so only
    /// the slot, type and empty indices move.
    fn swap_slots(&mut self, a: usize, b: usize, delta: &mut CacheDelta) {
        if !(self.slots[a].is_occupied() && self.slots[b].is_occupied()) {
            return;
        }
        let (Some(first), Some(second)) = (self.slots[a].take(), self.slots[b].take()) else {
            return;
        };
        delta.slot_cleared(a, &first);
        delta.slot_cleared(b, &second);
        delta.slot_filled(b, &first);
        delta.slot_filled(a, &second);

        let (first_count, second_count) = (first.count, second.count);
        let (first_snapshot, second_snapshot) = (first.clone(), second.clone());
        self.slots[b].place(first);
        self.slots[a].place(second);
        if first_count != second_count {
            self.emit_slot_change(a, Some(second_snapshot), first_count, second_count);
            self.emit_slot_change(b, Some(first_snapshot), second_count, first_count);
        }
    }

    /// Move the stack in `from` into another container through its add
    /// pipeline. The stack keeps its unique id when the destination shares
    /// this container's directory. Nothing accepted reads as
    /// `TargetContainerFull` only while the destination is full.
    pub fn move_to(&mut self, from: usize, destination: &mut Container, target_slot: Option<usize>) -> MoveItemResult {
        let Some(source) = self.slots.get(from).and_then(|s| s.item()).cloned() else {
            let result = if from < self.slots.len() {
                MoveItemResult::SourceSlotEmpty
            } else {
                MoveItemResult::SourceSlotNotFound
            };
            log::debug!("{}: move to {} failed: {:?}", self.id, destination.id, result);
            return result;
        };

        let shared_directory = Arc::ptr_eq(&self.directory, &destination.directory);
        let incoming = if shared_directory {
            source.clone()
        } else {
            source.duplicate(self.directory.as_ref())
        };
        let auto_stack = destination.config.auto_stack;
        let report = destination.add_transferred(&incoming, source.count, target_slot, auto_stack);

        let accepted = report.added;
        let uid_moved = shared_directory
            && source
                .uid()
                .map_or(false, |uid| destination.holds_uid(&source.id, uid));

        let mut delta = CacheDelta::new();
        let result = if accepted == source.count {
            self.take_from_slot(from, &mut delta);
            if !uid_moved {
                if let Some(uid) = source.uid() {
                    self.directory.release(uid);
                }
            }
            MoveItemResult::Success
        } else if accepted > 0 {
            self.change_slot_count(from, source.count - accepted, &mut delta);
            if uid_moved {
                self.rebind_fresh_uid(from);
            }
            MoveItemResult::PartialSuccess
        } else if destination.is_full() {
            MoveItemResult::TargetContainerFull
        } else {
            MoveItemResult::Failed
        };
        self.commit(delta, Some(&source));

        log::debug!(
            "{}: moved {} of {} '{}' to {}: {:?}",
            self.id,
            accepted,
            source.count,
            source.id,
            destination.id,
            result
        );
        result
    }

    /// Give the stack left behind in a slot its own unique id
    fn rebind_fresh_uid(&mut self, index: usize) {
        let directory = Arc::clone(&self.directory);
        if let Some(item) = self.slots[index].item_mut() {
            let metadata = item.resolved_metadata(directory.as_ref());
            item.bind_uid(directory.assign_uid(metadata));
        }
    }

    /// Take `count` units out of a slot as a new, independent item with its
    /// own unique id. The new item is not placed anywhere.
    pub fn split_item(&mut self, index: usize, count: u32) -> Result<Item, SplitError> {
        let slot = self.slots.get(index).ok_or(SplitError::SlotNotFound(index))?;
        let held = slot.item().ok_or(SplitError::SlotEmpty(index))?;
        if count == 0 || count > held.count {
            return Err(SplitError::InvalidCount {
                requested: count,
                available: held.count,
            });
        }

        let split = self.fresh_copy(held, count);
        let remaining = held.count - count;
        let mut delta = CacheDelta::new();
        if let Some(cleared) = self.change_slot_count(index, remaining, &mut delta) {
            if let Some(uid) = cleared.uid() {
                self.directory.release(uid);
            }
        }
        self.commit(delta, Some(&split));
        log::debug!("{}: split {} '{}' from slot {}", self.id, count, split.id, index);
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use crate::condition::ItemTypeCondition;
    use crate::container::Container;
    use crate::directory::{InMemoryDirectory, MetadataDirectory};
    use crate::error::SplitError;
    use crate::item::{Item, MetadataBinding, MetadataValue};
    use crate::result::MoveItemResult;
    use std::sync::Arc;

    fn bag(capacity: Option<usize>, dir: &Arc<InMemoryDirectory>) -> Container {
        Container::new("bag", "Bag", capacity).with_directory(dir.clone())
    }

    fn arrow() -> Item {
        Item::new("arrow", "Arrow").with_type("Ammo").with_max_stack(20)
    }

    #[test]
    fn test_move_into_empty_slot() {
        let dir = InMemoryDirectory::shared();
        let mut c = bag(Some(4), &dir);
        c.add_items(&arrow(), 5);

        assert_eq!(c.move_item(0, 3), MoveItemResult::Success);
        assert!(!c.slot(0).unwrap().is_occupied());
        assert_eq!(c.slot(3).unwrap().count(), 5);
        assert_eq!(c.find_slot_indices("arrow"), vec![3]);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_move_merges_compatible_stacks() {
        let dir = InMemoryDirectory::shared();
        let mut c = bag(None, &dir);
        c.set_slot(0, Some(arrow().with_count(15))).unwrap();
        c.set_slot(1, Some(arrow().with_count(10))).unwrap();

        assert_eq!(c.move_item(1, 0), MoveItemResult::PartialSuccess);
        assert_eq!(c.slot(0).unwrap().count(), 20);
        assert_eq!(c.slot(1).unwrap().count(), 5);

        c.remove_item_at_index(0, 15, None);
        assert_eq!(c.move_item(1, 0), MoveItemResult::Success);
        assert_eq!(c.slot(0).unwrap().count(), 10);
        assert!(!c.slot(1).unwrap().is_occupied());
        assert_eq!(c.total_count("arrow"), 10);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_move_swaps_incompatible_stacks() {
        let dir = InMemoryDirectory::shared();
        let mut c = bag(None, &dir);
        c.set_slot(0, Some(arrow().with_count(3))).unwrap();
        c.set_slot(1, Some(Item::new("apple", "Apple").with_type("Food"))).unwrap();

        assert_eq!(c.move_item(0, 1), MoveItemResult::Success);
        assert_eq!(c.slot(0).unwrap().item().unwrap().id, "apple");
        assert_eq!(c.slot(1).unwrap().item().unwrap().id, "arrow");
        assert_eq!(c.items_by_type("Ammo").len(), 1);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_move_failures() {
        let dir = InMemoryDirectory::shared();
        let mut c = bag(Some(3), &dir);
        c.add_items(&arrow(), 1);
        c.set_slot(1, Some(Item::new("apple", "Apple").with_type("Food"))).unwrap();
        c.clear_slot(1);

        assert_eq!(c.move_item(7, 0), MoveItemResult::SourceSlotNotFound);
        assert_eq!(c.move_item(1, 0), MoveItemResult::SourceSlotEmpty);
        assert_eq!(c.move_item(0, 0), MoveItemResult::SameSlot);
        assert_eq!(c.move_item(0, 5), MoveItemResult::TargetSlotNotFound);

        c.set_slot_condition(1, Some(Arc::new(ItemTypeCondition::new("Food"))));
        assert_eq!(c.move_item(0, 1), MoveItemResult::ItemConditionNotMet);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_move_to_other_container_keeps_uid() {
        let dir = InMemoryDirectory::shared();
        let mut source = bag(None, &dir);
        let mut chest = bag(Some(4), &dir);
        source.add_items(&arrow(), 12);
        let uid = source.slot(0).unwrap().item().unwrap().uid().unwrap();

        assert_eq!(source.move_to(0, &mut chest, None), MoveItemResult::Success);
        assert!(!source.slot(0).unwrap().is_occupied());
        assert_eq!(chest.total_count("arrow"), 12);
        assert_eq!(chest.slot(0).unwrap().item().unwrap().uid(), Some(uid));
        assert!(dir.contains(uid));
        assert!(source.validate_cache() && chest.validate_cache());
    }

    #[test]
    fn test_partial_move_to_splits_identity() {
        let dir = InMemoryDirectory::shared();
        let mut source = bag(None, &dir);
        let mut pouch = bag(Some(1), &dir);
        source.add_items(&arrow(), 20);
        pouch.add_items(&arrow(), 15);

        assert_eq!(source.move_to(0, &mut pouch, None), MoveItemResult::PartialSuccess);
        assert_eq!(source.slot(0).unwrap().count(), 15);
        assert_eq!(pouch.total_count("arrow"), 20);

        assert_eq!(source.move_to(0, &mut pouch, None), MoveItemResult::TargetContainerFull);
        assert_eq!(source.total_count("arrow"), 15);
    }

    #[test]
    fn test_move_to_full_stack_with_free_slots_fails() {
        let dir = InMemoryDirectory::shared();
        let mut source = bag(None, &dir);
        let mut rack = bag(Some(10), &dir);
        source.add_items(&arrow(), 5);
        rack.add_items(&arrow(), 20);
        assert!(!rack.is_full());

        assert_eq!(source.move_to(0, &mut rack, Some(0)), MoveItemResult::Failed);
        assert_eq!(source.total_count("arrow"), 5);
        assert_eq!(rack.total_count("arrow"), 20);
        assert!(source.validate_cache() && rack.validate_cache());
    }

    #[test]
    fn test_move_to_across_directories_rebinds_identity() {
        let home = InMemoryDirectory::shared();
        let away = InMemoryDirectory::shared();
        let mut source = bag(None, &home);
        let mut stash = bag(None, &away);
        source.add_items(&arrow().with_metadata("fletching", "goose"), 8);
        let uid = source.slot(0).unwrap().item().unwrap().uid().unwrap();

        assert_eq!(source.move_to(0, &mut stash, None), MoveItemResult::Success);
        assert!(!home.contains(uid));
        let moved = stash.slot(0).unwrap().item().unwrap();
        assert!(away.contains(moved.uid().unwrap()));
        assert_eq!(
            moved.metadata_value(away.as_ref(), "fletching"),
            Some(MetadataValue::from("goose"))
        );
        assert_eq!(stash.total_count("arrow"), 8);
        assert!(source.validate_cache() && stash.validate_cache());
    }

    #[test]
    fn test_move_to_rejected_by_condition() {
        let dir = InMemoryDirectory::shared();
        let mut source = bag(None, &dir);
        let mut pantry = bag(None, &dir).with_condition(ItemTypeCondition::new("Food"));
        source.add_items(&arrow(), 3);

        assert_eq!(source.move_to(0, &mut pantry, None), MoveItemResult::Failed);
        assert_eq!(source.total_count("arrow"), 3);
    }

    #[test]
    fn test_split() {
        let dir = InMemoryDirectory::shared();
        let mut c = bag(None, &dir);
        c.add_items(&arrow(), 10);
        let source_uid = c.slot(0).unwrap().item().unwrap().uid().unwrap();

        let split = c.split_item(0, 4).unwrap();
        assert_eq!(split.count, 4);
        assert_ne!(split.uid(), Some(source_uid));
        assert!(split.uid().is_some());
        assert_eq!(c.slot(0).unwrap().count(), 6);
        assert_eq!(c.total_count("arrow"), 6);

        assert_eq!(c.split_item(0, 7), Err(SplitError::InvalidCount { requested: 7, available: 6 }));
        assert_eq!(c.split_item(3, 1), Err(SplitError::SlotNotFound(3)));

        c.split_item(0, 6).unwrap();
        assert!(!c.slot(0).unwrap().is_occupied());
        assert!(!dir.contains(source_uid));
        assert_eq!(c.split_item(0, 1), Err(SplitError::SlotEmpty(0)));
        assert!(c.validate_cache());
    }
}
