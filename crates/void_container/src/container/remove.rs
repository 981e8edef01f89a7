//! Remove pipeline

use super::Container;
use crate::cache::CacheDelta;
use crate::events::RemoveEvent;
use crate::item::{Item, MetadataBinding};
use crate::result::{RemoveItemResult, RemoveReport};

impl Container {
    /// Remove one unit of an item id
    pub fn remove_item(&mut self, item_id: &str) -> RemoveReport {
        self.remove_items(item_id, 1)
    }

    /// Remove `count` units of an item id, draining slots in index order.
    /// Nothing changes unless the whole amount is available.
    pub fn remove_items(&mut self, item_id: &str, count: u32) -> RemoveReport {
        if item_id.is_empty() {
            return self.finish_remove(RemoveReport::failed(RemoveItemResult::InvalidItemId, item_id, count));
        }
        if count == 0 {
            return self.finish_remove(RemoveReport::failed(RemoveItemResult::InvalidCount, item_id, count));
        }

        let available = self.cache.total(item_id);
        if available == 0 {
            log::debug!("{}: remove of unknown '{}'", self.id, item_id);
            return self.finish_remove(RemoveReport::failed(RemoveItemResult::ItemNotFound, item_id, count));
        }
        if available < u64::from(count) {
            log::debug!(
                "{}: cannot remove {} '{}', only {} held",
                self.id,
                count,
                item_id,
                available
            );
            return self.finish_remove(RemoveReport::failed(
                RemoveItemResult::InsufficientQuantity,
                item_id,
                count,
            ));
        }

        // Plan against slot contents before touching anything
        let mut plan: Vec<(usize, u32)> = Vec::new();
        let mut planned = 0u32;
        for &index in self.cache.slots_for_id(item_id).into_iter().flatten() {
            if planned == count {
                break;
            }
            let take = self.slots[index].count().min(count - planned);
            if take > 0 {
                plan.push((index, take));
                planned += take;
            }
        }
        if planned < count {
            log::warn!(
                "{}: cached total of '{}' exceeds slot contents, {} of {} found",
                self.id,
                item_id,
                planned,
                count
            );
            return self.finish_remove(RemoveReport::failed(
                RemoveItemResult::InsufficientQuantity,
                item_id,
                count,
            ));
        }

        let mut delta = CacheDelta::new();
        let mut affected = Vec::with_capacity(plan.len());
        let mut last_removed: Option<Item> = None;
        for (index, take) in plan {
            let held = self.slots[index].count();
            if let Some(cleared) = self.change_slot_count(index, held - take, &mut delta) {
                self.release_uid(&cleared);
                last_removed = Some(cleared);
            }
            affected.push(index);
        }
        self.commit(delta, last_removed.as_ref());

        self.finish_remove(RemoveReport {
            result: RemoveItemResult::Success,
            item_id: item_id.to_string(),
            requested: count,
            removed: planned,
            affected_slots: affected,
        })
    }

    /// Remove `count` units from one slot. With `expected_id`, the slot
    /// must hold that item id.
    pub fn remove_item_at_index(
        &mut self,
        index: usize,
        count: u32,
        expected_id: Option<&str>,
    ) -> RemoveReport {
        let requested_id = expected_id.unwrap_or_default();
        let Some(slot) = self.slots.get(index) else {
            return self.finish_remove(RemoveReport::failed(
                RemoveItemResult::SlotNotFound,
                requested_id,
                count,
            ));
        };
        let Some(held) = slot.item() else {
            return self.finish_remove(RemoveReport::failed(
                RemoveItemResult::ItemNotFound,
                requested_id,
                count,
            ));
        };
        let item_id = held.id.clone();
        let held_count = held.count;

        if expected_id.map_or(false, |expected| expected != item_id) {
            log::debug!(
                "{}: slot {} holds '{}', not '{}'",
                self.id,
                index,
                item_id,
                requested_id
            );
            return self.finish_remove(RemoveReport::failed(
                RemoveItemResult::InvalidItemId,
                requested_id,
                count,
            ));
        }
        if count == 0 {
            return self.finish_remove(RemoveReport::failed(RemoveItemResult::InvalidCount, &item_id, count));
        }
        if held_count < count {
            return self.finish_remove(RemoveReport::failed(
                RemoveItemResult::InsufficientQuantity,
                &item_id,
                count,
            ));
        }

        let mut delta = CacheDelta::new();
        let cleared = self.change_slot_count(index, held_count - count, &mut delta);
        if let Some(item) = &cleared {
            self.release_uid(item);
        }
        self.commit(delta, cleared.as_ref());

        self.finish_remove(RemoveReport {
            result: RemoveItemResult::Success,
            item_id,
            requested: count,
            removed: count,
            affected_slots: vec![index],
        })
    }

    /// Drop the directory entry of an item that left the container for good
    fn release_uid(&self, item: &Item) {
        if let Some(uid) = item.uid() {
            self.directory.release(uid);
        }
    }

    fn finish_remove(&mut self, report: RemoveReport) -> RemoveReport {
        if self.observers.is_empty() {
            return report;
        }
        let event = RemoveEvent {
            container: self.id,
            item_id: report.item_id.clone(),
            requested: report.requested,
            actual: report.removed,
            result: report.result,
            affected_slots: report.affected_slots.clone(),
        };
        self.emit(|o| o.on_remove_result(&event));
        report
    }
}

#[cfg(test)]
mod tests {
    use crate::container::Container;
    use crate::directory::{InMemoryDirectory, MetadataDirectory};
    use crate::item::{Item, MetadataBinding};
    use crate::result::RemoveItemResult;
    use std::sync::Arc;

    fn stocked() -> (Arc<InMemoryDirectory>, Container) {
        let dir = InMemoryDirectory::shared();
        let mut c = Container::new("bag", "Bag", None).with_directory(dir.clone());
        let arrow = Item::new("arrow", "Arrow").with_max_stack(10);
        c.add_items(&arrow, 25);
        (dir, c)
    }

    #[test]
    fn test_remove_drains_in_slot_order() {
        let (dir, mut c) = stocked();
        let first_uid = c.slot(0).unwrap().item().unwrap().uid().unwrap();

        let report = c.remove_items("arrow", 12);
        assert!(report.is_success());
        assert_eq!(report.removed, 12);
        assert_eq!(report.affected_slots, vec![0, 1]);
        assert!(!c.slot(0).unwrap().is_occupied());
        assert_eq!(c.slot(1).unwrap().count(), 8);
        assert_eq!(c.total_count("arrow"), 13);
        assert!(!dir.contains(first_uid));
        assert!(c.validate_cache());
    }

    #[test]
    fn test_remove_failures_leave_state_untouched() {
        let (_, mut c) = stocked();

        assert_eq!(c.remove_items("arrow", 30).result, RemoveItemResult::InsufficientQuantity);
        assert_eq!(c.total_count("arrow"), 25);
        assert_eq!(c.remove_items("ghost", 1).result, RemoveItemResult::ItemNotFound);
        assert_eq!(c.remove_items("", 1).result, RemoveItemResult::InvalidItemId);
        assert_eq!(c.remove_items("arrow", 0).result, RemoveItemResult::InvalidCount);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_remove_plans_against_slot_contents() {
        let (_, mut c) = stocked();
        // Slot 0 drifts below what the cache believes
        c.slots[0].set_count(4);

        let report = c.remove_items("arrow", 20);
        assert_eq!(report.result, RemoveItemResult::InsufficientQuantity);
        assert_eq!(report.removed, 0);
        assert_eq!(c.slot(0).unwrap().count(), 4);
        assert_eq!(c.slot(1).unwrap().count(), 10);
        assert_eq!(c.slot(2).unwrap().count(), 5);
        assert_eq!(c.total_count("arrow"), 25);
    }

    #[test]
    fn test_remove_at_index() {
        let (_, mut c) = stocked();

        assert_eq!(
            c.remove_item_at_index(9, 1, None).result,
            RemoveItemResult::SlotNotFound
        );
        assert_eq!(
            c.remove_item_at_index(2, 1, Some("apple")).result,
            RemoveItemResult::InvalidItemId
        );
        assert_eq!(
            c.remove_item_at_index(2, 6, Some("arrow")).result,
            RemoveItemResult::InsufficientQuantity
        );

        let report = c.remove_item_at_index(2, 5, Some("arrow"));
        assert!(report.is_success());
        assert!(!c.slot(2).unwrap().is_occupied());
        assert_eq!(
            c.remove_item_at_index(2, 1, None).result,
            RemoveItemResult::ItemNotFound
        );
        assert_eq!(c.total_count("arrow"), 20);
        assert!(c.validate_cache());
    }

    #[test]
    fn test_remove_frees_room_in_full_container() {
        let mut c = Container::new("pouch", "Pouch", Some(1)).with_directory(InMemoryDirectory::shared());
        c.add_items(&Item::new("gem", "Gem").with_max_stack(5), 5);
        assert!(c.is_full());

        c.remove_item("gem");
        assert!(!c.is_full());
    }
}
