//! Add pipeline
//!
//! validate -> stack onto compatible stacks -> targeted slot or empty slots
//! -> append new slots -> apply one cache delta -> notify.

use super::Container;
use crate::actor::CancellationToken;
use crate::cache::CacheDelta;
use crate::error::FactoryError;
use crate::events::AddEvent;
use crate::factory::ItemTemplate;
use crate::item::{can_stack, Item, MetadataBinding};
use crate::result::{AddItemResult, AddReport};
use std::collections::HashSet;

/// Working state of one add call
struct Placement<'a> {
    item: Item,
    remaining: u32,
    delta: CacheDelta,
    affected: Vec<usize>,
    touched: HashSet<usize>,
    /// The incoming unique id may be stored as is
    owns_uid: bool,
    /// The incoming unique id now lives in a slot
    uid_placed: bool,
    cancel: Option<&'a CancellationToken>,
    cancelled: bool,
}

impl<'a> Placement<'a> {
    fn new(item: Item, count: u32, owns_uid: bool, cancel: Option<&'a CancellationToken>) -> Self {
        Self {
            item,
            remaining: count,
            delta: CacheDelta::new(),
            affected: Vec::new(),
            touched: HashSet::new(),
            owns_uid,
            uid_placed: false,
            cancel,
            cancelled: false,
        }
    }

    /// Checked at every candidate loop boundary
    fn should_stop(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        if self.cancel.map_or(false, CancellationToken::is_cancelled) {
            self.cancelled = true;
            return true;
        }
        false
    }

    fn touch(&mut self, index: usize) {
        if self.touched.insert(index) {
            self.affected.push(index);
        }
    }
}

/// Outcome of offering one empty slot to an add
enum SlotOffer {
    Filled,
    /// The slot's condition turned the item away
    Rejected,
    /// Cached as empty but holds an item, or gone
    Stale,
}

impl Container {
    /// Add `item.count` units of an item
    pub fn add_item(&mut self, item: &Item) -> AddReport {
        self.add_items(item, item.count)
    }

    /// Add `count` units of an item using the configured stacking policy
    pub fn add_items(&mut self, item: &Item, count: u32) -> AddReport {
        let auto_stack = self.config.auto_stack;
        self.run_add(item, count, None, auto_stack, false, None)
    }

    /// Add `count` units into one specific slot
    pub fn add_items_to_slot(&mut self, item: &Item, count: u32, slot_index: usize) -> AddReport {
        let auto_stack = self.config.auto_stack;
        self.run_add(item, count, Some(slot_index), auto_stack, false, None)
    }

    /// Add with every pipeline option explicit
    pub fn add_items_with(
        &mut self,
        item: &Item,
        count: u32,
        target_slot: Option<usize>,
        auto_stack: bool,
    ) -> AddReport {
        self.run_add(item, count, target_slot, auto_stack, false, None)
    }

    /// Add that stops at the next candidate boundary once `token` fires.
    /// Progress made before that point is kept.
    pub fn add_items_cancellable(
        &mut self,
        item: &Item,
        count: u32,
        target_slot: Option<usize>,
        auto_stack: bool,
        token: &CancellationToken,
    ) -> AddReport {
        self.run_add(item, count, target_slot, auto_stack, false, Some(token))
    }

    /// Add for a cross-container move: the item's unique id travels with
    /// it instead of being treated as owned by another container
    pub(super) fn add_transferred(
        &mut self,
        item: &Item,
        count: u32,
        target_slot: Option<usize>,
        auto_stack: bool,
    ) -> AddReport {
        self.run_add(item, count, target_slot, auto_stack, true, None)
    }

    /// Instantiate a registered template through the factory and add it
    pub fn add_template(&mut self, template_id: &str, count: u32) -> AddReport {
        let Some(factory) = self.factory.clone() else {
            log::debug!("{}: no factory for template '{}'", self.id, template_id);
            return self.finish_add(None, AddReport::failed(AddItemResult::FactoryNotAvailable, count));
        };
        match factory.create(template_id) {
            Ok(item) => self.add_items(&item, count),
            Err(FactoryError::TemplateNotFound(_)) => {
                log::debug!("{}: unknown template '{}'", self.id, template_id);
                self.finish_add(None, AddReport::failed(AddItemResult::ItemNotFound, count))
            }
            Err(err) => {
                log::debug!("{}: factory failed for '{}': {}", self.id, template_id, err);
                self.finish_add(None, AddReport::failed(AddItemResult::FactoryCreateFailed, count))
            }
        }
    }

    /// Instantiate raw template data through the factory and add it
    pub fn add_template_data(&mut self, template: &ItemTemplate, count: u32) -> AddReport {
        let Some(factory) = self.factory.clone() else {
            log::debug!("{}: no factory for template data '{}'", self.id, template.id);
            return self.finish_add(None, AddReport::failed(AddItemResult::FactoryNotAvailable, count));
        };
        match factory.create_from_template(template) {
            Ok(item) => self.add_items(&item, count),
            Err(err) => {
                log::debug!("{}: factory rejected template data: {}", self.id, err);
                self.finish_add(None, AddReport::failed(AddItemResult::FactoryCreateFailed, count))
            }
        }
    }

    /// Add several items inside one batch region
    pub fn add_items_batch(&mut self, entries: &[(Item, u32)]) -> Vec<AddReport> {
        self.batched(|container| {
            entries
                .iter()
                .map(|(item, count)| container.add_items(item, *count))
                .collect()
        })
    }

    /// Shared add pipeline. A unique id that was already bound before this
    /// call is only stored as is for a transfer; a plain add of a bound item
    /// stores fresh ids so no two containers share one.
    fn run_add(
        &mut self,
        item: &Item,
        count: u32,
        target_slot: Option<usize>,
        auto_stack: bool,
        transfer: bool,
        cancel: Option<&CancellationToken>,
    ) -> AddReport {
        if item.is_null() {
            log::debug!("{}: rejected add of a null item", self.id);
            return self.finish_add(None, AddReport::failed(AddItemResult::ItemIsNull, count));
        }
        if count == 0 {
            log::debug!("{}: rejected add of zero '{}'", self.id, item.id);
            return self.finish_add(Some(item.clone()), AddReport::failed(AddItemResult::InvalidCount, 0));
        }

        let mut incoming = item.clone();
        let freshly_bound = incoming.uid().is_none();
        let uid = incoming.ensure_uid(self.directory.as_ref());

        if !self.conditions.iter().all(|c| c.check(&incoming)) {
            log::debug!("{}: '{}' rejected by admission conditions", self.id, incoming.id);
            if freshly_bound {
                self.directory.release(uid);
            }
            return self.finish_add(
                Some(incoming),
                AddReport::failed(AddItemResult::ItemConditionNotMet, count),
            );
        }

        let mut placement = Placement::new(incoming, count, freshly_bound || transfer, cancel);
        if target_slot.is_none() && auto_stack {
            self.stack_phase(&mut placement);
        }

        let mut slot_rejected = false;
        match target_slot {
            Some(index) => {
                if placement.remaining > 0 {
                    slot_rejected = !self.target_phase(index, &mut placement);
                }
            }
            None => self.empty_slot_phase(&mut placement),
        }

        let Placement {
            item: incoming,
            remaining,
            delta,
            affected,
            uid_placed,
            cancelled,
            ..
        } = placement;
        self.commit(delta, Some(&incoming));
        if freshly_bound && !uid_placed {
            self.directory.release(uid);
        }

        let result = if cancelled {
            AddItemResult::Cancelled
        } else if slot_rejected {
            AddItemResult::NoSuitableSlotFound
        } else if remaining == 0 {
            AddItemResult::Success
        } else {
            AddItemResult::ContainerIsFull
        };
        if remaining > 0 {
            log::debug!(
                "{}: {:?} adding '{}', {} of {} did not fit",
                self.id,
                result,
                incoming.id,
                remaining,
                count
            );
        }

        let report = AddReport {
            result,
            requested: count,
            added: count - remaining,
            exceeded: remaining,
            affected_slots: affected,
        };
        self.finish_add(Some(incoming), report)
    }

    /// Fill existing compatible stacks
    fn stack_phase(&mut self, placement: &mut Placement<'_>) {
        if !placement.item.stackable {
            return;
        }
        let Some(indices) = self.cache.slots_for_id(&placement.item.id) else {
            return;
        };

        let directory = self.directory.as_ref();
        let mut candidates: Vec<(usize, u32)> = indices
            .iter()
            .filter_map(|&index| {
                let existing = self.slots.get(index)?.item()?;
                let space = existing.remaining_space();
                (space > 0 && can_stack(existing, &placement.item, directory)).then_some((index, space))
            })
            .collect();

        // Many partial stacks: fill the roomiest first. Stable, so ties keep index order.
        if candidates.len() > self.config.stack_sort_threshold {
            candidates.sort_by(|a, b| b.1.cmp(&a.1));
        }

        for (index, space) in candidates {
            if placement.should_stop() {
                break;
            }
            let put = space.min(placement.remaining);
            let current = self.slots[index].count();
            self.change_slot_count(index, current + put, &mut placement.delta);
            placement.remaining -= put;
            placement.touch(index);
        }
    }

    /// Place or stack solely into one slot. Returns false when the slot
    /// cannot take this item at all.
    fn target_phase(&mut self, index: usize, placement: &mut Placement<'_>) -> bool {
        if !self.ensure_slot(index, &mut placement.delta) {
            log::debug!("{}: target slot {} is beyond capacity", self.id, index);
            return false;
        }
        if placement.should_stop() {
            return true;
        }

        match self.slots[index].item() {
            None => {
                if !self.slots[index].accepts(&placement.item) {
                    log::debug!("{}: slot {} rejects '{}'", self.id, index, placement.item.id);
                    return false;
                }
                self.fill_empty(index, placement);
                true
            }
            Some(existing) => {
                if !can_stack(existing, &placement.item, self.directory.as_ref()) {
                    log::debug!(
                        "{}: slot {} holds incompatible '{}'",
                        self.id,
                        index,
                        existing.id
                    );
                    return false;
                }
                let put = existing.remaining_space().min(placement.remaining);
                let current = existing.count;
                if put > 0 {
                    self.change_slot_count(index, current + put, &mut placement.delta);
                    placement.remaining -= put;
                    placement.touch(index);
                }
                true
            }
        }
    }

    /// Cached empty slots first; if any of them turns out occupied, scan
    /// every slot not yet checked; finally append new slots.
    fn empty_slot_phase(&mut self, placement: &mut Placement<'_>) {
        let cached: Vec<usize> = self.cache.empty_slots().iter().copied().collect();
        let mut checked = HashSet::with_capacity(cached.len());
        let mut stale = false;

        for index in cached {
            if placement.should_stop() {
                break;
            }
            checked.insert(index);
            match self.try_fill_empty(index, placement) {
                SlotOffer::Filled => {}
                SlotOffer::Rejected => {
                    log::debug!("{}: slot {} rejects '{}'", self.id, index, placement.item.id);
                }
                SlotOffer::Stale => stale = true,
            }
        }

        if stale && !placement.should_stop() {
            log::warn!(
                "{}: cached empty slot is occupied, scanning all slots for '{}'",
                self.id,
                placement.item.id
            );
            for index in 0..self.slots.len() {
                if placement.should_stop() {
                    break;
                }
                if !checked.contains(&index) {
                    self.try_fill_empty(index, placement);
                }
            }
        }

        while !placement.should_stop() {
            let Some(index) = self.append_slot(&mut placement.delta) else {
                break;
            };
            self.try_fill_empty(index, placement);
        }
    }

    fn try_fill_empty(&mut self, index: usize, placement: &mut Placement<'_>) -> SlotOffer {
        match self.slots.get(index) {
            Some(slot) if !slot.is_occupied() => {
                if !slot.accepts(&placement.item) {
                    return SlotOffer::Rejected;
                }
                self.fill_empty(index, placement);
                SlotOffer::Filled
            }
            _ => SlotOffer::Stale,
        }
    }

    fn fill_empty(&mut self, index: usize, placement: &mut Placement<'_>) {
        let put = placement.remaining.min(placement.item.stack_limit());
        let item = self.placement_item(placement, put);
        self.place_in_slot(index, item, &mut placement.delta);
        placement.remaining -= put;
        placement.touch(index);
    }

    /// The first new stack keeps the incoming unique id when the add owns it
    /// and no slot already carries it; every other stack gets a fresh one.
    fn placement_item(&self, placement: &mut Placement<'_>, count: u32) -> Item {
        if placement.owns_uid && !placement.uid_placed {
            if let Some(uid) = placement.item.uid() {
                if !self.holds_uid(&placement.item.id, uid) {
                    placement.uid_placed = true;
                    return placement.item.clone().with_count(count);
                }
            }
        }
        self.fresh_copy(&placement.item, count)
    }

    /// Fire the add notification(s) for a finished call. A partial add
    /// fires a success for the stored part and a full event for the rest.
    fn finish_add(&mut self, item: Option<Item>, report: AddReport) -> AddReport {
        if self.observers.is_empty() {
            return report;
        }

        if report.result == AddItemResult::ContainerIsFull && report.added > 0 {
            let accepted = AddEvent {
                container: self.id,
                item: item.clone(),
                requested: report.requested,
                actual: report.added,
                result: AddItemResult::Success,
                affected_slots: report.affected_slots.clone(),
            };
            self.emit(|o| o.on_add_result(&accepted));

            let overflow = AddEvent {
                container: self.id,
                item,
                requested: report.requested,
                actual: report.exceeded,
                result: AddItemResult::ContainerIsFull,
                affected_slots: Vec::new(),
            };
            self.emit(|o| o.on_add_result(&overflow));
        } else {
            let event = AddEvent {
                container: self.id,
                item,
                requested: report.requested,
                actual: report.added,
                result: report.result,
                affected_slots: report.affected_slots.clone(),
            };
            self.emit(|o| o.on_add_result(&event));
        }
        report
    }
}
