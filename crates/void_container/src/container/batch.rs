//! Batch regions
//!
//! While a batch is open, total-count notifications are collected per item
//! id and fired once each when the outermost region closes. Slot and
//! add/remove notifications are not deferred.

use super::Container;
use crate::events::TotalCountEvent;
use std::mem;

impl Container {
    /// Open a (possibly nested) batch region
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close a batch region. Closing the outermost region fires one
    /// total-count notification per item id touched inside it.
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            log::warn!("{}: end_batch without matching begin_batch", self.id);
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }

        let pending = mem::take(&mut self.pending_totals);
        log::debug!("{}: flushing {} batched totals", self.id, pending.len());
        for (item_id, total) in pending {
            let item = self.snapshot_for(&item_id, total.item.as_ref());
            let event = TotalCountEvent {
                container: self.id,
                new_total: self.cache.total(&item_id),
                old_total: total.old,
                item_id,
                item,
            };
            self.emit(|o| o.on_item_total_changed(&event));
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    pub fn batch_depth(&self) -> u32 {
        self.batch_depth
    }

    /// Run `f` inside a batch region
    pub fn batched<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }
}
