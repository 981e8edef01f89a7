//! Container notifications
//!
//! Observers register on a container and receive:
//! - one add result per add call (two when an add only partially fits),
//! - one remove result per remove call,
//! - a slot quantity change for every slot whose count changes,
//! - an item total change once per item id per call, or once per batch.

use crate::item::Item;
use crate::result::{AddItemResult, RemoveItemResult};
use crate::slot::ContainerId;
use crossbeam_channel::{Receiver, Sender};

/// Add result notification
#[derive(Debug, Clone)]
pub struct AddEvent {
    pub container: ContainerId,
    /// The item being added, if one could be produced
    pub item: Option<Item>,
    pub requested: u32,
    /// Units this notification reports on
    pub actual: u32,
    pub result: AddItemResult,
    pub affected_slots: Vec<usize>,
}

/// Remove result notification
#[derive(Debug, Clone)]
pub struct RemoveEvent {
    pub container: ContainerId,
    pub item_id: String,
    pub requested: u32,
    pub actual: u32,
    pub result: RemoveItemResult,
    pub affected_slots: Vec<usize>,
}

/// Slot count change
#[derive(Debug, Clone)]
pub struct SlotQuantityEvent {
    pub container: ContainerId,
    pub slot: usize,
    /// The item in (or last in) the slot
    pub item: Option<Item>,
    pub old_count: u32,
    pub new_count: u32,
}

/// Total count change of an item id
#[derive(Debug, Clone)]
pub struct TotalCountEvent {
    pub container: ContainerId,
    pub item_id: String,
    pub item: Option<Item>,
    pub old_total: u64,
    pub new_total: u64,
}

/// Any container notification
#[derive(Debug, Clone)]
pub enum ContainerEvent {
    Added(AddEvent),
    Removed(RemoveEvent),
    SlotQuantityChanged(SlotQuantityEvent),
    TotalCountChanged(TotalCountEvent),
}

/// Observer registration handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Receives container notifications. All methods default to no-ops.
pub trait ContainerObserver: Send {
    fn on_add_result(&mut self, _event: &AddEvent) {}

    fn on_remove_result(&mut self, _event: &RemoveEvent) {}

    fn on_slot_quantity_changed(&mut self, _event: &SlotQuantityEvent) {}

    fn on_item_total_changed(&mut self, _event: &TotalCountEvent) {}
}

/// Forwards every notification into a channel
pub struct ChannelObserver {
    sender: Sender<ContainerEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<ContainerEvent>) -> Self {
        Self { sender }
    }

    /// Observer plus the receiving end of an unbounded channel
    pub fn unbounded() -> (Self, Receiver<ContainerEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }

    fn forward(&self, event: ContainerEvent) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.sender.send(event);
    }
}

impl ContainerObserver for ChannelObserver {
    fn on_add_result(&mut self, event: &AddEvent) {
        self.forward(ContainerEvent::Added(event.clone()));
    }

    fn on_remove_result(&mut self, event: &RemoveEvent) {
        self.forward(ContainerEvent::Removed(event.clone()));
    }

    fn on_slot_quantity_changed(&mut self, event: &SlotQuantityEvent) {
        self.forward(ContainerEvent::SlotQuantityChanged(event.clone()));
    }

    fn on_item_total_changed(&mut self, event: &TotalCountEvent) {
        self.forward(ContainerEvent::TotalCountChanged(event.clone()));
    }
}
