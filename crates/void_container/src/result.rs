//! Result codes for container operations
//!
//! Every domain-expected outcome is reported through these codes; none of
//! the pipelines panic or return `Err` for them.

use serde::{Deserialize, Serialize};

/// Outcome of an add
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddItemResult {
    /// Every requested unit was stored
    Success,
    /// Item has no template identity
    ItemIsNull,
    /// Requested count was zero
    InvalidCount,
    /// Only part (possibly none) of the request fit
    ContainerIsFull,
    /// An admission predicate rejected the item
    ItemConditionNotMet,
    /// The requested slot cannot take the item
    NoSuitableSlotFound,
    /// Template add on a container without a factory
    FactoryNotAvailable,
    /// Factory rejected the template data
    FactoryCreateFailed,
    /// Unknown template id
    ItemNotFound,
    /// Cancellation token fired; committed progress is kept
    Cancelled,
}

/// Outcome of a remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoveItemResult {
    Success,
    /// Empty id, or a slot holding a different id than expected
    InvalidItemId,
    /// Nothing of this id is held
    ItemNotFound,
    /// Less is held than requested; nothing was removed
    InsufficientQuantity,
    /// Requested count was zero
    InvalidCount,
    /// Index outside the slot sequence
    SlotNotFound,
}

/// Outcome of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveItemResult {
    Success,
    /// Part of the stack moved; the rest stayed in the source slot
    PartialSuccess,
    SourceSlotNotFound,
    SourceSlotEmpty,
    TargetSlotNotFound,
    /// Source and target are the same slot
    SameSlot,
    /// A slot admission check rejected the item
    ItemConditionNotMet,
    /// Nothing moved and the target container is full
    TargetContainerFull,
    Failed,
}

/// Report returned by the add pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddReport {
    pub result: AddItemResult,
    /// Units requested
    pub requested: u32,
    /// Units actually stored
    pub added: u32,
    /// Units that did not fit
    pub exceeded: u32,
    /// Slots touched, in the order they were touched
    pub affected_slots: Vec<usize>,
}

impl AddReport {
    pub(crate) fn failed(result: AddItemResult, requested: u32) -> Self {
        Self {
            result,
            requested,
            added: 0,
            exceeded: 0,
            affected_slots: Vec::new(),
        }
    }

    /// Every requested unit was stored
    pub fn is_success(&self) -> bool {
        self.result == AddItemResult::Success
    }
}

/// Report returned by the remove pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    pub result: RemoveItemResult,
    pub item_id: String,
    pub requested: u32,
    pub removed: u32,
    pub affected_slots: Vec<usize>,
}

impl RemoveReport {
    pub(crate) fn failed(result: RemoveItemResult, item_id: &str, requested: u32) -> Self {
        Self {
            result,
            item_id: item_id.to_string(),
            requested,
            removed: 0,
            affected_slots: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == RemoveItemResult::Success
    }
}
