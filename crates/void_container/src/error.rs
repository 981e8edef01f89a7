//! Error types for failures outside the result-code pipelines

use thiserror::Error;

/// Shape construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Angle is not a multiple of 90 degrees
    #[error("Invalid rotation angle: {0} degrees")]
    InvalidRotation(i32),
    /// Shape has no cells
    #[error("Shape must contain at least one cell")]
    Empty,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed JSON
    #[error("Failed to parse container config: {0}")]
    Parse(#[from] serde_json::Error),
    /// Parsed but inconsistent
    #[error("Invalid container config: {0}")]
    Invalid(String),
}

/// Item factory errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// No template registered under this id
    #[error("Item template not found: {0}")]
    TemplateNotFound(String),
    /// Template data cannot produce an item
    #[error("Invalid item template '{id}': {reason}")]
    InvalidTemplate { id: String, reason: String },
    /// Template file could not be parsed
    #[error("Failed to parse item templates: {0}")]
    Parse(String),
}

/// Split errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// Index outside the slot sequence
    #[error("Slot not found: {0}")]
    SlotNotFound(usize),
    /// Slot holds nothing
    #[error("Slot {0} is empty")]
    SlotEmpty(usize),
    /// Count is zero or exceeds the stack
    #[error("Cannot split {requested} from a stack of {available}")]
    InvalidCount { requested: u32, available: u32 },
}

/// Container worker errors
#[derive(Debug, Error)]
pub enum ActorError {
    /// Worker thread has exited or dropped the reply
    #[error("Container worker is not running")]
    Disconnected,
    /// Worker thread panicked
    #[error("Container worker panicked")]
    Panicked,
    /// Worker thread could not be spawned
    #[error("Failed to spawn container worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Direct slot assignment errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Index outside the slot sequence and beyond capacity
    #[error("Slot not found: {0}")]
    NotFound(usize),
    /// Null item or a stack of zero units
    #[error("Cannot place an empty or null item into slot {0}")]
    InvalidItem(usize),
}
