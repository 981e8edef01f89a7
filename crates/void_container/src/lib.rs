//! Void Container - Slot-based item storage
//!
//! This crate provides in-memory item containers: an ordered sequence of
//! slots, each holding at most one stack, with derived indices kept
//! consistent across every add, remove, move and split.
//!
//! # Features
//!
//! - Bounded or unbounded containers with lazily created slots
//! - Greedy stacking onto existing compatible stacks
//! - All-or-nothing removal
//! - Same-container and cross-container moves
//! - Observer notifications with batched total-count updates
//! - Template-driven item creation
//! - Single-writer worker for large operations
//!
//! # Example
//!
//! ```ignore
//! use void_container::prelude::*;
//!
//! let arrow = Item::new("arrow", "Arrow").with_type("Ammo").with_max_stack(99);
//!
//! let mut quiver = Container::new("quiver", "Quiver", Some(4));
//! let report = quiver.add_items(&arrow, 120);
//! assert!(report.is_success());
//! assert_eq!(quiver.total_count("arrow"), 120);
//! ```

pub mod actor;
pub mod cache;
pub mod condition;
pub mod config;
pub mod container;
pub mod directory;
pub mod error;
pub mod events;
pub mod factory;
pub mod item;
pub mod query;
pub mod result;
pub mod shape;
pub mod slot;

pub mod prelude {
    pub use crate::actor::{AddTask, CancellationToken, ContainerHandle};
    pub use crate::condition::{
        AllConditions, AnyCondition, AttributeCondition, ItemCondition, ItemTypeCondition,
        MaxWeightCondition, NotCondition,
    };
    pub use crate::config::ContainerConfig;
    pub use crate::container::Container;
    pub use crate::directory::{InMemoryDirectory, MetadataDirectory};
    pub use crate::error::{ActorError, ConfigError, FactoryError, ShapeError, SlotError, SplitError};
    pub use crate::events::{
        AddEvent, ChannelObserver, ContainerEvent, ContainerObserver, ObserverId, RemoveEvent,
        SlotQuantityEvent, TotalCountEvent,
    };
    pub use crate::factory::{ItemFactory, ItemTemplate, TemplateFactory};
    pub use crate::item::{can_stack, Item, ItemKind, Metadata, MetadataBinding, MetadataValue, Uid};
    pub use crate::query::ContainerQuery;
    pub use crate::result::{AddItemResult, AddReport, MoveItemResult, RemoveItemResult, RemoveReport};
    pub use crate::shape::{ItemShape, Rotation};
    pub use crate::slot::{ContainerId, Slot};
}

pub use prelude::*;
