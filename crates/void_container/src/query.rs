//! Read-only queries over a container's slots and indices

use crate::cache::ContainerCache;
use crate::directory::MetadataDirectory;
use crate::item::{Item, MetadataValue};
use crate::slot::Slot;

/// Borrowed view answering lookups from the derived indices where possible
pub struct ContainerQuery<'a> {
    slots: &'a [Slot],
    cache: &'a ContainerCache,
    directory: &'a dyn MetadataDirectory,
}

impl<'a> ContainerQuery<'a> {
    pub fn new(slots: &'a [Slot], cache: &'a ContainerCache, directory: &'a dyn MetadataDirectory) -> Self {
        Self {
            slots,
            cache,
            directory,
        }
    }

    pub fn has_item(&self, item_id: &str) -> bool {
        self.cache.has_id(item_id)
    }

    /// At least `count` units of the id are held
    pub fn has_item_count(&self, item_id: &str, count: u64) -> bool {
        self.cache.total(item_id) >= count
    }

    pub fn total_count(&self, item_id: &str) -> u64 {
        self.cache.total(item_id)
    }

    /// Slots holding the id, ascending
    pub fn find_slot_indices(&self, item_id: &str) -> Vec<usize> {
        self.cache
            .slots_for_id(item_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn first_slot_index(&self, item_id: &str) -> Option<usize> {
        self.cache.slots_for_id(item_id)?.iter().next().copied()
    }

    pub fn items_by_type(&self, item_type: &str) -> Vec<&'a Item> {
        let slots = self.slots;
        self.cache
            .slots_for_type(item_type)
            .map(|set| set.iter().filter_map(|&i| slots.get(i)?.item()).collect())
            .unwrap_or_default()
    }

    /// Items whose runtime metadata maps `key` to `value`
    pub fn items_by_attribute(&self, key: &str, value: &MetadataValue) -> Vec<&'a Item> {
        let directory = self.directory;
        self.items_where(|item| item.metadata_value(directory, key).as_ref() == Some(value))
    }

    pub fn items_by_name(&self, name: &str) -> Vec<&'a Item> {
        self.items_where(|item| item.name == name)
    }

    /// Items whose template id carries `tag` in the directory
    pub fn items_by_tag(&self, tag: &str) -> Vec<&'a Item> {
        let directory = self.directory;
        self.items_where(|item| directory.has_tag(&item.id, tag))
    }

    pub fn items_where(&self, predicate: impl Fn(&Item) -> bool) -> Vec<&'a Item> {
        self.slots
            .iter()
            .filter_map(Slot::item)
            .filter(|item| predicate(item))
            .collect()
    }

    /// Every held stack in slot order
    pub fn all_items(&self) -> Vec<&'a Item> {
        self.slots.iter().filter_map(Slot::item).collect()
    }

    /// Distinct item ids held
    pub fn unique_item_count(&self) -> usize {
        self.cache.unique_count()
    }

    pub fn total_weight(&self) -> f32 {
        self.slots.iter().filter_map(Slot::item).map(Item::total_weight).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.unique_count() == 0
    }

    pub fn occupied_slot_count(&self) -> usize {
        self.slots.len() - self.cache.empty_slots().len()
    }

    /// Empty slots created so far
    pub fn free_slot_count(&self) -> usize {
        self.cache.empty_slots().len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::container::Container;
    use crate::directory::{InMemoryDirectory, MetadataDirectory};
    use crate::item::{Item, MetadataValue};

    fn stocked() -> Container {
        let dir = InMemoryDirectory::shared();
        dir.set_tags("potion", vec!["consumable".into()]);
        let mut c = Container::new("bag", "Bag", Some(8)).with_directory(dir);
        c.add_items(&Item::new("potion", "Health Potion").with_type("Consumable").with_weight(0.5), 3);
        c.add_items(
            &Item::new("ring", "Ring").with_type("Accessory").with_metadata("enchant", 2i64),
            1,
        );
        c.add_items(&Item::new("arrow", "Arrow").with_type("Ammo").with_max_stack(10), 15);
        c
    }

    #[test]
    fn test_index_backed_queries() {
        let c = stocked();
        let q = c.query();

        assert!(q.has_item("arrow"));
        assert!(q.has_item_count("arrow", 15));
        assert!(!q.has_item_count("arrow", 16));
        assert_eq!(q.find_slot_indices("arrow"), vec![2, 3]);
        assert_eq!(q.first_slot_index("ring"), Some(1));
        assert_eq!(q.first_slot_index("ghost"), None);
        assert_eq!(q.items_by_type("Ammo").len(), 2);
        assert_eq!(q.unique_item_count(), 3);
        assert_eq!(q.occupied_slot_count(), 4);
        assert_eq!(q.free_slot_count(), 0);
    }

    #[test]
    fn test_scanning_queries() {
        let c = stocked();
        let q = c.query();

        let enchanted = q.items_by_attribute("enchant", &MetadataValue::Int(2));
        assert_eq!(enchanted.len(), 1);
        assert_eq!(enchanted[0].id, "ring");
        assert_eq!(q.items_by_name("Health Potion").len(), 1);
        assert_eq!(q.items_by_tag("consumable").len(), 1);
        assert_eq!(q.items_where(|i| i.count >= 5).len(), 2);
        assert_eq!(q.all_items().len(), 4);
        assert!((q.total_weight() - 1.5).abs() < f32::EPSILON);
        assert!(!q.is_empty());
    }
}
