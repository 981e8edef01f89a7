//! Template-based item factory

use crate::directory::MetadataDirectory;
use crate::error::FactoryError;
use crate::item::{Item, MetadataBinding, Metadata};
use crate::shape::ItemShape;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Static item definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Template identity
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Type tag
    #[serde(default)]
    pub item_type: String,
    /// Weight per unit
    #[serde(default)]
    pub weight: f32,
    /// Maximum stack size (0 = unbounded)
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    /// Whether units can share a slot
    #[serde(default = "default_stackable")]
    pub stackable: bool,
    /// Grid cells, for multi-cell items
    #[serde(default)]
    pub shape: Option<Vec<(i32, i32)>>,
    /// Initial runtime metadata of created items
    #[serde(default)]
    pub metadata: Metadata,
    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,
    /// Category path
    #[serde(default)]
    pub category: Option<String>,
}

fn default_max_stack() -> u32 {
    99
}

fn default_stackable() -> bool {
    true
}

impl ItemTemplate {
    /// Create a new template
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type: String::new(),
            weight: 0.0,
            max_stack: default_max_stack(),
            stackable: true,
            shape: None,
            metadata: Metadata::new(),
            tags: Vec::new(),
            category: None,
        }
    }

    /// Set type tag
    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    /// Set weight
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Set max stack size
    pub fn with_max_stack(mut self, max: u32) -> Self {
        self.max_stack = max;
        self
    }

    /// Make non-stackable
    pub fn non_stackable(mut self) -> Self {
        self.stackable = false;
        self
    }

    /// Set grid cells
    pub fn with_shape(mut self, cells: Vec<(i32, i32)>) -> Self {
        self.shape = Some(cells);
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set category path
    pub fn with_category(mut self, path: impl Into<String>) -> Self {
        self.category = Some(path.into());
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> FactoryError {
        FactoryError::InvalidTemplate {
            id: self.id.clone(),
            reason: reason.into(),
        }
    }

    /// Instantiate a single unbound unit
    pub fn instantiate(&self) -> Result<Item, FactoryError> {
        if self.id.is_empty() {
            return Err(self.invalid("empty id"));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(self.invalid(format!("weight {} is not a non-negative number", self.weight)));
        }

        let mut item = Item::new(self.id.clone(), self.name.clone())
            .with_type(self.item_type.clone())
            .with_weight(self.weight)
            .with_max_stack(self.max_stack);
        if !self.stackable {
            item = item.non_stackable();
        }
        if let Some(cells) = &self.shape {
            let shape = ItemShape::new(cells.clone()).map_err(|e| self.invalid(e.to_string()))?;
            item = item.with_shape(shape);
        }
        for (key, value) in &self.metadata {
            item = item.with_metadata(key.clone(), value.clone());
        }
        Ok(item)
    }
}

/// Creates items from templates
pub trait ItemFactory: Send + Sync {
    /// Instantiate a registered template
    fn create(&self, template_id: &str) -> Result<Item, FactoryError>;

    /// Instantiate raw template data
    fn create_from_template(&self, template: &ItemTemplate) -> Result<Item, FactoryError>;

    /// Independent copy of an item with a new count and a fresh unique id.
    ///
    /// `directory` is the one the item is bound in. Metadata is read from it
    /// and the fresh uid is minted there, never in a directory of the
    /// factory's own.
    fn clone_with_count(&self, item: &Item, count: u32, directory: &dyn MetadataDirectory) -> Item;
}

/// Factory over an in-memory template registry
pub struct TemplateFactory {
    templates: RwLock<HashMap<String, ItemTemplate>>,
    directory: Arc<dyn MetadataDirectory>,
}

impl TemplateFactory {
    /// Create an empty factory bound to a directory
    pub fn new(directory: Arc<dyn MetadataDirectory>) -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            directory,
        }
    }

    /// Register a template, publishing its tags and category to the directory
    pub fn register(&self, template: ItemTemplate) -> Result<(), FactoryError> {
        template.instantiate()?;
        if !template.tags.is_empty() {
            self.directory.set_tags(&template.id, template.tags.clone());
        }
        if let Some(category) = &template.category {
            self.directory.set_category(&template.id, category);
        }
        self.templates.write().insert(template.id.clone(), template);
        Ok(())
    }

    /// Register every template in a JSON array. Returns the number registered.
    pub fn load_json(&self, json: &str) -> Result<usize, FactoryError> {
        let templates: Vec<ItemTemplate> =
            serde_json::from_str(json).map_err(|e| FactoryError::Parse(e.to_string()))?;
        let count = templates.len();
        for template in templates {
            self.register(template)?;
        }
        log::debug!("Loaded {} item templates", count);
        Ok(count)
    }

    /// Registered template
    pub fn template(&self, template_id: &str) -> Option<ItemTemplate> {
        self.templates.read().get(template_id).cloned()
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    /// Whether no templates are registered
    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

impl ItemFactory for TemplateFactory {
    fn create(&self, template_id: &str) -> Result<Item, FactoryError> {
        let templates = self.templates.read();
        let template = templates
            .get(template_id)
            .ok_or_else(|| FactoryError::TemplateNotFound(template_id.to_string()))?;
        template.instantiate()
    }

    fn create_from_template(&self, template: &ItemTemplate) -> Result<Item, FactoryError> {
        template.instantiate()
    }

    fn clone_with_count(&self, item: &Item, count: u32, directory: &dyn MetadataDirectory) -> Item {
        let mut copy = item.duplicate(directory).with_count(count);
        copy.ensure_uid(directory);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::item::MetadataValue;

    fn factory() -> (Arc<InMemoryDirectory>, TemplateFactory) {
        let dir = InMemoryDirectory::shared();
        let factory = TemplateFactory::new(dir.clone());
        (dir, factory)
    }

    #[test]
    fn test_create_registered() {
        let (dir, factory) = factory();
        factory
            .register(
                ItemTemplate::new("arrow", "Arrow")
                    .with_type("Ammo")
                    .with_max_stack(50)
                    .with_tag("ranged")
                    .with_category("Ammo/Arrow"),
            )
            .unwrap();

        let arrow = factory.create("arrow").unwrap();
        assert_eq!(arrow.max_stack, 50);
        assert_eq!(arrow.count, 1);
        assert!(arrow.uid().is_none());
        assert!(dir.has_tag("arrow", "ranged"));
        assert_eq!(dir.category("arrow").as_deref(), Some("Ammo/Arrow"));

        assert_eq!(
            factory.create("bolt"),
            Err(FactoryError::TemplateNotFound("bolt".into()))
        );
    }

    #[test]
    fn test_invalid_template() {
        let (_, factory) = factory();
        let bad = ItemTemplate::new("rock", "Rock").with_weight(-1.0);
        assert!(matches!(
            factory.create_from_template(&bad),
            Err(FactoryError::InvalidTemplate { .. })
        ));
        assert!(factory.register(bad).is_err());
        assert!(factory.is_empty());
    }

    #[test]
    fn test_load_json() {
        let (_, factory) = factory();
        let json = r#"[
            { "id": "potion", "name": "Potion", "max_stack": 10,
              "metadata": { "heal": { "Int": 25 } } },
            { "id": "crate", "name": "Crate", "stackable": false, "shape": [[0, 0], [1, 0]] }
        ]"#;
        assert_eq!(factory.load_json(json).unwrap(), 2);

        let potion = factory.create("potion").unwrap();
        assert_eq!(potion.local_metadata().unwrap()["heal"], MetadataValue::Int(25));

        let crate_item = factory.create("crate").unwrap();
        assert!(!crate_item.stackable);
        assert_eq!(crate_item.shape().unwrap().cell_count(), 2);

        assert!(matches!(factory.load_json("not json"), Err(FactoryError::Parse(_))));
    }

    #[test]
    fn test_clone_with_count_assigns_fresh_uid() {
        let (dir, factory) = factory();
        let mut original = Item::new("gem", "Gem").with_count(10).with_metadata("cut", "oval");
        let original_uid = original.ensure_uid(dir.as_ref());

        let copy = factory.clone_with_count(&original, 4, dir.as_ref());
        assert_eq!(copy.count, 4);
        assert_ne!(copy.uid(), Some(original_uid));
        assert_eq!(
            copy.metadata_value(dir.as_ref(), "cut"),
            Some(MetadataValue::String("oval".into()))
        );
    }

    #[test]
    fn test_clone_with_count_mints_in_item_directory() {
        let (factory_dir, factory) = factory();
        let item_dir = InMemoryDirectory::new();
        let mut original = Item::new("gem", "Gem").with_count(10).with_metadata("cut", "oval");
        let original_uid = original.ensure_uid(&item_dir);

        let copy = factory.clone_with_count(&original, 4, &item_dir);
        let copy_uid = copy.uid().unwrap();
        assert_ne!(copy_uid, original_uid);
        assert!(item_dir.contains(copy_uid));
        assert!(!factory_dir.contains(copy_uid));
        assert_eq!(
            copy.metadata_value(&item_dir, "cut"),
            Some(MetadataValue::String("oval".into()))
        );
    }
}
