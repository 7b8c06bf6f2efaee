use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tangle_sat::Identifier;

/// Uniquely identifies an entity within an entity source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&EntityId> for Identifier {
    fn from(id: &EntityId) -> Self {
        Identifier::new(id.as_str())
    }
}

impl From<&Identifier> for EntityId {
    fn from(id: &Identifier) -> Self {
        EntityId::new(id.as_str())
    }
}

/// An immutable record a solve may decide to install: an identifier
/// plus ordered string properties that constraint generators inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    properties: IndexMap<String, String>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }
}

/// Read-only lookup over the universe of entities a resolution may
/// draw from.
pub trait EntitySource {
    /// The entity with the given identifier, if any.
    fn get(&self, id: &EntityId) -> Option<&Entity>;

    /// Every known entity identifier, in source order.
    fn ids(&self) -> Vec<EntityId>;
}

/// An in-memory entity source preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct StaticEntitySource {
    entities: IndexMap<EntityId, Entity>,
}

impl StaticEntitySource {
    pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|entity| (entity.id().clone(), entity))
                .collect(),
        }
    }
}

impl EntitySource for StaticEntitySource {
    fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_lookup_and_listing() {
        let source = StaticEntitySource::new([
            Entity::new("b").with_property("kind", "bundle"),
            Entity::new("a"),
        ]);

        assert_eq!(
            source.get(&"b".into()).and_then(|e| e.property("kind")),
            Some("bundle")
        );
        assert!(source.get(&"missing".into()).is_none());

        // listing preserves insertion order
        assert_eq!(source.ids(), vec![EntityId::from("b"), EntityId::from("a")]);
    }

    #[test]
    fn test_identifier_conversions_round_trip() {
        let entity_id = EntityId::from("pkg.v1");
        let identifier = Identifier::from(&entity_id);
        assert_eq!(EntityId::from(&identifier), entity_id);
    }
}
