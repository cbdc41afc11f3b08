//! # Entity Management
//!
//! An entity is an identity, a blueprint tag, and a keyed bag of components.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentKey, ComponentValue};

/// Stable, domain-assigned identity of an entity (e.g. `"ball-0"`).
///
/// The same identity names the authoritative entity on the server and its
/// projection on every client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An entity and its components.
///
/// Cloning an entity deep-copies every component, which is how values move
/// between worlds.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    blueprint: String,
    components: HashMap<ComponentKey, Box<dyn ComponentValue>>,
}

impl Entity {
    /// Creates an entity with no components.
    #[must_use]
    pub fn new(id: impl Into<EntityId>, blueprint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blueprint: blueprint.into(),
            components: HashMap::new(),
        }
    }

    /// Builder-style [`Entity::insert`].
    #[must_use]
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.insert(component);
        self
    }

    /// Returns the entity's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Returns the blueprint (kind) tag this entity was built from.
    #[inline]
    #[must_use]
    pub fn blueprint(&self) -> &str {
        &self.blueprint
    }

    /// Attaches a component, returning the value it replaced.
    pub fn insert<C: Component>(&mut self, component: C) -> Option<C> {
        self.components
            .insert(C::key(), Box::new(component))
            .and_then(|old| old.into_any().downcast::<C>().ok())
            .map(|old| *old)
    }

    /// Attaches an already type-erased component under its own key.
    pub fn insert_boxed(&mut self, component: Box<dyn ComponentValue>) {
        self.components.insert(component.component_key(), component);
    }

    /// Returns the component of type `C`, if attached.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components
            .get(&C::key())
            .and_then(|value| value.as_any().downcast_ref::<C>())
    }

    /// Returns the component of type `C` mutably, if attached.
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components
            .get_mut(&C::key())
            .and_then(|value| value.as_any_mut().downcast_mut::<C>())
    }

    /// Returns the type-erased component stored under `key`.
    #[must_use]
    pub fn get_by_key(&self, key: ComponentKey) -> Option<&dyn ComponentValue> {
        self.components.get(&key).map(|value| &**value)
    }

    /// Detaches and returns the component of type `C`.
    pub fn remove<C: Component>(&mut self) -> Option<C> {
        self.components
            .remove(&C::key())
            .and_then(|value| value.into_any().downcast::<C>().ok())
            .map(|value| *value)
    }

    /// Returns true if a component of type `C` is attached.
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.components.contains_key(&C::key())
    }

    /// Returns true if a component is stored under `key`.
    #[inline]
    #[must_use]
    pub fn has_key(&self, key: ComponentKey) -> bool {
        self.components.contains_key(&key)
    }

    /// Returns true if every key in `keys` is attached.
    #[must_use]
    pub fn has_all(&self, keys: &[ComponentKey]) -> bool {
        keys.iter().all(|key| self.components.contains_key(key))
    }

    /// Iterates over the attached component keys (unordered).
    pub fn keys(&self) -> impl Iterator<Item = ComponentKey> + '_ {
        self.components.keys().copied()
    }

    /// Returns the number of attached components.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        const KEY: &'static str = "position";
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Tag(&'static str);

    impl Component for Tag {
        const KEY: &'static str = "tag";
    }

    #[test]
    fn test_insert_replaces_previous_value() {
        let mut entity = Entity::new("e-1", "thing");
        assert!(entity.insert(Position { x: 1.0, y: 2.0 }).is_none());

        let old = entity.insert(Position { x: 3.0, y: 4.0 });
        assert_eq!(old, Some(Position { x: 1.0, y: 2.0 }));
        assert_eq!(entity.get::<Position>(), Some(&Position { x: 3.0, y: 4.0 }));
        assert_eq!(entity.component_count(), 1);
    }

    #[test]
    fn test_get_mut_and_remove() {
        let mut entity = Entity::new("e-1", "thing").with(Position { x: 0.0, y: 0.0 });
        if let Some(pos) = entity.get_mut::<Position>() {
            pos.x = 9.0;
        }
        assert_eq!(entity.remove::<Position>(), Some(Position { x: 9.0, y: 0.0 }));
        assert!(!entity.has::<Position>());
    }

    #[test]
    fn test_has_all_requires_every_key() {
        let entity = Entity::new("e-1", "thing").with(Tag("a"));
        assert!(entity.has_all(&[Tag::key()]));
        assert!(!entity.has_all(&[Tag::key(), Position::key()]));
        assert!(entity.has_all(&[]));
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Entity::new("e-1", "thing").with(Position { x: 1.0, y: 1.0 });
        let mut copy = original.clone();
        if let Some(pos) = copy.get_mut::<Position>() {
            pos.y = 5.0;
        }
        assert_eq!(original.get::<Position>().map(|p| p.y), Some(1.0));
        assert_eq!(copy.id().as_str(), "e-1");
        assert_eq!(copy.blueprint(), "thing");
    }
}
