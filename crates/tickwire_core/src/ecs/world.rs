//! # ECS World
//!
//! The container for all entities of one side (server or client).
//! Entities are kept in insertion order and indexed by identity.

use std::collections::HashMap;

use super::entity::{Entity, EntityId};

/// The world - every entity one participant knows about.
///
/// The server's world is authoritative. A client's world is a projection
/// rebuilt from snapshots.
///
/// # Example
///
/// ```rust
/// use tickwire_core::{Entity, World};
///
/// let mut world = World::new();
/// world.insert(Entity::new("ball-0", "ball"));
/// world.insert(Entity::new("ball-1", "ball"));
///
/// assert_eq!(world.len(), 2);
/// assert!(world.despawn("ball-0").is_some());
/// assert_eq!(world.iter().next().map(|e| e.id().as_str()), Some("ball-1"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct World {
    /// Entities in insertion order.
    entities: Vec<Entity>,
    /// Identity -> position in `entities`.
    index: HashMap<EntityId, usize>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the world holds no entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Inserts an entity.
    ///
    /// An entity with the same identity is replaced in place (keeping its
    /// position in iteration order) and returned.
    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        if let Some(&slot) = self.index.get(entity.id().as_str()) {
            return Some(std::mem::replace(&mut self.entities[slot], entity));
        }
        self.index.insert(entity.id().clone(), self.entities.len());
        self.entities.push(entity);
        None
    }

    /// Returns the entity with identity `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|&slot| &self.entities[slot])
    }

    /// Returns the entity with identity `id` mutably.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        match self.index.get(id) {
            Some(&slot) => Some(&mut self.entities[slot]),
            None => None,
        }
    }

    /// Returns true if an entity with identity `id` exists.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the entity with identity `id`, creating it with `create` first
    /// if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Propagates the error from `create`; the world is left unchanged.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        id: &str,
        create: impl FnOnce() -> Result<Entity, E>,
    ) -> Result<&mut Entity, E> {
        let slot = if let Some(&slot) = self.index.get(id) {
            slot
        } else {
            let entity = create()?;
            debug_assert_eq!(entity.id().as_str(), id, "factory built the wrong identity");
            let slot = self.entities.len();
            self.index.insert(EntityId::from(id), slot);
            self.entities.push(entity);
            slot
        };
        Ok(&mut self.entities[slot])
    }

    /// Removes and returns the entity with identity `id`.
    ///
    /// Iteration order of the remaining entities is preserved.
    pub fn despawn(&mut self, id: &str) -> Option<Entity> {
        let slot = self.index.remove(id)?;
        let entity = self.entities.remove(slot);
        for moved in &self.entities[slot..] {
            if let Some(position) = self.index.get_mut(moved.id().as_str()) {
                *position -= 1;
            }
        }
        Some(entity)
    }

    /// Keeps only the entities for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Entity) -> bool) {
        self.entities.retain(|entity| keep(entity));
        self.reindex();
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
    }

    /// Iterates over entities in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    /// Iterates mutably over entities in insertion order.
    ///
    /// Identities cannot change through `&mut Entity`, so the index stays valid.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.entities.iter_mut()
    }

    /// Returns all entities as a slice, in insertion order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (slot, entity) in self.entities.iter().enumerate() {
            self.index.insert(entity.id().clone(), slot);
        }
    }
}

impl<'a> IntoIterator for &'a World {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

impl<'a> IntoIterator for &'a mut World {
    type Item = &'a mut Entity;
    type IntoIter = std::slice::IterMut<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter_mut()
    }
}

impl FromIterator<Entity> for World {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut world = Self::new();
        for entity in iter {
            world.insert(entity);
        }
        world
    }
}
