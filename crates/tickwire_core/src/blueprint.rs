//! # Blueprints
//!
//! Named factories that build a default entity of a given kind.
//!
//! Snapshot projections carry a blueprint tag; a client uses it to build the
//! local entity the first time an identity shows up.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ecs::{Entity, EntityId};
use crate::error::BlueprintError;

type Factory = Arc<dyn Fn(&mut Entity) + Send + Sync>;

/// Registry of blueprint factories, keyed by blueprint name.
///
/// Constructed explicitly and handed to whatever needs it; there is no
/// global registry.
///
/// # Example
///
/// ```rust
/// use tickwire_core::{BlueprintRegistry, Component};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Hp(u32);
///
/// impl Component for Hp {
///     const KEY: &'static str = "hp";
/// }
///
/// let mut blueprints = BlueprintRegistry::new();
/// blueprints.register("orc", |orc| {
///     orc.insert(Hp(30));
/// });
///
/// let orc = blueprints.build("orc", "orc-7".into()).unwrap();
/// assert_eq!(orc.blueprint(), "orc");
/// assert_eq!(orc.get::<Hp>(), Some(&Hp(30)));
/// assert!(blueprints.build("dragon", "d-1".into()).is_err());
/// ```
#[derive(Clone, Default)]
pub struct BlueprintRegistry {
    factories: HashMap<String, Factory>,
}

impl BlueprintRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory for `name`.
    ///
    /// The factory receives a bare entity already carrying its identity and
    /// blueprint tag, and attaches default components.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&mut Entity) + Send + Sync + 'static,
    ) -> &mut Self {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a default entity of blueprint `name` with identity `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::Unknown`] if no factory is registered.
    pub fn build(&self, name: &str, id: EntityId) -> Result<Entity, BlueprintError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BlueprintError::Unknown(name.to_owned()))?;
        let mut entity = Entity::new(id, name);
        factory(&mut entity);
        Ok(entity)
    }

    /// Iterates over registered blueprint names (unordered).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for BlueprintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("BlueprintRegistry")
            .field("blueprints", &names)
            .finish()
    }
}
