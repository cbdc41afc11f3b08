//! # Component System
//!
//! Components are plain data values tagged with a component-type key.
//! They are stored type-erased and re-typed on access by downcasting.

use std::any::Any;
use std::fmt;

/// Key identifying a component type.
///
/// Two components with the same key are the same component type; an entity
/// holds at most one value per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey(&'static str);

impl ComponentKey {
    /// Creates a key from its name.
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the key of component type `C`.
    #[inline]
    #[must_use]
    pub const fn of<C: Component>() -> Self {
        Self(C::KEY)
    }

    /// Returns the key name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Marker trait for component types.
///
/// # Example
///
/// ```rust
/// use tickwire_core::Component;
///
/// #[derive(Clone, Debug)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {
///     const KEY: &'static str = "position";
/// }
/// ```
pub trait Component: fmt::Debug + Clone + Send + Sync + 'static {
    /// Unique name for this component type.
    const KEY: &'static str;

    /// Returns this type's [`ComponentKey`].
    #[inline]
    #[must_use]
    fn key() -> ComponentKey {
        ComponentKey(Self::KEY)
    }
}

/// Object-safe view of a component value.
///
/// Implemented for every [`Component`]; lets an entity store heterogeneous
/// values in one map.
pub trait ComponentValue: Any + fmt::Debug + Send + Sync {
    /// Key of the concrete component type.
    fn component_key(&self) -> ComponentKey;
    /// Clones the value behind a fresh box.
    fn clone_boxed(&self) -> Box<dyn ComponentValue>;
    /// Borrows the value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrows the value as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Converts the box into `Box<dyn Any>` for by-value downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<C: Component> ComponentValue for C {
    fn component_key(&self) -> ComponentKey {
        C::key()
    }

    fn clone_boxed(&self) -> Box<dyn ComponentValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Clone for Box<dyn ComponentValue> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Mass(f32);

    impl Component for Mass {
        const KEY: &'static str = "mass";
    }

    #[test]
    fn test_key_of_component() {
        assert_eq!(ComponentKey::of::<Mass>(), ComponentKey::new("mass"));
        assert_eq!(Mass::key().as_str(), "mass");
        assert_eq!(Mass::key().to_string(), "mass");
    }

    #[test]
    fn test_boxed_value_downcasts() {
        let boxed: Box<dyn ComponentValue> = Box::new(Mass(2.5));
        assert_eq!(boxed.component_key(), Mass::key());
        assert_eq!(boxed.as_any().downcast_ref::<Mass>(), Some(&Mass(2.5)));

        let cloned = boxed.clone();
        let owned = cloned.into_any().downcast::<Mass>().map(|b| *b);
        assert_eq!(owned.ok(), Some(Mass(2.5)));
    }
}
