//! # Tickwire Core
//!
//! The world model shared by the authoritative server and its render-only clients.
//!
//! ## Model
//!
//! - An [`Entity`] is an opaque string identity plus a bag of components,
//!   at most one value per component key.
//! - A [`World`] owns entities in insertion order and indexes them by identity.
//! - A [`System`] declares the component keys it needs and receives a per-tick
//!   hook plus a per-entity hook for every entity holding all of those keys.
//!
//! Server and client worlds never share entities by reference. They hold value
//! copies correlated only by identity.
//!
//! ## Example
//!
//! ```rust
//! use tickwire_core::{Component, Entity, World};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Health(u32);
//!
//! impl Component for Health {
//!     const KEY: &'static str = "health";
//! }
//!
//! let mut world = World::new();
//! world.insert(Entity::new("orc-1", "orc").with(Health(30)));
//!
//! assert_eq!(world.get("orc-1").and_then(|e| e.get::<Health>()), Some(&Health(30)));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod blueprint;
pub mod ecs;
pub mod error;

pub use blueprint::BlueprintRegistry;
pub use ecs::{
    run_system, Component, ComponentKey, ComponentValue, Entity, EntityId, System, World,
};
pub use error::{BlueprintError, SystemError, SystemResult};
