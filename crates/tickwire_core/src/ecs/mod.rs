//! # Entity Component System
//!
//! A deliberately plain ECS: entities are keyed bags, systems filter by key.
//!
//! ## Design Philosophy
//!
//! - Component values are type-erased behind [`ComponentValue`] and re-typed on access
//! - Entity identity is a domain-assigned string, stable across server and client
//! - Iteration order is insertion order, so snapshots are deterministic

mod component;
mod entity;
mod system;
mod world;

pub use component::{Component, ComponentKey, ComponentValue};
pub use entity::{Entity, EntityId};
pub use system::{run_system, System};
pub use world::World;
