//! # Systems
//!
//! Logic that runs once per tick over the entities it qualifies for.

use super::component::ComponentKey;
use super::entity::Entity;
use super::world::World;
use crate::error::SystemResult;

/// A unit of per-tick simulation logic.
///
/// An entity qualifies for a system iff it holds every key in
/// [`System::required`]. Both hooks default to doing nothing, so a system
/// implements whichever granularity it needs.
///
/// # Example
///
/// ```rust
/// use tickwire_core::{Component, ComponentKey, Entity, System, SystemResult};
///
/// #[derive(Clone, Debug)]
/// struct Age(u64);
///
/// impl Component for Age {
///     const KEY: &'static str = "age";
/// }
///
/// struct Aging;
///
/// impl System for Aging {
///     fn name(&self) -> &str {
///         "aging"
///     }
///
///     fn required(&self) -> &[ComponentKey] {
///         const REQUIRED: &[ComponentKey] = &[ComponentKey::of::<Age>()];
///         REQUIRED
///     }
///
///     fn update_entity(&mut self, entity: &mut Entity, _dt: f32) -> SystemResult<()> {
///         if let Some(age) = entity.get_mut::<Age>() {
///             age.0 += 1;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait System: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Component keys an entity must hold to be passed to [`System::update_entity`].
    fn required(&self) -> &[ComponentKey];

    /// Called once per tick, before any per-entity update.
    ///
    /// # Errors
    ///
    /// Any error aborts the current tick.
    fn update(&mut self, _world: &mut World, _dt: f32) -> SystemResult<()> {
        Ok(())
    }

    /// Called once per tick for every qualifying entity, in world order.
    ///
    /// # Errors
    ///
    /// Any error aborts the current tick.
    fn update_entity(&mut self, _entity: &mut Entity, _dt: f32) -> SystemResult<()> {
        Ok(())
    }
}

/// Runs one system over `world`: the per-tick hook, then the per-entity hook
/// for every qualifying entity.
///
/// Stops at the first error. Entities already updated keep their changes.
///
/// # Errors
///
/// Returns the first error raised by either hook.
pub fn run_system(system: &mut dyn System, world: &mut World, dt: f32) -> SystemResult<()> {
    system.update(world, dt)?;

    let required = system.required().to_vec();
    for entity in world.iter_mut() {
        if entity.has_all(&required) {
            system.update_entity(entity, dt)?;
        }
    }
    Ok(())
}
