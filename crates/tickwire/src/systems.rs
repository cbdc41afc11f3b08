//! # Ball Systems
//!
//! Movement integrates velocity; bounce keeps balls inside the arena.
//! Register movement first so bounce corrects the fresh position.

use tickwire_core::{Component, ComponentKey, Entity, System, SystemError, SystemResult};

use crate::components::{Arena, Position, Radius, Velocity};

fn component<C: Component + Copy>(entity: &Entity) -> SystemResult<C> {
    entity
        .get::<C>()
        .copied()
        .ok_or_else(|| SystemError::MissingComponent {
            entity: entity.id().clone(),
            component: C::key(),
        })
}

/// `position += velocity * dt`.
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn required(&self) -> &[ComponentKey] {
        const REQUIRED: &[ComponentKey] = &[ComponentKey::of::<Position>(), ComponentKey::of::<Velocity>()];
        REQUIRED
    }

    fn update_entity(&mut self, entity: &mut Entity, dt: f32) -> SystemResult<()> {
        let velocity: Velocity = component(entity)?;
        let mut position: Position = component(entity)?;
        position.x += velocity.x * dt;
        position.y += velocity.y * dt;
        entity.insert(position);
        Ok(())
    }
}

/// Reflects balls off the arena walls.
#[derive(Debug, Default)]
pub struct BounceSystem {
    arena: Arena,
    bounces: u64,
}

impl BounceSystem {
    /// Creates the system for `arena`.
    #[must_use]
    pub fn new(arena: Arena) -> Self {
        Self { arena, bounces: 0 }
    }

    /// Total wall hits so far.
    #[must_use]
    pub fn bounces(&self) -> u64 {
        self.bounces
    }
}

/// Folds `pos` back inside `[radius, limit - radius]`, flipping `speed`
/// toward the inside. Returns true on a hit.
fn reflect(pos: &mut f32, speed: &mut f32, radius: f32, limit: f32) -> bool {
    if *pos - radius < 0.0 {
        *pos = radius;
        *speed = speed.abs();
        true
    } else if *pos + radius > limit {
        *pos = (limit - radius).max(radius);
        *speed = -speed.abs();
        true
    } else {
        false
    }
}

impl System for BounceSystem {
    fn name(&self) -> &str {
        "bounce"
    }

    fn required(&self) -> &[ComponentKey] {
        const REQUIRED: &[ComponentKey] = &[
            ComponentKey::of::<Position>(),
            ComponentKey::of::<Velocity>(),
            ComponentKey::of::<Radius>(),
        ];
        REQUIRED
    }

    fn update_entity(&mut self, entity: &mut Entity, _dt: f32) -> SystemResult<()> {
        let Radius(radius) = component(entity)?;
        let mut position: Position = component(entity)?;
        let mut velocity: Velocity = component(entity)?;

        let hit_x = reflect(&mut position.x, &mut velocity.x, radius, self.arena.width);
        let hit_y = reflect(&mut position.y, &mut velocity.y, radius, self.arena.height);
        if hit_x || hit_y {
            self.bounces += 1;
            entity.insert(position);
            entity.insert(velocity);
        }
        Ok(())
    }
}
