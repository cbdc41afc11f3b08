//! Text "renderer": one line per visible ball.

use std::fmt::Write as _;

use tickwire_core::World;

use crate::components::{Color, Position, Radius};

/// Describes every entity with a position, in world order.
///
/// ```text
/// ball-0  (10.0, 20.0)  r=2.0  red
/// ```
#[must_use]
pub fn describe(world: &World) -> String {
    let mut out = String::new();
    for entity in world {
        let Some(position) = entity.get::<Position>() else {
            continue;
        };
        let radius = entity.get::<Radius>().map_or(0.0, |r| r.0);
        let color = entity.get::<Color>().map_or("?", |c| c.name());
        let _ = writeln!(
            out,
            "{:<8}  ({:.1}, {:.1})  r={radius:.1}  {color}",
            entity.id().as_str(),
            position.x,
            position.y,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwire_core::Entity;

    #[test]
    fn test_describe_lists_positioned_entities() {
        let mut world = World::new();
        world.insert(
            Entity::new("ball-0", "ball")
                .with(Position { x: 10.0, y: 20.0 })
                .with(Radius(2.0))
                .with(Color::Red),
        );
        world.insert(Entity::new("ghost", "ball"));

        let text = describe(&world);
        assert_eq!(text, "ball-0    (10.0, 20.0)  r=2.0  red\n");
    }
}
