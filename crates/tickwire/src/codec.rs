//! Ball blueprints and the snapshot codec both sides share.

use tickwire_core::BlueprintRegistry;
use tickwire_networking::codec::ComponentCodec;

use crate::components::{Color, Position, Radius};

/// Blueprint tag of every ball.
pub const BALL: &str = "ball";

/// Radius of a ball that has not been told otherwise.
pub const DEFAULT_RADIUS: f32 = 2.0;

/// Registry holding the `ball` blueprint: white, default radius.
#[must_use]
pub fn ball_blueprints() -> BlueprintRegistry {
    let mut blueprints = BlueprintRegistry::new();
    blueprints.register(BALL, |ball| {
        ball.insert(Color::White);
        ball.insert(Radius(DEFAULT_RADIUS));
    });
    blueprints
}

/// Sends position, colour and radius of everything that has a position.
#[must_use]
pub fn ball_codec() -> ComponentCodec {
    ComponentCodec::builder()
        .require::<Position>()
        .visible::<Position>()
        .visible::<Color>()
        .visible::<Radius>()
        .blueprints(ball_blueprints())
        .build()
}
