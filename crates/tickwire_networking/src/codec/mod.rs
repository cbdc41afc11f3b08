//! # Snapshot Codec
//!
//! Projects a world into a [`Snapshot`] on the server and applies one back
//! onto a world on the client.
//!
//! The server's world holds everything; a codec decides what is visible.
//! [`ComponentCodec`] covers the common case: a fixed list of visible
//! component types, an optional "must have" filter, and a blueprint
//! registry for building entities the client has not seen before.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tickwire_core::{BlueprintRegistry, Component, ComponentKey, Entity, World};
use tracing::warn;

use crate::error::CodecError;
use crate::protocol::{EntitySnapshot, Snapshot};

/// Converts between a world and its visible projection.
///
/// `encode` never mutates the world. `decode` makes the client world match
/// the snapshot: new identities are created, visible components are
/// overwritten, and identities absent from the snapshot are removed.
pub trait SnapshotCodec: Send + Sync {
    /// Projects `world` at `tick`.
    fn encode(&self, tick: u64, world: &World) -> Snapshot;

    /// Applies `snapshot` onto `world`.
    ///
    /// # Errors
    ///
    /// Returns the first [`CodecError`] hit. Entities processed before the
    /// failure keep their new values, and no entity is removed.
    fn decode(&self, snapshot: &Snapshot, world: &mut World) -> Result<(), CodecError>;
}

type EncodeFn = fn(&Entity) -> Option<Result<Value, serde_json::Error>>;
type DecodeFn = fn(&mut Entity, &Value) -> Result<(), serde_json::Error>;

fn encode_component<C>(entity: &Entity) -> Option<Result<Value, serde_json::Error>>
where
    C: Component + Serialize,
{
    entity.get::<C>().map(serde_json::to_value)
}

fn decode_component<C>(entity: &mut Entity, value: &Value) -> Result<(), serde_json::Error>
where
    C: Component + DeserializeOwned,
{
    entity.insert(C::deserialize(value)?);
    Ok(())
}

#[derive(Clone, Copy)]
struct VisibleComponent {
    key: ComponentKey,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Table-driven [`SnapshotCodec`] built from component types.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use tickwire_core::{Component, Entity, World};
/// use tickwire_networking::codec::{ComponentCodec, SnapshotCodec};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Position { x: f32, y: f32 }
/// impl Component for Position { const KEY: &'static str = "position"; }
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// struct Secret(u32);
/// impl Component for Secret { const KEY: &'static str = "secret"; }
///
/// let codec = ComponentCodec::builder()
///     .require::<Position>()
///     .visible::<Position>()
///     .build();
///
/// let mut server = World::new();
/// server.insert(Entity::new("p-1", "player").with(Position { x: 1.0, y: 2.0 }).with(Secret(7)));
/// server.insert(Entity::new("rock", "prop"));
///
/// let snapshot = codec.encode(1, &server);
/// assert_eq!(snapshot.entities.len(), 1);
/// assert!(!snapshot.entities[0].components.contains_key("secret"));
///
/// let mut client = World::new();
/// codec.decode(&snapshot, &mut client).unwrap();
/// assert_eq!(client.get("p-1").and_then(|e| e.get::<Position>()), Some(&Position { x: 1.0, y: 2.0 }));
/// ```
#[derive(Clone)]
pub struct ComponentCodec {
    required: Vec<ComponentKey>,
    visible: Vec<VisibleComponent>,
    by_key: HashMap<&'static str, usize>,
    blueprints: Option<BlueprintRegistry>,
}

impl ComponentCodec {
    /// Starts building a codec.
    #[must_use]
    pub fn builder() -> ComponentCodecBuilder {
        ComponentCodecBuilder::default()
    }

    /// Returns true if `key` is sent to clients.
    #[must_use]
    pub fn is_visible(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Keys an entity must hold to appear in snapshots.
    #[must_use]
    pub fn required(&self) -> &[ComponentKey] {
        &self.required
    }

    fn project(&self, entity: &Entity) -> EntitySnapshot {
        let mut components = BTreeMap::new();
        for visible in &self.visible {
            match (visible.encode)(entity) {
                Some(Ok(value)) => {
                    components.insert(visible.key.as_str().to_owned(), value);
                }
                Some(Err(e)) => {
                    warn!(entity = %entity.id(), component = %visible.key, error = %e, "component left out of snapshot");
                }
                None => {}
            }
        }
        EntitySnapshot {
            id: entity.id().clone(),
            blueprint: entity.blueprint().to_owned(),
            components,
        }
    }

    fn instantiate(&self, projection: &EntitySnapshot) -> Result<Entity, CodecError> {
        match &self.blueprints {
            Some(registry) => registry
                .build(&projection.blueprint, projection.id.clone())
                .map_err(|_| CodecError::UnknownBlueprint {
                    entity: projection.id.clone(),
                    blueprint: projection.blueprint.clone(),
                }),
            None => Ok(Entity::new(projection.id.clone(), projection.blueprint.as_str())),
        }
    }
}

impl SnapshotCodec for ComponentCodec {
    fn encode(&self, tick: u64, world: &World) -> Snapshot {
        let entities = world
            .iter()
            .filter(|entity| entity.has_all(&self.required))
            .map(|entity| self.project(entity))
            .collect();
        Snapshot { tick, entities }
    }

    fn decode(&self, snapshot: &Snapshot, world: &mut World) -> Result<(), CodecError> {
        for projection in &snapshot.entities {
            let entity = world
                .get_or_try_insert_with(projection.id.as_str(), || self.instantiate(projection))?;

            for (key, value) in &projection.components {
                let visible = self
                    .by_key
                    .get(key.as_str())
                    .map(|&slot| self.visible[slot])
                    .ok_or_else(|| CodecError::UnknownComponent {
                        entity: projection.id.clone(),
                        component: key.clone(),
                    })?;
                (visible.decode)(entity, value).map_err(|source| CodecError::InvalidComponent {
                    entity: projection.id.clone(),
                    component: key.clone(),
                    source,
                })?;
            }
        }

        let present: HashSet<&str> = snapshot.entities.iter().map(|e| e.id.as_str()).collect();
        world.retain(|entity| present.contains(entity.id().as_str()));
        Ok(())
    }
}

impl std::fmt::Debug for ComponentCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: Vec<&str> = self.visible.iter().map(|v| v.key.as_str()).collect();
        f.debug_struct("ComponentCodec")
            .field("required", &self.required)
            .field("visible", &visible)
            .field("blueprints", &self.blueprints)
            .finish()
    }
}

/// Builder for [`ComponentCodec`].
#[derive(Default)]
pub struct ComponentCodecBuilder {
    required: Vec<ComponentKey>,
    visible: Vec<VisibleComponent>,
    blueprints: Option<BlueprintRegistry>,
}

impl ComponentCodecBuilder {
    /// Only entities holding `C` appear in snapshots.
    #[must_use]
    pub fn require<C: Component>(mut self) -> Self {
        if !self.required.contains(&C::key()) {
            self.required.push(C::key());
        }
        self
    }

    /// `C` is sent to clients. Registering the same type twice is a no-op.
    #[must_use]
    pub fn visible<C>(mut self) -> Self
    where
        C: Component + Serialize + DeserializeOwned,
    {
        if self.visible.iter().all(|v| v.key != C::key()) {
            self.visible.push(VisibleComponent {
                key: C::key(),
                encode: encode_component::<C>,
                decode: decode_component::<C>,
            });
        }
        self
    }

    /// Builds unseen entities from `registry`. Without one, they start bare.
    #[must_use]
    pub fn blueprints(mut self, registry: BlueprintRegistry) -> Self {
        self.blueprints = Some(registry);
        self
    }

    /// Finishes the codec.
    #[must_use]
    pub fn build(self) -> ComponentCodec {
        let by_key = self
            .visible
            .iter()
            .enumerate()
            .map(|(slot, v)| (v.key.as_str(), slot))
            .collect();
        ComponentCodec {
            required: self.required,
            visible: self.visible,
            by_key,
            blueprints: self.blueprints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        const KEY: &'static str = "position";
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Label(String);

    impl Component for Label {
        const KEY: &'static str = "label";
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Hidden(u8);

    impl Component for Hidden {
        const KEY: &'static str = "hidden";
    }

    fn codec() -> ComponentCodec {
        let mut blueprints = BlueprintRegistry::new();
        blueprints.register("dot", |dot| {
            dot.insert(Label("fresh".into()));
        });
        ComponentCodec::builder()
            .require::<Position>()
            .visible::<Position>()
            .visible::<Label>()
            .blueprints(blueprints)
            .build()
    }

    fn projection(id: &str, blueprint: &str, components: Value) -> EntitySnapshot {
        let components = match components {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        EntitySnapshot {
            id: id.into(),
            blueprint: blueprint.into(),
            components,
        }
    }

    #[test]
    fn test_encode_filters_and_hides() {
        let mut world = World::new();
        world.insert(
            Entity::new("a", "dot")
                .with(Position { x: 1.0, y: 1.0 })
                .with(Hidden(3)),
        );
        world.insert(Entity::new("b", "dot").with(Label("no position".into())));
        world.insert(Entity::new("c", "dot").with(Position { x: 2.0, y: 0.0 }));

        let snapshot = codec().encode(12, &world);
        assert_eq!(snapshot.tick, 12);
        let ids: Vec<&str> = snapshot.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(
            snapshot.entities[0].components.keys().collect::<Vec<_>>(),
            vec!["position"]
        );
        // Encoding leaves the world alone.
        assert_eq!(world.len(), 3);
    }

    #[test]
    fn test_decode_creates_from_blueprint_then_overwrites() {
        let mut world = World::new();
        let mut snapshot = Snapshot::new(1);
        snapshot
            .entities
            .push(projection("a", "dot", json!({ "position": { "x": 4.0, "y": 5.0 } })));

        codec().decode(&snapshot, &mut world).unwrap();
        let entity = world.get("a").unwrap();
        assert_eq!(entity.get::<Position>(), Some(&Position { x: 4.0, y: 5.0 }));
        // Blueprint default survives since the snapshot did not carry a label.
        assert_eq!(entity.get::<Label>(), Some(&Label("fresh".into())));
        assert_eq!(entity.blueprint(), "dot");
    }

    #[test]
    fn test_decode_removes_absent_entities() {
        let mut world = World::new();
        world.insert(Entity::new("gone", "dot"));
        world.insert(Entity::new("kept", "dot"));

        let mut snapshot = Snapshot::new(2);
        snapshot.entities.push(projection("kept", "dot", json!({})));
        codec().decode(&snapshot, &mut world).unwrap();

        assert!(!world.contains("gone"));
        assert!(world.contains("kept"));
    }

    #[test]
    fn test_decode_errors() {
        let codec = codec();

        let mut snapshot = Snapshot::new(1);
        snapshot.entities.push(projection("x", "comet", json!({})));
        assert!(matches!(
            codec.decode(&snapshot, &mut World::new()),
            Err(CodecError::UnknownBlueprint { blueprint, .. }) if blueprint == "comet"
        ));

        let mut snapshot = Snapshot::new(1);
        snapshot.entities.push(projection("x", "dot", json!({ "hidden": 1 })));
        assert!(matches!(
            codec.decode(&snapshot, &mut World::new()),
            Err(CodecError::UnknownComponent { component, .. }) if component == "hidden"
        ));

        let mut snapshot = Snapshot::new(1);
        snapshot.entities.push(projection("x", "dot", json!({ "position": "north" })));
        let mut world = World::new();
        world.insert(Entity::new("stale", "dot"));
        assert!(matches!(
            codec.decode(&snapshot, &mut world),
            Err(CodecError::InvalidComponent { .. })
        ));
        // A failed decode never prunes.
        assert!(world.contains("stale"));
    }

    #[test]
    fn test_without_registry_entities_start_bare() {
        let codec = ComponentCodec::builder().visible::<Label>().build();
        let mut snapshot = Snapshot::new(1);
        snapshot.entities.push(projection("n", "anything", json!({})));

        let mut world = World::new();
        codec.decode(&snapshot, &mut world).unwrap();
        let entity = world.get("n").unwrap();
        assert_eq!(entity.component_count(), 0);
        assert_eq!(entity.blueprint(), "anything");
    }

    #[test]
    fn test_builder_deduplicates() {
        let codec = ComponentCodec::builder()
            .require::<Position>()
            .require::<Position>()
            .visible::<Label>()
            .visible::<Label>()
            .build();
        assert_eq!(codec.required().len(), 1);
        assert!(codec.is_visible("label"));
        assert!(!codec.is_visible("position"));
        assert!(format!("{codec:?}").contains("label"));
    }
}
