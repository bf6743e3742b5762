// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wires [`crate::snapshot`]'s wire format to a live [`World`]. Hooks,
//! query caches, and the command buffer are not part of the contract --
//! a restored world starts with none of those registered, same as a
//! fresh one.

use rustc_hash::FxHashMap;

use crate::alloc::EntityAllocator;
use crate::archetype::Payload;
use crate::error::Result;
use crate::id::{relation, Id, Target};
use crate::snapshot::{
    decode_id, encode_components, encode_id, restore_components, IdManagerState, SerializedEntity,
    SerializedValue, Snapshot, SNAPSHOT_VERSION,
};

use super::World;

impl World {
    /// Snapshot every entity and the component registry. Wildcard
    /// markers are never serialized directly -- a `dontFragment`
    /// component's concrete relations (read from the side table) carry
    /// the real payloads, and the marker is reconstructed from their
    /// presence on restore.
    pub fn serialize(&self) -> Snapshot {
        let (next_id, freelist) = self.entity_alloc.state();
        let component_entities = encode_components(&self.registry);

        let mut entities = Vec::new();
        for slot in &self.archetypes {
            let Some(archetype) = slot else { continue };
            archetype.for_each_row(|entity, row| {
                let mut components = Vec::new();
                for &id in archetype.shape() {
                    if self.registry.is_dont_fragment_wildcard(id) {
                        continue;
                    }
                    if let Some(payload) = archetype.get(row, id) {
                        components.push(SerializedValue {
                            kind: encode_id(&self.registry, id),
                            value: payload.clone(),
                        });
                    }
                }
                for id in self.dont_fragment.relation_ids_of(entity) {
                    if let Some(payload) = self.dont_fragment.get(entity, id) {
                        components.push(SerializedValue {
                            kind: encode_id(&self.registry, id),
                            value: payload.clone(),
                        });
                    }
                }
                entities.push(SerializedEntity {
                    id: encode_id(&self.registry, entity),
                    components,
                });
            });
        }

        Snapshot {
            version: SNAPSHOT_VERSION,
            id_manager: IdManagerState { next_id, freelist },
            entities,
            component_entities,
        }
    }

    /// Reconstruct a world from a snapshot: replays the component
    /// registry in its original registration order (reproducing the
    /// same ids), restores the entity allocator's counter and freelist,
    /// then re-inserts every entity directly into its archetype and
    /// rebuilds the reference index. Ids unresolvable against the
    /// restored registry (an unrecognised name) fail with
    /// [`crate::error::EcsError::InvalidId`].
    pub fn restore(snapshot: Snapshot) -> Result<World> {
        let mut world = World::new();
        restore_components(&mut world.registry, &snapshot.component_entities)?;
        world.entity_alloc = EntityAllocator::restore(snapshot.id_manager.next_id, snapshot.id_manager.freelist);

        for serialized_entity in &snapshot.entities {
            let entity = decode_id(&world.registry, &serialized_entity.id)?;
            let decoded_components: Vec<(Id, &Payload)> = serialized_entity
                .components
                .iter()
                .map(|c| Ok((decode_id(&world.registry, &c.kind)?, &c.value)))
                .collect::<Result<Vec<_>>>()?;

            let mut shape: Vec<Id> = Vec::new();
            let mut payloads: FxHashMap<Id, Payload> = FxHashMap::default();
            for &(id, payload) in &decoded_components {
                if world.registry.is_dont_fragment_relation(id) {
                    world.dont_fragment.set(entity, id, payload.clone());
                    let component = id.decode().expect("relation decodes").component;
                    let wildcard = relation(component, None)?;
                    if !shape.contains(&wildcard) {
                        shape.push(wildcard);
                    }
                } else {
                    shape.push(id);
                    payloads.insert(id, payload.clone());
                }
            }

            let arch_idx = world.ensure_archetype(shape);
            world.archetypes[arch_idx].as_mut().expect("just ensured").add(entity, payloads);
            world.entity_location.insert(entity, arch_idx);

            for (id, _) in decoded_components {
                let target = match id.decode() {
                    Some(d) => match d.target {
                        Target::Entity(t) => Some(t),
                        _ => None,
                    },
                    None if id.is_entity() => Some(id),
                    None => None,
                };
                if let Some(target) = target {
                    world.reference_index.track(target, entity, id);
                }
            }
        }

        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentFlags;

    #[test]
    fn round_trips_plain_components() {
        let mut world = World::new();
        let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
        let e = world.new_entity().unwrap();
        world.set(e, position, Some(serde_json::json!({"x": 1, "y": 2}))).unwrap();
        world.sync().unwrap();

        let snapshot = world.serialize();
        let restored = World::restore(snapshot).unwrap();

        assert!(restored.exists(e));
        assert_eq!(
            restored.get(e, position).unwrap(),
            crate::query::QueryValue::Value(serde_json::json!({"x": 1, "y": 2}))
        );
    }

    #[test]
    fn round_trips_dont_fragment_relations() {
        let mut world = World::new();
        let follows = world
            .component(ComponentFlags { dont_fragment: true, ..Default::default() }, Some("Follows"))
            .unwrap();
        let a = world.new_entity().unwrap();
        let b = world.new_entity().unwrap();
        let rel = world.relation(follows, Some(b)).unwrap();
        world.set(a, rel, Some(serde_json::json!("payload"))).unwrap();
        world.sync().unwrap();

        let restored = World::restore(world.serialize()).unwrap();
        assert!(restored.has(a, rel));
        assert_eq!(
            restored.get(a, rel).unwrap(),
            crate::query::QueryValue::Value(serde_json::json!("payload"))
        );
    }

    #[test]
    fn unnamed_component_ids_survive_replay_order() {
        let mut world = World::new();
        let _first = world.component(ComponentFlags::default(), None).unwrap();
        let second = world.component(ComponentFlags::default(), Some("Second")).unwrap();
        let e = world.new_entity().unwrap();
        world.set(e, second, None).unwrap();
        world.sync().unwrap();

        let restored = World::restore(world.serialize()).unwrap();
        assert!(restored.has(e, second));
    }
}
