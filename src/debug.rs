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

//! Introspection helpers for tests and tooling -- never exercised on the
//! mutation hot path. Dumps an archetype's shape and resident rows, or
//! lists every archetype currently carrying a given component.

use crate::archetype::Payload;
use crate::id::Id;
use crate::world::World;

/// A snapshot of one archetype's shape and resident entities, for
/// assertions in tests and for ad-hoc inspection.
#[derive(Debug, Clone)]
pub struct ArchetypeDump {
    pub index: usize,
    pub shape: Vec<Id>,
    pub entities: Vec<Id>,
    pub rows: Vec<Vec<(Id, Payload)>>,
}

/// World inspector for tests and debugging. Not part of the mutation
/// path: every method here re-derives its answer from `World`'s public
/// accessors rather than caching anything of its own.
pub struct WorldInspector;

impl WorldInspector {
    pub fn entity_count(world: &World) -> usize {
        world.entity_count()
    }

    pub fn archetype_count(world: &World) -> usize {
        world.archetype_count()
    }

    /// Dump every live archetype's shape and rows.
    pub fn archetype_dumps(world: &World) -> Vec<ArchetypeDump> {
        world
            .archetypes()
            .map(|(index, archetype)| {
                let shape = archetype.shape().to_vec();
                let mut entities = Vec::new();
                let mut rows = Vec::new();
                archetype.for_each_row(|entity, row| {
                    entities.push(entity);
                    let values = shape
                        .iter()
                        .filter_map(|&id| archetype.get(row, id).map(|p| (id, p.clone())))
                        .collect();
                    rows.push(values);
                });
                ArchetypeDump { index, shape, entities, rows }
            })
            .collect()
    }

    /// Dump a single entity's resident archetype, if it exists.
    pub fn dump_entity(world: &World, entity: Id) -> Option<ArchetypeDump> {
        world.archetypes().find_map(|(index, archetype)| {
            let row = archetype.row_of(entity)?;
            let shape = archetype.shape().to_vec();
            let values = shape
                .iter()
                .filter_map(|&id| archetype.get(row, id).map(|p| (id, p.clone())))
                .collect();
            Some(ArchetypeDump { index, shape, entities: vec![entity], rows: vec![values] })
        })
    }

    /// Every archetype index whose shape contains `component` (a concrete
    /// id, or a wildcard relation -- matched the same way queries match).
    pub fn archetypes_with(world: &World, component: Id) -> Vec<usize> {
        world
            .archetypes()
            .filter(|(_, archetype)| {
                if component.is_wildcard() {
                    let head = component.decode().expect("wildcard decodes").component;
                    archetype.contains_component(component) || archetype.has_concrete_relation(head)
                } else {
                    archetype.contains_component(component)
                }
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn print_summary(world: &World) {
        println!("=== World Summary ===");
        println!("Entities: {}", Self::entity_count(world));
        println!("Archetypes: {}", Self::archetype_count(world));
        for dump in Self::archetype_dumps(world) {
            println!(
                "  archetype {}: {} components, {} entities",
                dump.index,
                dump.shape.len(),
                dump.entities.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentFlags;

    #[test]
    fn dumps_entities_in_their_archetype() {
        let mut world = World::new();
        let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
        let e = world.new_entity().unwrap();
        world.set(e, position, Some(serde_json::json!({"x": 1}))).unwrap();
        world.sync().unwrap();

        let dump = WorldInspector::dump_entity(&world, e).expect("entity has an archetype");
        assert_eq!(dump.shape, vec![position]);
        assert_eq!(dump.rows[0], vec![(position, serde_json::json!({"x": 1}))]);
    }

    #[test]
    fn archetypes_with_finds_matching_shapes() {
        let mut world = World::new();
        let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
        let e = world.new_entity().unwrap();
        world.set(e, position, None).unwrap();
        world.sync().unwrap();

        let matches = WorldInspector::archetypes_with(&world, position);
        assert_eq!(matches.len(), 1);
        assert!(WorldInspector::archetypes_with(&world, Id::from_raw(999)).is_empty());
    }
}
