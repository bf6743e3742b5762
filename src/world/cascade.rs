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

//! Reference index and the `dontFragment` side-table.
//!
//! Both are plain maps owned by [`crate::world::World`], not by any one
//! archetype -- an entity's relations can point anywhere, and the side
//! table lets many relation targets of a `dontFragment` component share
//! one archetype shape.

use std::collections::{HashSet, VecDeque};

use ahash::AHashMap;
use rustc_hash::FxHashMap;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::Payload;
use crate::bitset::MultiMap;
use crate::command::EntityCommand;
use crate::error::Result;
use crate::id::Id;

use super::World;

/// `target entity -> multimap(referrer entity -> referring component id)`.
///
/// Populated on every accepted add/remove of a relation or an
/// entity-as-component-type edge; walked breadth-first on cascade delete.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    by_target: MultiMap<Id, (Id, Id)>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `referrer` holds `via_id` (an entity-relation, or an
    /// entity id used directly as a component type) pointing at `target`.
    pub fn track(&mut self, target: Id, referrer: Id, via_id: Id) {
        self.by_target.insert(target, (referrer, via_id));
    }

    pub fn untrack(&mut self, target: Id, referrer: Id, via_id: Id) {
        self.by_target.remove(&target, &(referrer, via_id));
    }

    pub fn referrers_of(&self, target: Id) -> &[(Id, Id)] {
        self.by_target.get(&target)
    }

    pub fn drop_target(&mut self, target: Id) -> Vec<(Id, Id)> {
        self.by_target.remove_key(&target)
    }
}

/// `entity -> { concrete relation id -> payload }`, for relations whose
/// component is `dontFragment`. The archetype shape only ever carries the
/// wildcard marker for such a component; the real per-target payloads
/// live here.
#[derive(Debug, Default)]
pub struct DontFragmentTable {
    entries: AHashMap<Id, FxHashMap<Id, Payload>>,
}

impl DontFragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: Id, relation_id: Id) -> Option<&Payload> {
        self.entries.get(&entity)?.get(&relation_id)
    }

    pub fn set(&mut self, entity: Id, relation_id: Id, payload: Payload) {
        self.entries.entry(entity).or_default().insert(relation_id, payload);
    }

    pub fn remove(&mut self, entity: Id, relation_id: Id) -> Option<Payload> {
        let map = self.entries.get_mut(&entity)?;
        let removed = map.remove(&relation_id);
        if map.is_empty() {
            self.entries.remove(&entity);
        }
        removed
    }

    pub fn remove_entity(&mut self, entity: Id) -> FxHashMap<Id, Payload> {
        self.entries.remove(&entity).unwrap_or_default()
    }

    /// Concrete relations of `component` currently staged for `entity` in
    /// the side-table (target, payload), for wildcard reads/queries.
    pub fn concrete_relations(&self, entity: Id, component: Id) -> Vec<(Id, &Payload)> {
        let Some(map) = self.entries.get(&entity) else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(&rel_id, payload)| {
                let decoded = rel_id.decode()?;
                if decoded.component != component {
                    return None;
                }
                match decoded.target {
                    crate::id::Target::Entity(t) | crate::id::Target::Component(t) => {
                        Some((t, payload))
                    }
                    crate::id::Target::Wildcard => None,
                }
            })
            .collect()
    }

    pub fn has_any(&self, entity: Id, component: Id) -> bool {
        !self.concrete_relations(entity, component).is_empty()
    }

    pub fn relation_ids_of(&self, entity: Id) -> HashSet<Id> {
        self.entries
            .get(&entity)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl World {
    /// Breadth-first delete of `root` and every entity that reaches it
    /// through a `cascadeDelete` entity-relation.
    ///
    /// For a referrer that reaches `root` through anything other than a
    /// `cascadeDelete` entity-relation, the referring id itself is simply
    /// removed from the referrer -- a plain component removal, routed
    /// back through the normal command processor so it gets its own
    /// changeset, reference-index update, and hook dispatch. A `visited`
    /// set guards against a reference cycle feeding the queue forever.
    pub(super) fn cascade_delete(&mut self, root: Id) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.cascade_delete", root = root.raw());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let mut visited: HashSet<Id> = HashSet::new();
        let mut queue: VecDeque<Id> = VecDeque::new();
        queue.push_back(root);
        visited.insert(root);

        while let Some(target) = queue.pop_front() {
            let referrers = self.reference_index.drop_target(target);
            for (referrer, via_id) in referrers {
                if !self.exists(referrer) {
                    continue;
                }
                if self.registry.is_cascade_delete_relation(via_id) {
                    if visited.insert(referrer) {
                        queue.push_back(referrer);
                    }
                } else {
                    self.process_entity_commands(referrer, &[EntityCommand::Remove { id: via_id }])?;
                }
            }

            if !self.exists(target) {
                // A cycle already routed its removal through another branch.
                continue;
            }
            self.untrack_outgoing_references(target);

            let arch_idx = self.entity_location[&target];
            let archetype = self.archetypes[arch_idx].as_mut().expect("live archetype");
            let row = archetype.row_of(target).expect("entity resident");
            let (_removed, swapped) = archetype.remove(row);
            if let Some(swapped_entity) = swapped {
                self.entity_location.insert(swapped_entity, arch_idx);
            }
            self.entity_location.remove(&target);
            self.dont_fragment.remove_entity(target);
            self.entity_alloc.dealloc(target)?;
            self.maybe_gc_archetype(arch_idx);
        }
        Ok(())
    }

    /// Drop `entity`'s own outgoing edges from the reference index: every
    /// entity-relation it holds, plus every entity id it uses directly as
    /// a component type, read from both the archetype shape and the
    /// `dontFragment` side table.
    fn untrack_outgoing_references(&mut self, entity: Id) {
        let Some(&arch_idx) = self.entity_location.get(&entity) else { return };
        let Some(archetype) = self.archetypes[arch_idx].as_ref() else { return };
        if archetype.row_of(entity).is_none() {
            return;
        }

        let mut outgoing: Vec<Id> = archetype
            .shape()
            .iter()
            .copied()
            .filter(|id| id.is_entity_relation() || id.is_entity())
            .collect();
        outgoing.extend(self.dont_fragment.relation_ids_of(entity).into_iter().filter(|id| id.is_entity_relation()));

        for id in outgoing {
            let target = match id.decode() {
                Some(crate::id::Decoded { target: crate::id::Target::Entity(t), .. }) => t,
                None if id.is_entity() => id,
                _ => continue,
            };
            self.reference_index.untrack(target, entity, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::relation;

    fn eid(n: i64) -> Id {
        Id::from_raw(n)
    }

    #[test]
    fn reference_index_tracks_and_untracks() {
        let mut idx = ReferenceIndex::new();
        let target = eid(1024);
        let referrer = eid(1025);
        let comp = eid(1);
        idx.track(target, referrer, comp);
        assert_eq!(idx.referrers_of(target), &[(referrer, comp)]);
        idx.untrack(target, referrer, comp);
        assert!(idx.referrers_of(target).is_empty());
    }

    #[test]
    fn dont_fragment_table_roundtrips_and_scans_by_component() {
        let mut table = DontFragmentTable::new();
        let follows = eid(5);
        let entity = eid(2000);
        let t1 = eid(1024);
        let t2 = eid(1025);
        let r1 = relation(follows, Some(t1)).unwrap();
        let r2 = relation(follows, Some(t2)).unwrap();

        table.set(entity, r1, serde_json::json!("a"));
        table.set(entity, r2, serde_json::json!("b"));

        let mut matches = table.concrete_relations(entity, follows);
        matches.sort_by_key(|(t, _)| t.raw());
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].0, t1);

        table.remove(entity, r1);
        assert_eq!(table.concrete_relations(entity, follows).len(), 1);
    }
}
