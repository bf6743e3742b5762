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

//! The entity-level command processor: turns one entity's ordered command
//! list into a single [`Changeset`], applies it (in place or via a
//! structural archetype move), maintains the reference index, and fires
//! hooks.

use std::collections::HashSet;

use crate::archetype::{sentinel, Archetype, Payload};
use crate::changeset::Changeset;
use crate::command::EntityCommand;
use crate::error::Result;
use crate::hooks::{Commands, HookRegistry, HookValues, MultiSelector, Trigger};
use crate::id::{relation, Id, Target};
use crate::registry::Registry;

use super::World;

impl World {
    pub(super) fn process_entity_commands(&mut self, entity: Id, commands: &[EntityCommand]) -> Result<()> {
        if !self.exists(entity) {
            // The entity may have been cascade-deleted earlier in this
            // same drain round by another entity's commands.
            return Ok(());
        }

        if commands.iter().any(|c| matches!(c, EntityCommand::Destroy)) {
            return self.cascade_delete(entity);
        }

        let arch_idx = self.entity_location[&entity];
        let changeset = self.build_changeset(entity, arch_idx, commands);
        if changeset.is_empty() {
            return Ok(());
        }
        self.apply_changeset(entity, arch_idx, changeset)
    }

    fn build_changeset(&self, entity: Id, arch_idx: usize, commands: &[EntityCommand]) -> Changeset {
        let mut cs = Changeset::new();
        let archetype = self.archetypes[arch_idx].as_ref().expect("live archetype");

        for command in commands {
            match command {
                EntityCommand::Set { id, payload } => {
                    self.stage_set(&mut cs, archetype, entity, *id, payload.clone());
                }
                EntityCommand::Remove { id } => {
                    self.stage_remove(&mut cs, archetype, entity, *id);
                }
                EntityCommand::Destroy => unreachable!("handled by the caller"),
            }
        }
        cs
    }

    fn stage_set(&self, cs: &mut Changeset, archetype: &Archetype, entity: Id, id: Id, payload: Option<Payload>) {
        if let Some(decoded) = id.decode() {
            let component = decoded.component;
            if self.registry.is_exclusive(component) {
                for existing in self.concrete_relation_ids(archetype, entity, component) {
                    if existing != id {
                        cs.delete(existing);
                    }
                }
            }
            if self.registry.is_dont_fragment(component) {
                let wildcard = relation(component, None).expect("component is valid");
                if !archetype.contains_component(wildcard) && !cs.is_staged_add(wildcard) {
                    cs.set(wildcard, sentinel());
                }
            }
        }
        cs.set(id, payload.unwrap_or_else(sentinel));
    }

    fn stage_remove(&self, cs: &mut Changeset, archetype: &Archetype, entity: Id, id: Id) {
        if id.is_wildcard() {
            let component = id.decode().expect("wildcard decodes").component;
            for existing in self.concrete_relation_ids(archetype, entity, component) {
                cs.delete(existing);
            }
            cs.delete(id);
            return;
        }

        cs.delete(id);
        if let Some(decoded) = id.decode() {
            let component = decoded.component;
            if self.registry.is_dont_fragment(component) {
                let remaining_after = self
                    .concrete_relation_ids(archetype, entity, component)
                    .into_iter()
                    .filter(|&rid| rid != id && !cs.is_staged_remove(rid))
                    .count();
                if remaining_after == 0 {
                    let wildcard = relation(component, None).expect("component is valid");
                    cs.delete(wildcard);
                }
            }
        }
    }

    /// Every concrete relation id of `component` currently held by
    /// `entity`, from both the archetype shape and the `dontFragment`
    /// side table.
    fn concrete_relation_ids(&self, archetype: &Archetype, entity: Id, component: Id) -> Vec<Id> {
        let row = archetype.row_of(entity).expect("entity resident in its archetype");
        let mut ids: Vec<Id> = archetype
            .concrete_relations(row, component)
            .into_iter()
            .map(|(target, _)| relation(component, Some(target)).expect("valid relation"))
            .collect();
        ids.extend(self.dont_fragment.concrete_relations(entity, component).into_iter().map(|(target, _)| {
            relation(component, Some(target)).expect("valid relation")
        }));
        ids
    }

    fn current_holds(&self, archetype: &Archetype, entity: Id, id: Id) -> bool {
        if id.is_wildcard() {
            return archetype.contains_component(id);
        }
        if self.registry.is_dont_fragment_relation(id) {
            return self.dont_fragment.get(entity, id).is_some();
        }
        archetype.contains_component(id)
    }

    /// `dontFragment` concrete relations never move archetypes -- their
    /// presence lives in the side table, not the shape.
    fn affects_shape(&self, id: Id) -> bool {
        !(self.registry.is_dont_fragment_relation(id) && !id.is_wildcard())
    }

    fn apply_changeset(&mut self, entity: Id, arch_idx: usize, mut cs: Changeset) -> Result<()> {
        {
            let archetype = self.archetypes[arch_idx].as_ref().expect("live archetype");
            cs.retain_removes(|id| self.current_holds(archetype, entity, id));
        }

        // No hooks registered: skip building the removed-payloads snapshot
        // and multi-hook bookkeeping entirely, there's nothing to dispatch.
        let has_hooks = !self.hooks.is_empty();
        let before = if has_hooks { self.snapshot_touched(arch_idx, entity, &cs) } else { HookValues::default() };
        let touched_multi = if has_hooks { self.relevant_multi_hooks(&cs) } else { Vec::new() };
        let before_required: Vec<(usize, bool)> = touched_multi
            .iter()
            .map(|&slot| {
                let selector = self.hooks.multi_selector(slot).expect("slot is live");
                let archetype = self.archetypes[arch_idx].as_ref().expect("live archetype");
                (slot, required_satisfied(&self.registry, archetype, &self.dont_fragment, entity, &selector.required))
            })
            .collect();

        let archetype = self.archetypes[arch_idx].as_ref().expect("live archetype");
        let needs_move = cs.adds().keys().any(|&id| self.affects_shape(id) && !archetype.contains_component(id))
            || cs.removes().iter().any(|&id| self.affects_shape(id) && archetype.contains_component(id));

        // `dontFragment` concrete relations always land in the side table,
        // whether or not this edit also triggers a structural move.
        for (&id, payload) in cs.adds() {
            if self.registry.is_dont_fragment_relation(id) && !id.is_wildcard() {
                self.dont_fragment.set(entity, id, payload.clone());
            }
        }
        for &id in cs.removes() {
            if self.registry.is_dont_fragment_relation(id) && !id.is_wildcard() {
                self.dont_fragment.remove(entity, id);
            }
        }

        let new_arch_idx = if needs_move {
            self.move_entity(entity, arch_idx, &cs)?
        } else {
            let archetype = self.archetypes[arch_idx].as_mut().expect("live archetype");
            let row = archetype.row_of(entity).expect("entity resident");
            for (&id, payload) in cs.adds() {
                if self.affects_shape(id) {
                    archetype.set(row, id, payload.clone());
                }
            }
            arch_idx
        };

        for (&id, _) in cs.adds() {
            self.track_reference(entity, id, true);
        }
        for &id in cs.removes() {
            self.track_reference(entity, id, false);
        }

        if has_hooks {
            self.dispatch_hooks(entity, new_arch_idx, &cs, &before, &touched_multi, &before_required);
        }
        Ok(())
    }

    fn move_entity(&mut self, entity: Id, arch_idx: usize, cs: &Changeset) -> Result<usize> {
        let existing: HashSet<Id> = self.archetypes[arch_idx]
            .as_ref()
            .expect("live archetype")
            .shape()
            .iter()
            .copied()
            .collect();
        let final_shape = cs.final_types(&existing, |id| self.affects_shape(id));
        let shape: Vec<Id> = final_shape.into_iter().collect();
        let new_arch_idx = self.ensure_archetype(shape);

        let old_row = self.archetypes[arch_idx]
            .as_mut()
            .expect("live archetype")
            .row_of(entity)
            .expect("entity resident");
        let (mut payloads, swapped) = self.archetypes[arch_idx].as_mut().expect("live archetype").remove(old_row);
        if let Some(swapped_entity) = swapped {
            self.entity_location.insert(swapped_entity, arch_idx);
        }
        cs.apply_to(&mut payloads);

        self.archetypes[new_arch_idx].as_mut().expect("just ensured").add(entity, payloads);
        self.entity_location.insert(entity, new_arch_idx);

        if arch_idx != new_arch_idx {
            self.maybe_gc_archetype(arch_idx);
        }
        Ok(new_arch_idx)
    }

    fn track_reference(&mut self, entity: Id, id: Id, adding: bool) {
        let target = match id.decode() {
            Some(d) => match d.target {
                Target::Entity(t) => Some(t),
                _ => None,
            },
            None if id.is_entity() => Some(id),
            None => None,
        };
        let Some(target) = target else { return };
        if adding {
            self.reference_index.track(target, entity, id);
        } else {
            self.reference_index.untrack(target, entity, id);
        }
    }

    // ---- Hook dispatch ------------------------------------------------------

    fn relevant_multi_hooks(&self, cs: &Changeset) -> Vec<usize> {
        self.hooks
            .multi_hooks()
            .filter(|(_, selector)| {
                selector
                    .required
                    .iter()
                    .chain(selector.optional.iter())
                    .any(|&id| cs.adds().contains_key(&id) || cs.removes().contains(&id))
            })
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Pre-mutation values for every id this changeset touches, across
    /// the changeset's own ids and every relevant multi-hook's full
    /// selector (required + optional) -- needed for `on_remove`'s
    /// pre-remove snapshot and for multi-hook "current value" reporting.
    fn snapshot_touched(&self, arch_idx: usize, entity: Id, cs: &Changeset) -> HookValues {
        let mut ids: HashSet<Id> = cs.adds().keys().copied().collect();
        ids.extend(cs.removes().iter().copied());
        for (_, selector) in self.hooks.multi_hooks() {
            ids.extend(selector.required.iter().copied());
            ids.extend(selector.optional.iter().copied());
        }

        let archetype = self.archetypes[arch_idx].as_ref().expect("live archetype");
        let mut values = HookValues::default();
        for id in ids {
            if let Some(row) = archetype.row_of(entity) {
                if let Some(payload) = archetype.get(row, id) {
                    values.insert(id, payload.clone());
                    continue;
                }
            }
            if let Some(payload) = self.dont_fragment.get(entity, id) {
                values.insert(id, payload.clone());
            }
        }
        values
    }

    fn dispatch_hooks(
        &mut self,
        entity: Id,
        new_arch_idx: usize,
        cs: &Changeset,
        before: &HookValues,
        touched_multi: &[usize],
        before_required: &[(usize, bool)],
    ) {
        // Each call below builds a fresh `Commands` borrowing only
        // `self.command_buffer` -- a field disjoint from `hooks` and
        // `archetypes`, so a hook can stage further mutations without
        // needing `&mut World` itself (which would alias this method's
        // own `&mut self`). The borrow is scoped to the single dispatch
        // call so it never overlaps the `&self` reads (`read_value`,
        // `before.get`) used to build each trigger's snapshot. Anything a
        // hook stages lands in the next `World::sync` drain round.
        for (&id, payload) in cs.adds() {
            let mut values = HookValues::default();
            values.insert(id, payload.clone());
            for key in self.hooks.single_hooks_for(id) {
                let mut cmds = Commands::new(&mut self.command_buffer);
                self.hooks.fire_single(Trigger::Set, key, entity, &values, &mut cmds);
            }
        }
        for &id in cs.removes() {
            let mut values = HookValues::default();
            if let Some(payload) = before.get(&id) {
                values.insert(id, payload.clone());
            }
            for key in self.hooks.single_hooks_for(id) {
                let mut cmds = Commands::new(&mut self.command_buffer);
                self.hooks.fire_single(Trigger::Remove, key, entity, &values, &mut cmds);
            }
        }

        for &slot in touched_multi {
            let selector = match self.hooks.multi_selector(slot) {
                Some(s) => MultiSelector { required: s.required.clone(), optional: s.optional.clone() },
                None => continue,
            };
            let was_satisfied = before_required.iter().find(|(s, _)| *s == slot).map(|(_, v)| *v).unwrap_or(false);
            let touched_required_remove =
                cs.removes().iter().any(|id| selector.required.contains(id));
            // `on_set` only fires after an add -- a remove of an optional
            // member while the required set stays satisfied is not a
            // "now satisfied" transition and must not retrigger it.
            let touched_any = selector
                .required
                .iter()
                .chain(selector.optional.iter())
                .any(|id| cs.adds().contains_key(id));

            if touched_required_remove && was_satisfied {
                let mut values = HookValues::default();
                for &id in selector.required.iter().chain(selector.optional.iter()) {
                    if let Some(payload) = before.get(&id) {
                        values.insert(id, payload.clone());
                    }
                }
                let mut cmds = Commands::new(&mut self.command_buffer);
                self.hooks.fire_multi(Trigger::Remove, slot, entity, &values, &mut cmds);
            }

            if touched_any {
                let new_archetype = self.archetypes[new_arch_idx].as_ref().expect("live archetype");
                let now_satisfied =
                    required_satisfied(&self.registry, new_archetype, &self.dont_fragment, entity, &selector.required);
                if now_satisfied {
                    let mut values = HookValues::default();
                    for &id in selector.required.iter().chain(selector.optional.iter()) {
                        if let Some(v) = self.read_value(entity, id) {
                            if let crate::query::QueryValue::Value(p) = v {
                                values.insert(id, p);
                            }
                        }
                    }
                    let mut cmds = Commands::new(&mut self.command_buffer);
                    self.hooks.fire_multi(Trigger::Set, slot, entity, &values, &mut cmds);
                }
            }
        }
    }

    /// Replay `on_init` for every currently-resident holder of `id` at
    /// registration time. A wildcard `id` fans out to every concrete
    /// relation of its component, one callback invocation per target,
    /// merging the archetype shape with the `dontFragment` side table --
    /// the same merge `World::read_value` applies to live reads. A
    /// concrete `dontFragment` relation is itself only ever found in the
    /// side table, since its archetype column never exists.
    pub(super) fn fire_init_single(&mut self, id: Id, callback: &mut dyn FnMut(&mut Commands, Id, &HookValues)) {
        let wildcard_component = id
            .decode()
            .filter(|d| matches!(d.target, Target::Wildcard))
            .map(|d| d.component);

        let World { archetypes, dont_fragment, command_buffer, registry, .. } = self;

        let concrete_dont_fragment_marker = if wildcard_component.is_none() && registry.is_dont_fragment_relation(id) {
            id.decode().and_then(|d| relation(d.component, None).ok())
        } else {
            None
        };

        for arch in archetypes.iter().flatten() {
            if let Some(component) = wildcard_component {
                if !arch.contains_component(id) && !arch.has_concrete_relation(component) {
                    continue;
                }
                arch.for_each_row(|entity, row| {
                    for (target, payload) in arch.concrete_relations(row, component) {
                        let concrete = relation(component, Some(target)).expect("valid relation");
                        let mut values = HookValues::default();
                        values.insert(concrete, payload.clone());
                        let mut cmds = Commands::new(command_buffer);
                        callback(&mut cmds, entity, &values);
                    }
                    for (target, payload) in dont_fragment.concrete_relations(entity, component) {
                        let concrete = relation(component, Some(target)).expect("valid relation");
                        let mut values = HookValues::default();
                        values.insert(concrete, payload.clone());
                        let mut cmds = Commands::new(command_buffer);
                        callback(&mut cmds, entity, &values);
                    }
                });
            } else if let Some(marker) = concrete_dont_fragment_marker {
                if !arch.contains_component(marker) {
                    continue;
                }
                arch.for_each_row(|entity, _row| {
                    if let Some(payload) = dont_fragment.get(entity, id) {
                        let mut values = HookValues::default();
                        values.insert(id, payload.clone());
                        let mut cmds = Commands::new(command_buffer);
                        callback(&mut cmds, entity, &values);
                    }
                });
            } else {
                if !arch.contains_component(id) {
                    continue;
                }
                arch.for_each_row(|entity, row| {
                    if let Some(payload) = arch.get(row, id) {
                        let mut values = HookValues::default();
                        values.insert(id, payload.clone());
                        let mut cmds = Commands::new(command_buffer);
                        callback(&mut cmds, entity, &values);
                    }
                });
            }
        }
    }

    pub(super) fn fire_init_multi(&mut self, selector: &MultiSelector, callback: &mut dyn FnMut(&mut Commands, Id, &HookValues)) {
        for (arch_idx, arch) in self.archetypes.iter().enumerate() {
            let Some(arch) = arch else { continue };
            if !candidate_for_required(&self.registry, arch, &selector.required) {
                continue;
            }
            let entities = arch.entities().to_vec();
            for entity in entities {
                if !required_satisfied(&self.registry, arch, &self.dont_fragment, entity, &selector.required) {
                    continue;
                }
                let mut values = HookValues::default();
                for &id in selector.required.iter().chain(selector.optional.iter()) {
                    if let Some(payload) = self.read_value(entity, id) {
                        if let crate::query::QueryValue::Value(p) = payload {
                            values.insert(id, p);
                        }
                    }
                }
                let mut cmds = Commands::new(&mut self.command_buffer);
                callback(&mut cmds, entity, &values);
            }
            let _ = arch_idx;
        }
    }
}

/// True if every `required` id is currently present on `entity`, reading
/// both the archetype shape and the `dontFragment` side table.
fn required_satisfied(
    registry: &Registry,
    archetype: &Archetype,
    side_table: &crate::world::DontFragmentTable,
    entity: Id,
    required: &[Id],
) -> bool {
    required.iter().all(|&id| {
        if id.is_wildcard() {
            let component = id.decode().expect("wildcard decodes").component;
            archetype.contains_component(id) || archetype.has_concrete_relation(component)
        } else if registry.is_dont_fragment_relation(id) {
            side_table.get(entity, id).is_some()
        } else {
            archetype.contains_component(id)
        }
    })
}

/// Shape-only candidacy test (ignores the side table, which is per-entity
/// and unknown at archetype-creation time): used to seed an archetype's
/// cached multi-hook matches.
fn candidate_for_required(registry: &Registry, archetype: &Archetype, required: &[Id]) -> bool {
    required.iter().all(|&id| {
        if registry.is_dont_fragment_relation(id) && !id.is_wildcard() {
            // Can't be decided from shape alone; stay conservative.
            true
        } else if id.is_wildcard() {
            let component = id.decode().expect("wildcard decodes").component;
            archetype.contains_component(id) || archetype.has_concrete_relation(component)
        } else {
            archetype.contains_component(id)
        }
    })
}

pub(super) fn candidate_hooks(registry: &Registry, hooks: &HookRegistry, archetype: &Archetype) -> Vec<usize> {
    hooks
        .multi_hooks()
        .filter(|(_, selector)| candidate_for_required(registry, archetype, &selector.required))
        .map(|(slot, _)| slot)
        .collect()
}
