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

//! The world: central entity, archetype, and subsystem storage.
//!
//! Mutations through [`World::set`]/[`World::remove`]/[`World::delete`]
//! are deferred onto a [`CommandBuffer`] and only take effect once
//! [`World::sync`] drains it -- single-threaded, cooperative, no
//! background work, matching the Concurrency & Resource Model.

mod cascade;
mod commands;
mod snapshot;

pub use cascade::{DontFragmentTable, ReferenceIndex};

use ahash::AHashMap;
use rustc_hash::FxHashMap;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::alloc::EntityAllocator;
use crate::archetype::{Archetype, Payload};
use crate::command::CommandBuffer;
use crate::error::{EcsError, Result};
use crate::hooks::{HookCallbacks, HookHandle, HookRegistry, MultiSelector};
use crate::id::Id;
use crate::query::{build_column_plan, project_row, QueryEngine, QueryValue, Selector};
use crate::registry::{ComponentFlags, Registry};

/// A hard cap on command-drain rounds within one [`World::sync`] call.
/// Guards against a hook that unconditionally re-enqueues work.
const MAX_DRAIN_ITERATIONS: usize = 100;

pub struct World {
    registry: Registry,
    entity_alloc: EntityAllocator,

    archetypes: Vec<Option<Archetype>>,
    archetype_index: AHashMap<Vec<Id>, usize>,
    free_archetype_slots: Vec<usize>,

    entity_location: FxHashMap<Id, usize>,

    reference_index: ReferenceIndex,
    dont_fragment: DontFragmentTable,

    command_buffer: CommandBuffer,
    hooks: HookRegistry,
    queries: QueryEngine,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let mut world = Self {
            registry: Registry::new(),
            entity_alloc: EntityAllocator::new(),
            archetypes: Vec::new(),
            archetype_index: AHashMap::new(),
            free_archetype_slots: Vec::new(),
            entity_location: FxHashMap::default(),
            reference_index: ReferenceIndex::new(),
            dont_fragment: DontFragmentTable::new(),
            command_buffer: CommandBuffer::new(),
            hooks: HookRegistry::new(),
            queries: QueryEngine::new(),
        };
        // Archetype 0 is always the empty shape, simplifying `new_entity`.
        world.ensure_archetype(Vec::new());
        world
    }

    // ---- Component registry -------------------------------------------------

    pub fn component(&mut self, flags: ComponentFlags, name: Option<&str>) -> Result<Id> {
        self.registry.component(flags, name)
    }

    pub fn relation(&self, component: Id, target: Option<Id>) -> Result<Id> {
        self.registry.relation(component, target)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ---- Entity lifecycle ----------------------------------------------------

    pub fn new_entity(&mut self) -> Result<Id> {
        let entity = self.entity_alloc.alloc()?;
        let empty_idx = self.ensure_archetype(Vec::new());
        let arch = self.archetypes[empty_idx].as_mut().expect("just ensured");
        arch.add(entity, FxHashMap::default());
        self.entity_location.insert(entity, empty_idx);
        Ok(entity)
    }

    /// True while the entity is resident in some archetype -- including
    /// entities with a pending `delete` not yet `sync`'d (deletion is
    /// deferred, so the contract here is "true until the drain actually
    /// removes it").
    pub fn exists(&self, entity: Id) -> bool {
        self.entity_location.contains_key(&entity)
    }

    /// Queue a deferred delete; cascades (§4.8) run during `sync`.
    pub fn delete(&mut self, entity: Id) -> Result<()> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.command_buffer.destroy(entity);
        Ok(())
    }

    // ---- Components ------------------------------------------------------

    /// Queue a deferred `set`. `payload` of `None` stages the component
    /// with the presence sentinel (a tag, or an explicit `undefined`).
    pub fn set(&mut self, entity: Id, id: Id, payload: Option<Payload>) -> Result<()> {
        if id.is_wildcard() {
            return Err(EcsError::CannotSetWildcardDirectly);
        }
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.command_buffer.set(entity, id, payload);
        Ok(())
    }

    pub fn remove(&mut self, entity: Id, id: Id) -> Result<()> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.command_buffer.remove(entity, id);
        Ok(())
    }

    pub fn get(&self, entity: Id, id: Id) -> Result<QueryValue> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.read_value(entity, id).ok_or(EcsError::ComponentNotOnEntity)
    }

    pub fn get_optional(&self, entity: Id, id: Id) -> Result<Option<QueryValue>> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        Ok(self.read_value(entity, id))
    }

    pub fn has(&self, entity: Id, id: Id) -> bool {
        self.exists(entity) && self.read_value(entity, id).is_some()
    }

    pub(crate) fn read_value(&self, entity: Id, id: Id) -> Option<QueryValue> {
        let arch_idx = *self.entity_location.get(&entity)?;
        let archetype = self.archetypes[arch_idx].as_ref()?;
        let row = archetype.row_of(entity)?;

        if id.is_wildcard() {
            let component = id.decode()?.component;
            let mut relations: Vec<(Id, Payload)> = archetype
                .concrete_relations(row, component)
                .into_iter()
                .map(|(t, p)| (t, p.clone()))
                .collect();
            relations.extend(
                self.dont_fragment
                    .concrete_relations(entity, component)
                    .into_iter()
                    .map(|(t, p)| (t, p.clone())),
            );
            if relations.is_empty() && !archetype.contains_component(id) {
                return None;
            }
            return Some(QueryValue::Relations(relations));
        }

        if self.registry.is_dont_fragment_relation(id) {
            return self
                .dont_fragment
                .get(entity, id)
                .map(|p| QueryValue::Value(p.clone()));
        }

        archetype.get(row, id).map(|p| QueryValue::Value(p.clone()))
    }

    // ---- Sync / command drain ----------------------------------------------

    /// Drain every deferred command. Commands for the same entity are
    /// observed in submission order; order across entities within one
    /// call is unspecified. See [`crate::command::CommandBuffer`] for the
    /// round mechanics.
    pub fn sync(&mut self) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.sync", queued = self.command_buffer.len());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let mut iterations = 0usize;
        loop {
            if self.command_buffer.is_empty() {
                break;
            }
            iterations += 1;
            if iterations > MAX_DRAIN_ITERATIONS {
                return Err(EcsError::CommandDrainTooDeep { entity: None, depth: iterations });
            }

            let mut buffer = std::mem::take(&mut self.command_buffer);
            let result = buffer.drain_round(|entity, cmds| self.process_entity_commands(entity, cmds));
            self.command_buffer.absorb_reusable(buffer);
            result?;
        }
        Ok(())
    }

    // ---- Archetype bookkeeping ---------------------------------------------

    /// Resolve (creating if necessary) the archetype for an exact, sorted
    /// shape, returning its slot index.
    pub(crate) fn ensure_archetype(&mut self, mut shape: Vec<Id>) -> usize {
        shape.sort_unstable();
        shape.dedup();
        if let Some(&idx) = self.archetype_index.get(&shape) {
            return idx;
        }

        #[cfg(feature = "profiling")]
        let span = info_span!("world.create_archetype", components = shape.len());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let mut archetype = Archetype::new(shape.clone());
        archetype.set_matching_hooks(commands::candidate_hooks(&self.registry, &self.hooks, &archetype));

        let idx = if let Some(slot) = self.free_archetype_slots.pop() {
            self.archetypes[slot] = Some(archetype);
            slot
        } else {
            self.archetypes.push(Some(archetype));
            self.archetypes.len() - 1
        };
        self.archetype_index.insert(shape, idx);
        self.queries.offer_archetype(idx, self.archetypes[idx].as_ref().expect("just inserted"));
        idx
    }

    /// Drop an archetype slot once it's empty and not the bootstrap
    /// empty-shape archetype.
    pub(crate) fn maybe_gc_archetype(&mut self, idx: usize) {
        if idx == 0 {
            return;
        }
        let is_empty = matches!(&self.archetypes[idx], Some(a) if a.is_empty());
        if !is_empty {
            return;
        }
        let shape = self.archetypes[idx].as_ref().unwrap().shape().to_vec();
        self.archetypes[idx] = None;
        self.archetype_index.remove(&shape);
        self.free_archetype_slots.push(idx);
        self.queries.remove_archetype(idx);
    }

    // ---- Queries -------------------------------------------------------------

    pub fn create_query(&mut self, selectors: Vec<Selector>) -> usize {
        self.queries.create_query(selectors, &self.archetypes)
    }

    pub fn release_query(&mut self, query_id: usize) {
        self.queries.release_query(query_id);
    }

    /// Iterate every row currently matching `query_id`, in archetype
    /// order. Optional selectors yield `QueryValue::Missing`; wildcard
    /// selectors yield `QueryValue::Relations`.
    pub fn query_for_each<F: FnMut(Id, &[QueryValue])>(&self, query_id: usize, mut f: F) {
        let Some(selectors) = self.queries.selectors_of(query_id) else { return };
        let selectors = selectors.to_vec();
        for &arch_idx in self.queries.matching_archetypes(query_id) {
            let Some(archetype) = self.archetypes[arch_idx].as_ref() else { continue };
            let plan = build_column_plan(&selectors, archetype);
            archetype.for_each_row(|entity, row| {
                let values = project_row(&plan, archetype, row, entity, &self.dont_fragment);
                f(entity, &values);
            });
        }
    }

    // ---- Hooks -----------------------------------------------------------

    /// Subscribe to one id (concrete component, concrete relation, or
    /// wildcard relation -- which fans out to every concrete relation of
    /// its component). `on_init` fires synchronously, before this call
    /// returns, for every entity currently holding a match.
    pub fn hook(&mut self, id: Id, mut callbacks: HookCallbacks) -> HookHandle {
        if let Some(on_init) = callbacks.on_init.take() {
            let mut on_init = on_init;
            self.fire_init_single(id, on_init.as_mut());
            callbacks.on_init = Some(on_init);
        }
        self.hooks.register_single(id, callbacks)
    }

    /// Subscribe to a required/optional selector list. `on_init` fires
    /// synchronously for every entity already satisfying every required
    /// member.
    pub fn hook_multi(&mut self, selector: MultiSelector, mut callbacks: HookCallbacks) -> HookHandle {
        if let Some(on_init) = callbacks.on_init.take() {
            let mut on_init = on_init;
            self.fire_init_multi(&selector, on_init.as_mut());
            callbacks.on_init = Some(on_init);
        }
        let (handle, _slot) = self.hooks.register_multi(selector, callbacks);
        self.refresh_hook_caches();
        handle
    }

    pub fn unhook(&mut self, handle: HookHandle) {
        self.hooks.unregister(handle);
        self.refresh_hook_caches();
    }

    // ---- Introspection (testing only, see crate::debug) -----------------

    pub fn entity_count(&self) -> usize {
        self.entity_location.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Every live archetype slot, as `(slot index, archetype)`. Slot
    /// indices are stable until that archetype is garbage-collected.
    pub fn archetypes(&self) -> impl Iterator<Item = (usize, &Archetype)> {
        self.archetypes.iter().enumerate().filter_map(|(idx, slot)| slot.as_ref().map(|a| (idx, a)))
    }

    /// The archetype slot `entity` currently resides in, if it exists.
    pub fn archetype_of(&self, entity: Id) -> Option<&Archetype> {
        let idx = *self.entity_location.get(&entity)?;
        self.archetypes[idx].as_ref()
    }

    fn refresh_hook_caches(&mut self) {
        for slot in &mut self.archetypes {
            if let Some(archetype) = slot {
                let matching = commands::candidate_hooks(&self.registry, &self.hooks, archetype);
                archetype.set_matching_hooks(matching);
            }
        }
    }
}
