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

//! Hook dispatch: reactions to component lifecycle events.
//!
//! Single-component hooks watch one id (a concrete component, a concrete
//! relation, or a wildcard relation, which fans out to every concrete
//! relation of its component). Multi-component hooks watch a selector
//! list split into required and optional members. Both share the same
//! trigger pipeline and the same unsubscribe mechanics: an `Observer`-style
//! registry shape (register, fire, unregister) with plain closures
//! standing in for a trait object, exposed as
//! `hook(id_or_list, callbacks) -> unsubscribe`.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::archetype::Payload;
use crate::command::CommandBuffer;
use crate::id::Id;

/// Selector lists rarely exceed a handful of components; inline storage
/// avoids a heap hop on the hot dispatch path.
pub type SelectorList = SmallVec<[Id; 8]>;

/// A snapshot of component values passed to a hook callback. For a
/// single-component hook this holds exactly one entry; for a
/// multi-component hook it holds one entry per required/optional member
/// the entity currently has (or had, for `on_remove`'s removed members).
pub type HookValues = FxHashMap<Id, Payload>;

/// A deferred handle a hook callback uses to stage further mutations.
/// Wraps the world's own command buffer -- at dispatch time the world is
/// already borrowed mutably for the round in progress, so a callback
/// can't be handed `&mut World` without aliasing it; staging through this
/// handle instead means anything a hook enqueues lands in the *next*
/// drain round, the same deferred-mutation discipline `World::set`
/// itself follows.
pub struct Commands<'a> {
    buffer: &'a mut CommandBuffer,
}

impl<'a> Commands<'a> {
    pub(crate) fn new(buffer: &'a mut CommandBuffer) -> Self {
        Self { buffer }
    }

    pub fn set(&mut self, entity: Id, id: Id, payload: Option<Payload>) {
        self.buffer.set(entity, id, payload);
    }

    pub fn remove(&mut self, entity: Id, id: Id) {
        self.buffer.remove(entity, id);
    }

    pub fn delete(&mut self, entity: Id) {
        self.buffer.destroy(entity);
    }
}

pub type HookFn = Box<dyn FnMut(&mut Commands, Id, &HookValues)>;

/// The three lifecycle triggers a hook may subscribe to. Any subset may
/// be `None`.
#[derive(Default)]
pub struct HookCallbacks {
    pub on_init: Option<HookFn>,
    pub on_set: Option<HookFn>,
    pub on_remove: Option<HookFn>,
}

impl HookCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init(mut self, f: impl FnMut(&mut Commands, Id, &HookValues) + 'static) -> Self {
        self.on_init = Some(Box::new(f));
        self
    }

    pub fn on_set(mut self, f: impl FnMut(&mut Commands, Id, &HookValues) + 'static) -> Self {
        self.on_set = Some(Box::new(f));
        self
    }

    pub fn on_remove(mut self, f: impl FnMut(&mut Commands, Id, &HookValues) + 'static) -> Self {
        self.on_remove = Some(Box::new(f));
        self
    }
}

struct SingleHook {
    id: usize,
    callbacks: HookCallbacks,
}

/// A multi-component hook's selector: at least one required member, any
/// number of optional ones.
pub struct MultiSelector {
    pub required: SelectorList,
    pub optional: SelectorList,
}

struct MultiHook {
    selector: MultiSelector,
    callbacks: HookCallbacks,
}

/// A handle returned by registration. Unsubscribing is idempotent --
/// calling it twice, or after the registry that issued it is gone, is a
/// harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookHandle {
    pub(crate) id: usize,
    pub(crate) kind: HookKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    Single,
    Multi,
}

/// Owns every registered hook. Single-component hooks are keyed by the
/// exact id they watch (including wildcard relation ids, stored as-is --
/// fan-out happens at dispatch time, not storage time). Multi-component
/// hooks live in a slot array so archetypes can cache stable indices into
/// it (see `Archetype::matching_hooks`).
#[derive(Default)]
pub struct HookRegistry {
    next_id: usize,
    single: FxHashMap<Id, Vec<SingleHook>>,
    multi: Vec<Option<MultiHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn register_single(&mut self, id: Id, callbacks: HookCallbacks) -> HookHandle {
        let handle_id = self.alloc_id();
        self.single
            .entry(id)
            .or_default()
            .push(SingleHook { id: handle_id, callbacks });
        HookHandle { id: handle_id, kind: HookKind::Single }
    }

    pub(crate) fn register_multi(&mut self, selector: MultiSelector, callbacks: HookCallbacks) -> (HookHandle, usize) {
        let slot = self.multi.len();
        self.multi.push(Some(MultiHook { selector, callbacks }));
        (HookHandle { id: slot, kind: HookKind::Multi }, slot)
    }

    pub(crate) fn unregister(&mut self, handle: HookHandle) {
        match handle.kind {
            HookKind::Single => {
                for hooks in self.single.values_mut() {
                    hooks.retain(|h| h.id != handle.id);
                }
            }
            HookKind::Multi => {
                if let Some(slot) = self.multi.get_mut(handle.id) {
                    *slot = None;
                }
            }
        }
    }

    /// Single-component hooks that should react to `id` directly, plus
    /// any wildcard hook on `relation(component, *)` when `id` is a
    /// concrete relation of that component.
    pub(crate) fn single_hooks_for(&self, id: Id) -> Vec<Id> {
        let mut keys = vec![id];
        if let Some(decoded) = id.decode() {
            if !matches!(decoded.target, crate::id::Target::Wildcard) {
                if let Ok(wildcard) = crate::id::relation(decoded.component, None) {
                    keys.push(wildcard);
                }
            }
        }
        keys
    }

    pub(crate) fn multi_hooks(&self) -> impl Iterator<Item = (usize, &MultiSelector)> {
        self.multi
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|h| (idx, &h.selector)))
    }

    pub(crate) fn fire_single(&mut self, trigger: Trigger, key: Id, entity: Id, values: &HookValues, cmds: &mut Commands) {
        let Some(hooks) = self.single.get_mut(&key) else { return };
        for hook in hooks.iter_mut() {
            let cb = match trigger {
                Trigger::Init => &mut hook.callbacks.on_init,
                Trigger::Set => &mut hook.callbacks.on_set,
                Trigger::Remove => &mut hook.callbacks.on_remove,
            };
            if let Some(cb) = cb {
                cb(cmds, entity, values);
            }
        }
    }

    pub(crate) fn fire_multi(&mut self, trigger: Trigger, slot: usize, entity: Id, values: &HookValues, cmds: &mut Commands) {
        let Some(Some(hook)) = self.multi.get_mut(slot) else { return };
        let cb = match trigger {
            Trigger::Init => &mut hook.callbacks.on_init,
            Trigger::Set => &mut hook.callbacks.on_set,
            Trigger::Remove => &mut hook.callbacks.on_remove,
        };
        if let Some(cb) = cb {
            cb(cmds, entity, values);
        }
    }

    pub(crate) fn multi_selector(&self, slot: usize) -> Option<&MultiSelector> {
        self.multi.get(slot).and_then(|s| s.as_ref()).map(|h| &h.selector)
    }

    /// True if no single- or multi-component hook is currently registered
    /// -- lets `World::apply_changeset` skip building hook-dispatch
    /// snapshots entirely when there's nothing to dispatch to.
    pub(crate) fn is_empty(&self) -> bool {
        self.single.values().all(|hooks| hooks.is_empty()) && self.multi.iter().all(|slot| slot.is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Init,
    Set,
    Remove,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuffer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn id(n: i64) -> Id {
        Id::from_raw(n)
    }

    #[test]
    fn single_hook_fires_on_registered_trigger() {
        let mut registry = HookRegistry::new();
        let calls = Rc::new(RefCell::new(0));
        let calls_clone = calls.clone();
        registry.register_single(
            id(1),
            HookCallbacks::new().on_set(move |_cmds, _e, _v| {
                *calls_clone.borrow_mut() += 1;
            }),
        );
        let values = HookValues::default();
        let mut buffer = CommandBuffer::new();
        let mut cmds = Commands::new(&mut buffer);
        registry.fire_single(Trigger::Set, id(1), id(1024), &values, &mut cmds);
        assert_eq!(*calls.borrow(), 1);
        registry.fire_single(Trigger::Remove, id(1), id(1024), &values, &mut cmds);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = HookRegistry::new();
        let handle = registry.register_single(id(1), HookCallbacks::new());
        registry.unregister(handle);
        registry.unregister(handle);
    }

    #[test]
    fn wildcard_keys_include_concrete_relations_component() {
        let registry = HookRegistry::new();
        let comp = id(3);
        let target = id(1024);
        let concrete = crate::id::relation(comp, Some(target)).unwrap();
        let keys = registry.single_hooks_for(concrete);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], concrete);
        assert_eq!(keys[1], crate::id::relation(comp, None).unwrap());
    }
}
