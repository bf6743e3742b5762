//! Component registry: per-component flags and optional unique names.
//!
//! A registry is a plain value -- no process-wide `static`, just a
//! struct a [`crate::world::World`] owns and callers can construct
//! standalone for tooling or tests, so multiple worlds can be embedded
//! in one process without sharing state. Registration never mutates or
//! recycles a descriptor once issued.

use rustc_hash::FxHashMap;

use crate::alloc::ComponentAllocator;
use crate::bitset::BitSet;
use crate::error::{EcsError, Result};
use crate::id::{Id, Target};

/// The three independent boolean flags a component may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentFlags {
    /// At most one relation of this component may exist on an entity.
    pub exclusive: bool,
    /// Deleting a relation's target cascades to delete its source too.
    pub cascade_delete: bool,
    /// Differing relation targets of this component share one archetype.
    pub dont_fragment: bool,
}

fn index_of(id: Id) -> usize {
    debug_assert!(id.is_component());
    (id.raw() - 1) as usize
}

/// Global-to-a-process (but not to-the-binary) component registry.
#[derive(Debug, Default)]
pub struct Registry {
    allocator: ComponentAllocator,
    exclusive: BitSet,
    cascade_delete: BitSet,
    dont_fragment: BitSet,
    names: Vec<Option<String>>,
    ids_by_name: FxHashMap<String, Id>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new component, reserving the next id and recording its
    /// flags and optional globally-unique name.
    pub fn component(&mut self, flags: ComponentFlags, name: Option<&str>) -> Result<Id> {
        if let Some(name) = name {
            if self.ids_by_name.contains_key(name) {
                return Err(EcsError::NameAlreadyRegistered(name.to_string()));
            }
        }

        let id = self.allocator.alloc()?;
        let idx = index_of(id);

        if flags.exclusive {
            self.exclusive.set(idx);
        }
        if flags.cascade_delete {
            self.cascade_delete.set(idx);
        }
        if flags.dont_fragment {
            self.dont_fragment.set(idx);
        }

        if self.names.len() <= idx {
            self.names.resize(idx + 1, None);
        }
        if let Some(name) = name {
            self.names[idx] = Some(name.to_string());
            self.ids_by_name.insert(name.to_string(), id);
        }

        Ok(id)
    }

    /// Build a relation id `relation(component, target)`, delegating the
    /// packing itself to [`crate::id::relation`].
    pub fn relation(&self, component: Id, target: Option<Id>) -> Result<Id> {
        crate::id::relation(component, target)
    }

    pub fn options_of(&self, id: Id) -> ComponentFlags {
        if !id.is_component() {
            return ComponentFlags::default();
        }
        let idx = index_of(id);
        ComponentFlags {
            exclusive: self.exclusive.contains(idx),
            cascade_delete: self.cascade_delete.contains(idx),
            dont_fragment: self.dont_fragment.contains(idx),
        }
    }

    pub fn name_of(&self, id: Id) -> Option<&str> {
        if !id.is_component() {
            return None;
        }
        self.names.get(index_of(id))?.as_deref()
    }

    pub fn id_by_name(&self, name: &str) -> Option<Id> {
        self.ids_by_name.get(name).copied()
    }

    /// How many components have been registered, for callers that need
    /// to walk every id `1..=component_count()` (e.g. snapshotting the
    /// registry itself).
    pub fn component_count(&self) -> usize {
        self.allocator.allocated_count()
    }

    pub fn is_exclusive(&self, id: Id) -> bool {
        id.is_component() && self.exclusive.contains(index_of(id))
    }

    pub fn is_cascade_delete(&self, id: Id) -> bool {
        id.is_component() && self.cascade_delete.contains(index_of(id))
    }

    pub fn is_dont_fragment(&self, id: Id) -> bool {
        id.is_component() && self.dont_fragment.contains(index_of(id))
    }

    /// True if `id` is a relation whose component is `dontFragment`
    /// (regardless of whether it's the wildcard marker or a concrete
    /// target).
    pub fn is_dont_fragment_relation(&self, id: Id) -> bool {
        match id.decode() {
            Some(d) => self.is_dont_fragment(d.component),
            None => false,
        }
    }

    /// True for the wildcard marker `relation(C, "*")` of a `dontFragment`
    /// component `C`.
    pub fn is_dont_fragment_wildcard(&self, id: Id) -> bool {
        match id.decode() {
            Some(d) => matches!(d.target, Target::Wildcard) && self.is_dont_fragment(d.component),
            None => false,
        }
    }

    pub fn is_exclusive_relation(&self, id: Id) -> bool {
        match id.decode() {
            Some(d) => self.is_exclusive(d.component),
            None => false,
        }
    }

    /// True only for *entity*-relations of a `cascadeDelete` component --
    /// cascade deletion only makes sense when the target is itself an
    /// entity that can be destroyed.
    pub fn is_cascade_delete_relation(&self, id: Id) -> bool {
        match id.decode() {
            Some(d) => matches!(d.target, Target::Entity(_)) && self.is_cascade_delete(d.component),
            None => false,
        }
    }
}
