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

//! Columnar storage for one exact shape.
//!
//! A shape is the sorted sequence of non-`dontFragment` component ids an
//! archetype represents (`dontFragment` components contribute only their
//! wildcard marker). Storage is structure-of-arrays: one entity list, one
//! column per shape id, row removal by swap-and-pop. Component payloads
//! are dynamically typed (a component descriptor carries no Rust type),
//! so columns hold [`Payload`] values rather than raw byte buffers keyed
//! by `TypeId` -- there's no static type to erase a pointer to here, so
//! there's nothing for `unsafe` to buy us.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::id::{Id, Target};

/// A component's value. `Payload::Null` is the sentinel for "this slot is
/// present but its payload is deliberately absent" (a tag component, or
/// an explicit `undefined`) -- distinct from the column not existing at
/// all, which `get`/`column_index` report as `None`.
pub type Payload = serde_json::Value;

pub fn sentinel() -> Payload {
    Payload::Null
}

/// The sorted, deduplicated sequence of ids identifying an archetype.
pub type Shape = Vec<Id>;

/// Columnar storage for every entity currently in one archetype.
pub struct Archetype {
    shape: Shape,
    entities: Vec<Id>,
    columns: Vec<Vec<Payload>>,
    row_of: FxHashMap<Id, usize>,
    column_cache: RefCell<FxHashMap<Vec<Id>, Vec<Option<usize>>>>,
    relation_column_cache: RefCell<FxHashMap<Id, Vec<(usize, Id)>>>,
    matching_hooks: Vec<usize>,
}

impl Archetype {
    pub fn new(shape: Shape) -> Self {
        let columns = shape.iter().map(|_| Vec::new()).collect();
        Self {
            shape,
            entities: Vec::new(),
            columns,
            row_of: FxHashMap::default(),
            column_cache: RefCell::new(FxHashMap::default()),
            relation_column_cache: RefCell::new(FxHashMap::default()),
            matching_hooks: Vec::new(),
        }
    }

    pub fn shape(&self) -> &[Id] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Id] {
        &self.entities
    }

    pub fn contains_component(&self, id: Id) -> bool {
        self.shape.contains(&id)
    }

    pub fn column_index(&self, id: Id) -> Option<usize> {
        self.shape.iter().position(|&s| s == id)
    }

    pub fn row_of(&self, entity: Id) -> Option<usize> {
        self.row_of.get(&entity).copied()
    }

    /// Add `entity` as a new row. `payloads` should cover the shape;
    /// missing shape ids are backfilled with [`sentinel`].
    pub fn add(&mut self, entity: Id, mut payloads: FxHashMap<Id, Payload>) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        for (col_idx, &id) in self.shape.iter().enumerate() {
            let value = payloads.remove(&id).unwrap_or_else(sentinel);
            self.columns[col_idx].push(value);
        }
        self.row_of.insert(entity, row);
        row
    }

    /// Remove `row`, returning its payload map and the entity (if any)
    /// that was swapped into the vacated slot.
    pub fn remove(&mut self, row: usize) -> (FxHashMap<Id, Payload>, Option<Id>) {
        let mut removed = FxHashMap::default();
        let removed_entity = self.entities.swap_remove(row);
        self.row_of.remove(&removed_entity);

        for (col_idx, &id) in self.shape.iter().enumerate() {
            let value = self.columns[col_idx].swap_remove(row);
            removed.insert(id, value);
        }

        let swapped = if row < self.entities.len() {
            let swapped_entity = self.entities[row];
            self.row_of.insert(swapped_entity, row);
            Some(swapped_entity)
        } else {
            None
        };

        (removed, swapped)
    }

    pub fn get(&self, row: usize, id: Id) -> Option<&Payload> {
        let col_idx = self.column_index(id)?;
        self.columns[col_idx].get(row)
    }

    /// Read a value by a column index already resolved via
    /// [`Archetype::resolve_columns`] -- skips the shape scan `get` does.
    pub fn get_at(&self, col_idx: usize, row: usize) -> &Payload {
        &self.columns[col_idx][row]
    }

    pub fn get_mut(&mut self, row: usize, id: Id) -> Option<&mut Payload> {
        let col_idx = self.column_index(id)?;
        self.columns[col_idx].get_mut(row)
    }

    /// Overwrite the value at `id` for `row`. `id` must already be in the
    /// shape -- callers route `dontFragment` concrete relations to the
    /// side-table instead.
    pub fn set(&mut self, row: usize, id: Id, payload: Payload) -> bool {
        match self.column_index(id) {
            Some(col_idx) => {
                self.columns[col_idx][row] = payload;
                true
            }
            None => false,
        }
    }

    /// Concrete relations of `component` found directly in this
    /// archetype's own shape (as opposed to the `dontFragment` side
    /// table), for wildcard reads and wildcard query matching.
    pub fn concrete_relations(&self, row: usize, component: Id) -> Vec<(Id, &Payload)> {
        let mut out = Vec::new();
        for (col_idx, &shape_id) in self.shape.iter().enumerate() {
            if let Some(decoded) = shape_id.decode() {
                if decoded.component != component {
                    continue;
                }
                let target = match decoded.target {
                    Target::Entity(t) | Target::Component(t) => t,
                    Target::Wildcard => continue,
                };
                out.push((target, &self.columns[col_idx][row]));
            }
        }
        out
    }

    /// True if this archetype's shape has at least one concrete relation
    /// (not the wildcard marker) of `component`.
    pub fn has_concrete_relation(&self, component: Id) -> bool {
        self.shape.iter().any(|id| {
            id.decode()
                .is_some_and(|d| d.component == component && !matches!(d.target, Target::Wildcard))
        })
    }

    /// Resolve (and memoize) the column indices for a selector list --
    /// `None` per entry means that id is not in this shape. Memoized
    /// behind a `RefCell` so query iteration can resolve once per matching
    /// archetype through a shared `&self`, the same shape the teacher's
    /// own query cache takes.
    pub fn resolve_columns(&self, ids: &[Id]) -> Vec<Option<usize>> {
        if let Some(cached) = self.column_cache.borrow().get(ids) {
            return cached.clone();
        }
        let resolved: Vec<Option<usize>> = ids.iter().map(|&id| self.column_index(id)).collect();
        self.column_cache.borrow_mut().insert(ids.to_vec(), resolved.clone());
        resolved
    }

    /// Resolve (and memoize) the `(column, target)` pairs for every
    /// concrete relation of `component` in this shape, so a wildcard
    /// selector's projection doesn't rescan the shape on every row.
    pub fn resolve_relation_columns(&self, component: Id) -> Vec<(usize, Id)> {
        if let Some(cached) = self.relation_column_cache.borrow().get(&component) {
            return cached.clone();
        }
        let resolved: Vec<(usize, Id)> = self
            .shape
            .iter()
            .enumerate()
            .filter_map(|(col_idx, &shape_id)| {
                let decoded = shape_id.decode()?;
                if decoded.component != component {
                    return None;
                }
                match decoded.target {
                    Target::Entity(t) | Target::Component(t) => Some((col_idx, t)),
                    Target::Wildcard => None,
                }
            })
            .collect();
        self.relation_column_cache.borrow_mut().insert(component, resolved.clone());
        resolved
    }

    pub fn for_each_row<F: FnMut(Id, usize)>(&self, mut f: F) {
        for (row, &entity) in self.entities.iter().enumerate() {
            f(entity, row);
        }
    }

    pub fn matching_hooks(&self) -> &[usize] {
        &self.matching_hooks
    }

    pub fn set_matching_hooks(&mut self, hooks: Vec<usize>) {
        self.matching_hooks = hooks;
    }
}
