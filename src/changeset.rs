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

//! A staged per-entity diff, built up while draining one entity's
//! commands and applied to storage in one shot.
//!
//! The two sides are kept disjoint as edits come in rather than
//! reconciled afterwards: `set` after a pending `delete` of the same id
//! cancels the delete (and vice versa), so by the time `apply_to` runs
//! there's nothing left to arbitrate.

use rustc_hash::FxHashMap;
use std::collections::HashSet;

use crate::archetype::Payload;
use crate::id::Id;

/// A staged, not-yet-applied edit to one entity's component set.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    adds: FxHashMap<Id, Payload>,
    removes: HashSet<Id>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    /// Stage `id → payload`. Cancels any pending removal of `id`.
    pub fn set(&mut self, id: Id, payload: Payload) {
        self.removes.remove(&id);
        self.adds.insert(id, payload);
    }

    /// Stage removal of `id`. Cancels any pending addition of `id`.
    pub fn delete(&mut self, id: Id) {
        self.adds.remove(&id);
        self.removes.insert(id);
    }

    pub fn adds(&self) -> &FxHashMap<Id, Payload> {
        &self.adds
    }

    pub fn removes(&self) -> &HashSet<Id> {
        &self.removes
    }

    pub fn is_staged_add(&self, id: Id) -> bool {
        self.adds.contains_key(&id)
    }

    pub fn is_staged_remove(&self, id: Id) -> bool {
        self.removes.contains(&id)
    }

    /// Drop staged removes that fail `keep` -- used to prune phantom
    /// removes of ids the entity never actually held.
    pub fn retain_removes(&mut self, mut keep: impl FnMut(Id) -> bool) {
        self.removes.retain(|&id| keep(id));
    }

    /// Apply removes then adds to `existing`, overwriting in place.
    pub fn apply_to(&self, existing: &mut FxHashMap<Id, Payload>) {
        for id in &self.removes {
            existing.remove(id);
        }
        for (&id, payload) in &self.adds {
            existing.insert(id, payload.clone());
        }
    }

    /// The id set `existing` would have after this changeset applies,
    /// without touching any payloads. `affects` restricts which staged
    /// ids are allowed to change the set -- callers exclude ids that
    /// never affect shape membership (e.g. `dontFragment` concrete
    /// relations, which live only in the side table).
    pub fn final_types(&self, existing: &HashSet<Id>, mut affects: impl FnMut(Id) -> bool) -> HashSet<Id> {
        let mut result: HashSet<Id> = existing
            .iter()
            .filter(|&&id| !(self.removes.contains(&id) && affects(id)))
            .copied()
            .collect();
        result.extend(self.adds.keys().copied().filter(|&id| affects(id)));
        result
    }
}
