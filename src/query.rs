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

//! Cached, ref-counted queries over archetypes.
//!
//! A query's matching archetype list is maintained incrementally: new
//! archetypes are offered to every live query as they're created, and
//! removed archetypes are dropped from every query's list. Iteration
//! reuses each archetype's memoized column-index bundle rather than
//! re-resolving selectors every call.

use rustc_hash::FxHashMap;

use crate::archetype::{Archetype, Payload};
use crate::id::Id;
use crate::world::DontFragmentTable;

/// One member of a query's selector list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub id: Id,
    pub optional: bool,
}

impl Selector {
    pub fn required(id: Id) -> Self {
        Self { id, optional: false }
    }

    pub fn optional(id: Id) -> Self {
        Self { id, optional: true }
    }
}

/// The projected value for one selector on one row.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// A concrete, required selector's payload.
    Value(Payload),
    /// An optional selector the entity doesn't currently hold.
    Missing,
    /// A wildcard selector's matches: `(target, payload)` per concrete
    /// relation of that component found on this entity.
    Relations(Vec<(Id, Payload)>),
}

struct Query {
    selectors: Vec<Selector>,
    matching: Vec<usize>,
    ref_count: usize,
}

fn cache_key(selectors: &[Selector]) -> Vec<(i64, bool)> {
    let mut key: Vec<(i64, bool)> = selectors.iter().map(|s| (s.id.raw(), s.optional)).collect();
    key.sort_unstable();
    key
}

/// Registry of live, cached queries.
#[derive(Default)]
pub struct QueryEngine {
    next_id: usize,
    by_key: FxHashMap<Vec<(i64, bool)>, usize>,
    queries: FxHashMap<usize, Query>,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `id` (a required selector) matches `archetype`'s shape.
    fn required_matches(id: Id, archetype: &Archetype) -> bool {
        if id.is_wildcard() {
            let component = id.decode().expect("wildcard decodes").component;
            archetype.contains_component(id) || archetype.has_concrete_relation(component)
        } else {
            archetype.contains_component(id)
        }
    }

    fn archetype_matches(selectors: &[Selector], archetype: &Archetype) -> bool {
        selectors
            .iter()
            .filter(|s| !s.optional)
            .all(|s| Self::required_matches(s.id, archetype))
    }

    /// Create (or share) a cached query over `selectors`, testing every
    /// currently-live archetype to seed its matching list.
    pub fn create_query(&mut self, selectors: Vec<Selector>, archetypes: &[Option<Archetype>]) -> usize {
        let key = cache_key(&selectors);
        if let Some(&id) = self.by_key.get(&key) {
            self.queries.get_mut(&id).expect("cached query id exists").ref_count += 1;
            return id;
        }

        let matching: Vec<usize> = archetypes
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let arch = slot.as_ref()?;
                Self::archetype_matches(&selectors, arch).then_some(idx)
            })
            .collect();

        let id = self.next_id;
        self.next_id += 1;
        self.queries.insert(
            id,
            Query { selectors, matching, ref_count: 1 },
        );
        self.by_key.insert(key, id);
        id
    }

    /// Drop one reference to `query_id`; disposes it at zero.
    pub fn release_query(&mut self, query_id: usize) {
        let Some(query) = self.queries.get_mut(&query_id) else { return };
        query.ref_count -= 1;
        if query.ref_count == 0 {
            let key = cache_key(&query.selectors);
            self.queries.remove(&query_id);
            self.by_key.remove(&key);
        }
    }

    /// Offer a newly created archetype to every live query.
    pub fn offer_archetype(&mut self, archetype_idx: usize, archetype: &Archetype) {
        for query in self.queries.values_mut() {
            if Self::archetype_matches(&query.selectors, archetype) {
                query.matching.push(archetype_idx);
            }
        }
    }

    /// Drop a removed archetype from every query's matching list.
    pub fn remove_archetype(&mut self, archetype_idx: usize) {
        for query in self.queries.values_mut() {
            query.matching.retain(|&idx| idx != archetype_idx);
        }
    }

    pub fn selectors_of(&self, query_id: usize) -> Option<&[Selector]> {
        self.queries.get(&query_id).map(|q| q.selectors.as_slice())
    }

    pub fn matching_archetypes(&self, query_id: usize) -> &[usize] {
        self.queries.get(&query_id).map(|q| q.matching.as_slice()).unwrap_or(&[])
    }
}

/// Where one selector's values live in a given archetype, resolved once
/// per matching archetype and reused for every row -- building this per
/// row would mean a shape scan per selector per row.
pub enum ColumnPlan {
    /// A plain selector's column, or `None` if this archetype doesn't
    /// carry it (an unmatched optional).
    Column(Option<usize>),
    /// A wildcard selector's concrete relation columns in this
    /// archetype's own shape, plus the component they decode to (for
    /// merging in the `dontFragment` side table per row).
    Relations { component: Id, columns: Vec<(usize, Id)> },
}

/// Resolve `selectors` against `archetype` once, via
/// [`Archetype::resolve_columns`] / [`Archetype::resolve_relation_columns`]
/// (both memoized on the archetype), producing a plan `project_row` can
/// index directly for every row.
pub fn build_column_plan(selectors: &[Selector], archetype: &Archetype) -> Vec<ColumnPlan> {
    let plain_ids: Vec<Id> = selectors.iter().map(|s| s.id).collect();
    let resolved = archetype.resolve_columns(&plain_ids);
    selectors
        .iter()
        .zip(resolved)
        .map(|(selector, col)| {
            if selector.id.is_wildcard() {
                let component = selector.id.decode().expect("wildcard decodes").component;
                ColumnPlan::Relations { component, columns: archetype.resolve_relation_columns(component) }
            } else {
                ColumnPlan::Column(col)
            }
        })
        .collect()
}

/// Project one row's values from a plan built by [`build_column_plan`].
///
/// A wildcard selector's result merges concrete relations found directly
/// in the archetype's shape with any held in the `dontFragment` side
/// table for `entity` -- a `dontFragment` component's archetype only ever
/// carries the wildcard marker, so its concrete targets live only in
/// `dont_fragment` and would otherwise be silently dropped from query
/// results.
pub fn project_row(
    plan: &[ColumnPlan],
    archetype: &Archetype,
    row: usize,
    entity: Id,
    dont_fragment: &DontFragmentTable,
) -> Vec<QueryValue> {
    plan.iter()
        .map(|entry| match entry {
            ColumnPlan::Relations { component, columns } => {
                let mut values: Vec<(Id, Payload)> = columns
                    .iter()
                    .map(|&(col_idx, target)| (target, archetype.get_at(col_idx, row).clone()))
                    .collect();
                values.extend(
                    dont_fragment
                        .concrete_relations(entity, *component)
                        .into_iter()
                        .map(|(target, payload)| (target, payload.clone())),
                );
                QueryValue::Relations(values)
            }
            ColumnPlan::Column(Some(col_idx)) => QueryValue::Value(archetype.get_at(*col_idx, row).clone()),
            ColumnPlan::Column(None) => QueryValue::Missing,
        })
        .collect()
}
