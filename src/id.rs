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

//! Packed identifier algebra.
//!
//! A single `i64` namespace carries entities, components, and binary
//! relations. The sign and magnitude of the value classify it; relations
//! are packed as `-(component * 2^42 + target)` so that decoding never
//! allocates and never branches more than a handful of times.

use std::fmt;

use crate::error::{EcsError, Result};

/// Highest component id a [`crate::registry::Registry`] may hand out.
pub const COMPONENT_MAX: i64 = 1023;

/// First id available to the entity allocator.
pub const ENTITY_START: i64 = 1024;

/// Largest value representable without loss in a 53-bit safe integer,
/// mirrored here even though Rust's `i64` has more headroom, because the
/// wire format (see [`crate::snapshot`]) promises this range to callers
/// coming from dynamically-typed hosts.
pub const MAX_SAFE_INT: i64 = (1i64 << 53) - 1;

/// `component * TARGET_SHIFT + target` keeps every legal pairing under
/// [`MAX_SAFE_INT`] even when `target` is a very large entity id, while
/// still leaving the low bits free for the target itself.
const TARGET_SHIFT: i64 = 1 << 42;

/// A packed identifier: an entity, a component, or a relation between two
/// of them. Copy, totally ordered, and cheap to hash -- this is the
/// currency the whole crate trades in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(i64);

impl Id {
    /// The reserved value that never denotes a live entity, component, or
    /// relation.
    pub const INVALID: Id = Id(0);

    /// Raw packed value, for FFI-ish boundaries and snapshot encoding.
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Build an `Id` from an already-packed value without validation.
    ///
    /// Reserved for the allocators and the snapshot restorer, which are
    /// the only callers that can vouch for the value's provenance.
    pub(crate) fn from_raw(raw: i64) -> Id {
        Id(raw)
    }

    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }

    pub fn is_component(self) -> bool {
        self.0 >= 1 && self.0 <= COMPONENT_MAX
    }

    pub fn is_entity(self) -> bool {
        self.0 >= ENTITY_START
    }

    pub fn is_relation(self) -> bool {
        self.0 < 0
    }

    /// True for `relation(C, "*")`: a relation whose target slot is empty.
    pub fn is_wildcard(self) -> bool {
        matches!(self.decode(), Some(Decoded { target: Target::Wildcard, .. }))
    }

    pub fn is_entity_relation(self) -> bool {
        matches!(self.decode(), Some(Decoded { target: Target::Entity(_), .. }))
    }

    pub fn is_component_relation(self) -> bool {
        matches!(self.decode(), Some(Decoded { target: Target::Component(_), .. }))
    }

    /// Component half of a relation id, ignoring the target. Panics-free:
    /// returns `None` for anything that isn't a relation.
    pub fn relation_component(self) -> Option<Id> {
        self.decode().map(|d| d.component)
    }

    /// Full classification, branch-light and allocation-free.
    pub fn classify(self) -> Kind {
        if self.0 == 0 {
            Kind::Invalid
        } else if self.0 > 0 && self.0 <= COMPONENT_MAX {
            Kind::Component
        } else if self.0 >= ENTITY_START {
            Kind::Entity
        } else {
            match self.decode() {
                Some(Decoded { target: Target::Wildcard, .. }) => Kind::WildcardRelation,
                Some(Decoded { target: Target::Component(_), .. }) => Kind::ComponentRelation,
                Some(Decoded { target: Target::Entity(_), .. }) => Kind::EntityRelation,
                None => Kind::Invalid,
            }
        }
    }

    /// Decode a relation id into its `(component, target)` pair. `None`
    /// for anything that isn't a relation (decoding is total on any
    /// previously-constructed id, so this only returns `None` for
    /// non-relation ids, never a malformed relation).
    pub fn decode(self) -> Option<Decoded> {
        if self.0 >= 0 {
            return None;
        }
        let packed = -self.0;
        let component_raw = packed / TARGET_SHIFT;
        let target_raw = packed % TARGET_SHIFT;
        let component = Id(component_raw);
        let target = if target_raw == 0 {
            Target::Wildcard
        } else if target_raw <= COMPONENT_MAX {
            Target::Component(Id(target_raw))
        } else {
            Target::Entity(Id(target_raw))
        };
        Some(Decoded { component, target })
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some(Decoded { component, target: Target::Wildcard }) => {
                write!(f, "Id(relation({:?}, *))", component)
            }
            Some(Decoded { component, target: Target::Component(t) }) => {
                write!(f, "Id(relation({:?}, component {:?}))", component, t)
            }
            Some(Decoded { component, target: Target::Entity(t) }) => {
                write!(f, "Id(relation({:?}, entity {:?}))", component, t)
            }
            None => write!(f, "Id({})", self.0),
        }
    }
}

/// Result of [`Id::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Invalid,
    Component,
    Entity,
    EntityRelation,
    ComponentRelation,
    WildcardRelation,
}

/// Result of [`Id::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub component: Id,
    pub target: Target,
}

/// The target half of a relation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Wildcard,
    Component(Id),
    Entity(Id),
}

/// Build a relation id `relation(component, target)`.
///
/// `target` of `None` packs the wildcard marker `relation(component, "*")`.
/// Fails with [`EcsError::InvalidId`] if `component` isn't a component id,
/// if `target` is itself a relation, or if the packed form would exceed
/// [`MAX_SAFE_INT`].
pub fn relation(component: Id, target: Option<Id>) -> Result<Id> {
    if !component.is_component() {
        return Err(EcsError::InvalidId);
    }
    let target_raw = match target {
        None => 0,
        Some(t) => {
            if t.is_relation() {
                return Err(EcsError::InvalidId);
            }
            if t.is_invalid() {
                return Err(EcsError::InvalidId);
            }
            t.raw()
        }
    };
    let packed = component
        .raw()
        .checked_mul(TARGET_SHIFT)
        .and_then(|v| v.checked_add(target_raw))
        .ok_or(EcsError::InvalidId)?;
    if packed > MAX_SAFE_INT {
        return Err(EcsError::InvalidId);
    }
    Ok(Id(-packed))
}
