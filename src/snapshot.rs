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

//! The semantic snapshot format: a plain, `serde`-friendly value holding
//! everything needed to reconstruct a world's entities and component
//! registry, but deliberately nothing about hooks, query caches, or
//! archetype layout -- those are runtime-only.
//!
//! Ids are encoded symbolically by registered name where one exists, and
//! numerically otherwise, so a snapshot stays readable and portable
//! across processes that registered their components in a different
//! order. [`crate::world::World::serialize`] and
//! [`crate::world::World::restore`] do the actual world plumbing; this
//! module only knows about [`Registry`] and the wire shapes.

use serde::{Deserialize, Serialize};

use crate::archetype::Payload;
use crate::error::{EcsError, Result};
use crate::id::{relation, Id, Target};
use crate::registry::{ComponentFlags, Registry};

pub const SNAPSHOT_VERSION: u32 = 1;

/// A numeric id, or a name resolved against the live registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    Numeric(i64),
    Named(String),
}

/// One id as it appears on the wire: a plain component/entity id, or a
/// relation spelled out as `{component, target}` (`target` is `"*"` for
/// the wildcard marker).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedId {
    Plain(IdRef),
    Relation { component: IdRef, target: IdRef },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdManagerState {
    pub next_id: i64,
    pub freelist: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedValue {
    #[serde(rename = "type")]
    pub kind: SerializedId,
    pub value: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedEntity {
    pub id: SerializedId,
    pub components: Vec<SerializedValue>,
}

/// One registered component, replayed against a fresh [`Registry`] on
/// restore in the same order it was originally registered -- since
/// component ids are handed out monotonically starting at 1, replaying
/// in order reproduces the exact same ids without needing to store them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedComponent {
    pub name: Option<String>,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub cascade_delete: bool,
    #[serde(default)]
    pub dont_fragment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub id_manager: IdManagerState,
    pub entities: Vec<SerializedEntity>,
    pub component_entities: Vec<SerializedComponent>,
}

fn encode_id_ref(registry: &Registry, id: Id) -> IdRef {
    if id.is_component() {
        if let Some(name) = registry.name_of(id) {
            return IdRef::Named(name.to_string());
        }
    }
    IdRef::Numeric(id.raw())
}

fn decode_id_ref(registry: &Registry, r: &IdRef) -> Result<Id> {
    match r {
        IdRef::Numeric(n) => Ok(Id::from_raw(*n)),
        IdRef::Named(name) => registry.id_by_name(name).ok_or(EcsError::InvalidId),
    }
}

/// Encode any id (plain or relation) into its wire form.
pub fn encode_id(registry: &Registry, id: Id) -> SerializedId {
    match id.decode() {
        None => SerializedId::Plain(encode_id_ref(registry, id)),
        Some(decoded) => {
            let component = encode_id_ref(registry, decoded.component);
            let target = match decoded.target {
                Target::Wildcard => IdRef::Named("*".to_string()),
                Target::Entity(t) => IdRef::Numeric(t.raw()),
                Target::Component(t) => encode_id_ref(registry, t),
            };
            SerializedId::Relation { component, target }
        }
    }
}

/// Decode a wire id back into a packed [`Id`], resolving any symbolic
/// names against `registry`.
pub fn decode_id(registry: &Registry, serialized: &SerializedId) -> Result<Id> {
    match serialized {
        SerializedId::Plain(r) => decode_id_ref(registry, r),
        SerializedId::Relation { component, target } => {
            let component_id = decode_id_ref(registry, component)?;
            let target_id = match target {
                IdRef::Named(name) if name == "*" => None,
                IdRef::Named(name) => Some(registry.id_by_name(name).ok_or(EcsError::InvalidId)?),
                IdRef::Numeric(n) => Some(Id::from_raw(*n)),
            };
            relation(component_id, target_id)
        }
    }
}

/// Every component in `registry`, in registration order, ready to be
/// replayed onto a fresh one.
pub fn encode_components(registry: &Registry) -> Vec<SerializedComponent> {
    (1..=registry.component_count() as i64)
        .map(|raw| {
            let id = Id::from_raw(raw);
            let flags = registry.options_of(id);
            SerializedComponent {
                name: registry.name_of(id).map(str::to_string),
                exclusive: flags.exclusive,
                cascade_delete: flags.cascade_delete,
                dont_fragment: flags.dont_fragment,
            }
        })
        .collect()
}

/// Replay `components` onto `registry` in order, reproducing the
/// original id assignment.
pub fn restore_components(registry: &mut Registry, components: &[SerializedComponent]) -> Result<()> {
    for component in components {
        registry.component(
            ComponentFlags {
                exclusive: component.exclusive,
                cascade_delete: component.cascade_delete,
                dont_fragment: component.dont_fragment,
            },
            component.name.as_deref(),
        )?;
    }
    Ok(())
}
