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

//! shard_ecs -- an archetype-based ECS runtime built on a single packed
//! integer identifier space.
//!
//! Entities, components, and binary relations between them all share one
//! `Id` namespace (see [`id`]). Entities are grouped into [`archetype`]s
//! by the exact set of components they hold; mutations are staged on a
//! [`command`] buffer and applied in grouped rounds by [`World::sync`],
//! which resolves exclusive relations, maintains the `dontFragment`
//! side-table, moves entities between archetypes, and dispatches
//! [`hooks`]. [`query`] exposes cached, incrementally-maintained
//! iteration over archetypes matching a selector list.
//!
//! ```
//! use shard_ecs::prelude::*;
//!
//! let mut world = World::new();
//! let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
//! let e = world.new_entity().unwrap();
//! world.set(e, position, Some(serde_json::json!({"x": 1.0, "y": 2.0}))).unwrap();
//! world.sync().unwrap();
//! assert!(world.has(e, position));
//! ```

pub mod alloc;
pub mod archetype;
pub mod bitset;
pub mod builder;
pub mod changeset;
pub mod command;
pub mod debug;
pub mod error;
pub mod hooks;
pub mod id;
pub mod query;
pub mod registry;
pub mod snapshot;
pub mod world;

pub mod prelude;

pub use archetype::Payload;
pub use builder::{spawn, EntityBuilder};
pub use error::{EcsError, Result};
pub use hooks::{Commands, HookCallbacks, HookHandle};
pub use id::{relation, Id};
pub use query::{QueryValue, Selector};
pub use registry::ComponentFlags;
pub use snapshot::Snapshot;
pub use world::World;
