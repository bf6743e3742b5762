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

//! Error types.
//!
//! Programmer errors (bad ids, missing components, overflow) surface here
//! rather than panicking, so embedders can decide whether to unwind. There
//! is deliberately no recovery guidance attached: a `CannotSetWildcardDirectly`
//! means the call site has a bug, not that the engine hit a transient fault.

use std::fmt;

use crate::id::Id;

/// ECS error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A raw value could not be interpreted as a well-formed id: out of
    /// range for its kind, a relation targeting another relation, or a
    /// packed form that would overflow the safe integer range.
    InvalidId,

    /// The entity does not exist (never allocated, or already deleted).
    EntityNotFound,

    /// `get`/`remove` addressed a component the entity does not hold.
    ComponentNotOnEntity,

    /// `set` was called directly with a wildcard relation id; wildcards
    /// are read-only markers, never a settable slot.
    CannotSetWildcardDirectly,

    /// `EntityAllocator::dealloc` was asked to free an id it never
    /// issued, or a non-entity id.
    InvalidDeallocation,

    /// The component allocator has handed out `COMPONENT_MAX` ids.
    ComponentIdOverflow,

    /// The entity allocator's monotonic counter is exhausted.
    EntityIdOverflow,

    /// `Registry::component` was given a name already bound to another id.
    NameAlreadyRegistered(String),

    /// The command buffer's drain loop exceeded its iteration cap,
    /// almost certainly because a hook re-enqueues unconditionally.
    CommandDrainTooDeep { entity: Option<Id>, depth: usize },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidId => write!(f, "invalid id"),
            EcsError::EntityNotFound => write!(f, "entity not found"),
            EcsError::ComponentNotOnEntity => write!(f, "component not on entity"),
            EcsError::CannotSetWildcardDirectly => {
                write!(f, "cannot set a wildcard relation directly")
            }
            EcsError::InvalidDeallocation => write!(f, "invalid deallocation"),
            EcsError::ComponentIdOverflow => {
                write!(f, "component id allocator exhausted")
            }
            EcsError::EntityIdOverflow => write!(f, "entity id allocator exhausted"),
            EcsError::NameAlreadyRegistered(name) => {
                write!(f, "component name already registered: {name}")
            }
            EcsError::CommandDrainTooDeep { entity, depth } => match entity {
                Some(id) => write!(
                    f,
                    "command buffer drain exceeded its cap ({depth} iterations), last seen entity {id:?}"
                ),
                None => write!(f, "command buffer drain exceeded its cap ({depth} iterations)"),
            },
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EcsError>;
