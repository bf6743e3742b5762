//! Convenient re-exports of commonly used types.
//!
//! ```
//! use shard_ecs::prelude::*;
//! ```

pub use crate::archetype::Payload;
pub use crate::builder::{spawn, EntityBuilder};
pub use crate::error::{EcsError, Result};
pub use crate::hooks::{Commands, HookCallbacks, HookHandle, MultiSelector};
pub use crate::id::{relation, Decoded, Id, Kind, Target};
pub use crate::query::{QueryValue, Selector};
pub use crate::registry::ComponentFlags;
pub use crate::snapshot::Snapshot;
pub use crate::world::World;
