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

//! Deferred command buffer.
//!
//! Unlike a boxed-closure queue, every entry here is plain data --
//! `(entity, command)` -- so a drain round can group entries by entity
//! without downcasting or invoking anything itself. [`crate::world::World`]
//! owns the outer cap-guarded drain loop (see its `flush`): it repeatedly
//! runs one [`CommandBuffer::drain_round`] and checks whether the handler
//! enqueued more work, since a command handled during a round may itself
//! push back onto this same buffer (a hook reacting to a `set`, say).

use rustc_hash::FxHashMap;

use crate::archetype::Payload;
use crate::error::Result;
use crate::id::Id;

/// One queued, not-yet-applied mutation.
#[derive(Debug, Clone)]
pub enum EntityCommand {
    Set { id: Id, payload: Option<Payload> },
    Remove { id: Id },
    Destroy,
}

#[derive(Debug, Clone)]
struct Queued {
    entity: Id,
    command: EntityCommand,
}

/// FIFO buffer of pending entity commands.
///
/// `scratch` and `grouping` are reused round over round rather than
/// reallocated, per the Design Note on avoiding per-drain allocation.
#[derive(Default)]
pub struct CommandBuffer {
    pending: Vec<Queued>,
    scratch: Vec<Queued>,
    grouping: FxHashMap<Id, Vec<EntityCommand>>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn set(&mut self, entity: Id, id: Id, payload: Option<Payload>) {
        self.pending.push(Queued {
            entity,
            command: EntityCommand::Set { id, payload },
        });
    }

    pub fn remove(&mut self, entity: Id, id: Id) {
        self.pending.push(Queued {
            entity,
            command: EntityCommand::Remove { id },
        });
    }

    pub fn destroy(&mut self, entity: Id) {
        self.pending.push(Queued {
            entity,
            command: EntityCommand::Destroy,
        });
    }

    /// Run exactly one drain round: swap `pending` into `scratch`, group
    /// by entity using the reusable `grouping` map, then invoke `handler`
    /// once per entity with its ordered command list (submission order is
    /// preserved within the entity; order across entities is unspecified).
    ///
    /// Commands `handler` pushes back onto this buffer land in `pending`
    /// and are *not* picked up by this call -- the caller decides whether
    /// to run another round.
    pub fn drain_round<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(Id, &[EntityCommand]) -> Result<()>,
    {
        std::mem::swap(&mut self.pending, &mut self.scratch);

        for queued in self.scratch.drain(..) {
            self.grouping.entry(queued.entity).or_default().push(queued.command);
        }

        for (entity, commands) in self.grouping.drain() {
            handler(entity, &commands)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.scratch.clear();
        self.grouping.clear();
    }

    /// Reclaim `drained`'s (now-empty) scratch/grouping capacity after a
    /// round, folding in anything pushed onto `self` while that round's
    /// handler ran.
    pub fn absorb_reusable(&mut self, mut drained: CommandBuffer) {
        std::mem::swap(&mut drained.pending, &mut self.pending);
        *self = drained;
    }
}
