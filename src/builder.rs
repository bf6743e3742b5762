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

//! A thin fluent sugar over [`World::new_entity`] + [`World::set`],
//! mirroring a familiar `world.spawn(bundle)` ergonomics without a typed
//! `Bundle` trait -- component payloads here are dynamic,
//! so there's nothing for a bundle macro to enumerate at compile time.
//! Contains no logic the core doesn't already expose; every call forwards
//! straight to `World`.

use crate::archetype::Payload;
use crate::error::Result;
use crate::id::Id;
use crate::world::World;

/// Builds one entity's initial component set before staging it.
///
/// `build()` allocates the entity immediately (so the returned id is
/// usable right away, e.g. as a relation target for a sibling builder)
/// but every `with` call is a deferred `set`, same as calling
/// [`World::set`] directly -- nothing lands until the next
/// [`World::sync`].
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: Id,
    error: Option<crate::error::EcsError>,
}

impl<'w> EntityBuilder<'w> {
    fn new(world: &'w mut World) -> Result<Self> {
        let entity = world.new_entity()?;
        Ok(Self { world, entity, error: None })
    }

    /// Stage `id -> payload` on the entity being built. Errors (e.g. a
    /// wildcard relation id) are latched and surfacing is deferred to
    /// [`EntityBuilder::build`], so calls can be chained fluently.
    pub fn with(mut self, id: Id, payload: Option<Payload>) -> Self {
        if self.error.is_none() {
            if let Err(err) = self.world.set(self.entity, id, payload) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Stage a tag component (no payload) on the entity being built.
    pub fn with_tag(self, id: Id) -> Self {
        self.with(id, None)
    }

    pub fn build(self) -> Result<Id> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.entity),
        }
    }
}

/// Start building a new entity. Sugar for
/// `world.new_entity()` followed by a chain of `world.set(..)` calls.
pub fn spawn(world: &mut World) -> Result<EntityBuilder<'_>> {
    EntityBuilder::new(world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentFlags;

    #[test]
    fn builder_stages_every_with_call() {
        let mut world = World::new();
        let p = world.component(ComponentFlags::default(), Some("P")).unwrap();
        let v = world.component(ComponentFlags::default(), Some("V")).unwrap();

        let e = spawn(&mut world)
            .unwrap()
            .with(p, Some(serde_json::json!({"x": 1})))
            .with(v, Some(serde_json::json!({"x": 3})))
            .build()
            .unwrap();
        world.sync().unwrap();

        assert!(world.has(e, p));
        assert!(world.has(e, v));
    }

    #[test]
    fn builder_surfaces_the_first_error_at_build() {
        let mut world = World::new();
        let tag = world.component(ComponentFlags::default(), Some("Tag")).unwrap();
        let wildcard = world.relation(tag, None).unwrap();

        let result = spawn(&mut world).unwrap().with(wildcard, None).build();
        assert!(result.is_err());
    }
}
