//! Monotonic id allocators: components never recycle, entities do.

use crate::error::{EcsError, Result};
use crate::id::{Id, COMPONENT_MAX, ENTITY_START};

/// Hands out component ids `1..=COMPONENT_MAX`. Exhaustion is fatal --
/// component ids are meant to be a small, long-lived namespace declared
/// once at startup, not churned at runtime.
#[derive(Debug, Default)]
pub struct ComponentAllocator {
    next: i64,
}

impl ComponentAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn alloc(&mut self) -> Result<Id> {
        if self.next > COMPONENT_MAX {
            return Err(EcsError::ComponentIdOverflow);
        }
        let id = Id::from_raw(self.next);
        self.next += 1;
        Ok(id)
    }

    pub fn allocated_count(&self) -> usize {
        (self.next - 1) as usize
    }
}

/// Entity id allocator: a monotonic counter plus a LIFO freelist.
///
/// Allocation always prefers the freelist (stack discipline, for
/// locality of reuse); it only advances the counter once the freelist is
/// empty. Deallocation validates that the id was previously issued.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next: i64,
    freelist: Vec<Id>,
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            next: ENTITY_START,
            freelist: Vec::new(),
        }
    }

    pub fn alloc(&mut self) -> Result<Id> {
        if let Some(id) = self.freelist.pop() {
            return Ok(id);
        }
        if self.next == i64::MAX {
            return Err(EcsError::EntityIdOverflow);
        }
        let id = Id::from_raw(self.next);
        self.next += 1;
        Ok(id)
    }

    /// Release `id` back to the freelist.
    ///
    /// Fails with [`EcsError::InvalidDeallocation`] if `id` isn't an
    /// entity id, or was never handed out by this allocator (i.e. its raw
    /// value is not strictly less than the counter).
    pub fn dealloc(&mut self, id: Id) -> Result<()> {
        if !id.is_entity() || id.raw() >= self.next {
            return Err(EcsError::InvalidDeallocation);
        }
        self.freelist.push(id);
        Ok(())
    }

    /// Serializable allocator state: `(counter, freelist)`.
    pub fn state(&self) -> (i64, Vec<i64>) {
        (self.next, self.freelist.iter().map(|id| id.raw()).collect())
    }

    /// Restore allocator state produced by [`EntityAllocator::state`].
    pub fn restore(next: i64, freelist: Vec<i64>) -> Self {
        Self {
            next,
            freelist: freelist.into_iter().map(Id::from_raw).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_allocator_is_monotonic() {
        let mut alloc = ComponentAllocator::new();
        let a = alloc.alloc().unwrap();
        let b = alloc.alloc().unwrap();
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
    }

    #[test]
    fn component_allocator_overflows() {
        let mut alloc = ComponentAllocator { next: COMPONENT_MAX };
        assert!(alloc.alloc().is_ok());
        assert!(matches!(alloc.alloc(), Err(EcsError::ComponentIdOverflow)));
    }

    #[test]
    fn entity_freelist_is_lifo() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.alloc().unwrap();
        let b = alloc.alloc().unwrap();
        alloc.dealloc(a).unwrap();
        alloc.dealloc(b).unwrap();
        assert_eq!(alloc.alloc().unwrap(), b);
        assert_eq!(alloc.alloc().unwrap(), a);
    }

    #[test]
    fn entity_dealloc_rejects_unissued_id() {
        let mut alloc = EntityAllocator::new();
        let fabricated = Id::from_raw(ENTITY_START + 9999);
        assert!(matches!(
            alloc.dealloc(fabricated),
            Err(EcsError::InvalidDeallocation)
        ));
    }

    #[test]
    fn entity_dealloc_rejects_non_entity() {
        let mut alloc = EntityAllocator::new();
        assert!(matches!(
            alloc.dealloc(Id::from_raw(5)),
            Err(EcsError::InvalidDeallocation)
        ));
    }
}
