//! Fixed-capacity node arena grown by atomic bump allocation.
//!
//! Slots are allocated four at a time, which is exactly what a quadtree split
//! needs. The arena never grows past the capacity it was created with: a
//! request that does not fit fails with [`QuadsumError::CapacityExceeded`]
//! and leaves the cursor untouched.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{QuadsumError, Result};

/// A slot type that can live in an [`Arena`].
///
/// Slots are shared between threads, so they are reset through `&self`.
pub trait ArenaSlot: Default + Sync {
    /// Restore the slot to its freshly created state.
    fn reset(&self);
}

/// Pre-sized pool of slots handed out in blocks of four.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Box<[T]>,
    cursor: AtomicUsize,
}

impl<T: ArenaSlot> Arena<T> {
    /// Create an arena of `capacity` slots whose first `reserved` slots are
    /// considered allocated from the start.
    pub fn new(capacity: usize, reserved: usize) -> Self {
        let reserved = reserved.min(capacity);
        let slots = (0..capacity).map(|_| T::default()).collect();
        Self {
            slots,
            cursor: AtomicUsize::new(reserved),
        }
    }

    /// Atomically reserve four contiguous slots and return the first index.
    ///
    /// The returned slots are reset before this returns, so they are ready to
    /// be linked into the tree.
    pub fn allocate_four(&self) -> Result<usize> {
        let capacity = self.slots.len();
        let base = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                cursor.checked_add(4).filter(|&next| next <= capacity)
            })
            .map_err(|cursor| QuadsumError::CapacityExceeded {
                capacity,
                requested: cursor + 4,
            })?;

        for slot in &self.slots[base..base + 4] {
            slot.reset();
        }
        Ok(base)
    }

    /// Slot at `index`. Slots past [`Arena::used`] are in their initial state.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`Arena::capacity`].
    #[inline]
    pub fn get(&self, index: usize) -> &T {
        &self.slots[index]
    }

    /// Number of slots handed out so far, reserved ones included.
    pub fn used(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots allocated so far.
    pub fn allocated(&self) -> &[T] {
        &self.slots[..self.used()]
    }

}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct Counter(AtomicU32);

    impl ArenaSlot for Counter {
        fn reset(&self) {
            self.0.store(0, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_allocate_four_is_contiguous() {
        let arena: Arena<Counter> = Arena::new(9, 1);
        assert_eq!(arena.used(), 1);
        assert_eq!(arena.allocate_four().unwrap(), 1);
        assert_eq!(arena.allocate_four().unwrap(), 5);
        assert_eq!(arena.used(), 9);
    }

    #[test]
    fn test_exhaustion_does_not_move_cursor() {
        let arena: Arena<Counter> = Arena::new(7, 1);
        assert_eq!(arena.allocate_four().unwrap(), 1);

        let err = arena.allocate_four().unwrap_err();
        assert!(matches!(
            err,
            QuadsumError::CapacityExceeded {
                capacity: 7,
                requested: 9
            }
        ));
        assert_eq!(arena.used(), 5);
    }

    #[test]
    fn test_allocated_slots_are_reset() {
        let arena: Arena<Counter> = Arena::new(5, 1);
        arena.get(3).0.store(42, Ordering::Relaxed);
        let base = arena.allocate_four().unwrap();
        assert_eq!(arena.get(base + 2).0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_concurrent_allocations_are_disjoint() {
        let arena: Arena<Counter> = Arena::new(1 + 4 * 64, 1);
        let bases = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let mut mine = Vec::new();
                    while let Ok(base) = arena.allocate_four() {
                        mine.push(base);
                    }
                    bases.lock().unwrap().extend(mine);
                });
            }
        });

        let bases = bases.into_inner().unwrap();
        assert_eq!(bases.len(), 64);
        let unique: HashSet<_> = bases.iter().copied().collect();
        assert_eq!(unique.len(), 64);
        assert!(bases.iter().all(|base| (base - 1) % 4 == 0));
        assert_eq!(arena.used(), arena.capacity());
    }
}
