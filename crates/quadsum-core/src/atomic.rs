//! Atomic `f32` built on the bit pattern of an `AtomicU32`.

use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` that can be shared between threads and updated with atomic adds.
///
/// The value is stored as its IEEE-754 bits. `fetch_add` is a compare-and-swap
/// loop, so concurrent adds are never lost but their rounding depends on the
/// order in which they land.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// `0.0`, whose bit pattern is all zeroes.
    pub const fn zero() -> Self {
        Self(AtomicU32::new(0))
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    #[inline]
    pub fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order);
    }

    /// Adds `value` and returns the previous value.
    #[inline]
    pub fn fetch_add(&self, value: f32, order: Ordering) -> f32 {
        let previous = self
            .0
            .fetch_update(order, Ordering::Relaxed, |bits| {
                Some((f32::from_bits(bits) + value).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f32::from_bits(previous)
    }

    pub fn into_inner(self) -> f32 {
        f32::from_bits(self.0.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_positive_zero() {
        assert_eq!(AtomicF32::zero().load(Ordering::Relaxed).to_bits(), 0.0f32.to_bits());
        assert_eq!(AtomicF32::default().into_inner(), 0.0);
    }

    #[test]
    fn test_fetch_add_returns_previous() {
        let value = AtomicF32::new(1.5);
        assert_eq!(value.fetch_add(2.0, Ordering::Relaxed), 1.5);
        assert_eq!(value.load(Ordering::Relaxed), 3.5);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let value = AtomicF32::zero();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        value.fetch_add(1.0, Ordering::Relaxed);
                    }
                });
            }
        });
        // Integers below 2^24 are exact in f32, so order does not matter here.
        assert_eq!(value.into_inner(), 8000.0);
    }
}
