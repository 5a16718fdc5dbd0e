// SPDX-License-Identifier: Apache-2.0

//! A small generic object pool shared across threads.
//!
//! `get`/`put` are the only operations; the invariant `put(x) ⟹ x` is fully
//! reset before it can be handed out again is enforced by calling
//! [`Poolable::reset`] inside `put` rather than trusting the caller.
//!
//! Implemented as a `parking_lot`-guarded free list. This is a pragmatic
//! multi-producer/multi-consumer pool, not a lock-free stack — the spec
//! allows either.

use parking_lot::Mutex;

/// A value that can be returned to a pool after being put back into a
/// reusable state.
pub trait Poolable {
    /// Clears all accumulated state, retaining capacity where practical.
    fn reset(&mut self);
}

/// A free list of pooled, reset-in-place `T` values.
pub struct Pool<T: Poolable> {
    free: Mutex<Vec<T>>,
    new: fn() -> T,
}

impl<T: Poolable> Pool<T> {
    /// Creates an empty pool backed by `new` for cold allocations.
    #[must_use]
    pub const fn new(new: fn() -> T) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            new,
        }
    }

    /// Removes a value from the free list, or constructs a fresh one.
    pub fn get(&self) -> T {
        match self.free.lock().pop() {
            Some(v) => v,
            None => (self.new)(),
        }
    }

    /// Resets `v` and returns it to the free list.
    pub fn put(&self, mut v: T) {
        v.reset();
        self.free.lock().push(v);
    }

    /// Number of values currently idle in the free list.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.free.lock().len()
    }
}
