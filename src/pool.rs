//! Typed object pool for per-request scratch objects.
//!
//! # Responsibilities
//! - Hand out instances in their default state
//! - Reset and take instances back when the holder is done
//! - Bound the number of idle instances kept around
//!
//! # Design Decisions
//! - Injected, not global: every subsystem that needs scratch objects owns
//!   (a clone of) its own pool
//! - Release is tied to `Drop` of the handle, so it happens on every exit
//!   path including panics
//! - Reset runs on acquire and on release

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Objects that can be returned to their default state in place.
pub trait Reusable {
    /// Restore every mutable field to its freshly-constructed value.
    fn reset(&mut self);
}

struct Inner<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Inner<T> {
    fn idle(&self) -> MutexGuard<'_, Vec<T>> {
        // Idle instances are always reset before they are stored, so a
        // poisoned lock still guards consistent data.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pool of reusable `T` instances, cheap to clone and share.
pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.inner.idle().len())
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

impl<T: Reusable> Pool<T> {
    /// Create a pool that builds new instances with `factory` and keeps at
    /// most `max_idle` released instances.
    pub fn new<F>(max_idle: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                idle: Mutex::new(Vec::new()),
                max_idle,
                factory: Box::new(factory),
            }),
        }
    }

    /// Take an instance in its default state.
    pub fn acquire(&self) -> Pooled<T> {
        let reused = self.inner.idle().pop();
        let mut item = reused.unwrap_or_else(|| (self.inner.factory)());
        item.reset();
        Pooled {
            item: Some(item),
            pool: self.inner.clone(),
        }
    }

    /// Reset `handle` and return it to the pool.
    ///
    /// Equivalent to dropping the handle.
    pub fn release(&self, handle: Pooled<T>) {
        drop(handle);
    }

    /// Number of instances currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }
}

/// Exclusive handle to a pooled instance.
pub struct Pooled<T: Reusable> {
    item: Option<T>,
    pool: Arc<Inner<T>>,
}

impl<T: Reusable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the item out.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Reusable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Reusable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.reset();
            let mut idle = self.pool.idle();
            if idle.len() < self.pool.max_idle {
                idle.push(item);
            }
        }
    }
}
