//! Bounded pools for scratch state that is reused across requests.
//!
//! A miss always allocates, a full pool simply drops the returned item. Items are
//! [recycled](Recycle) before they become visible to the next borrower, so no state crosses
//! request boundaries.
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

/// Scrub an item before it is handed to a different borrower.
pub trait Recycle {
    /// Reset all request specific state.
    ///
    /// The item may replace itself entirely, for example to give up an oversized allocation.
    fn recycle(&mut self);
}

type Create<T> = dyn Fn() -> T + Send + Sync;

/// A lock-free pool of reusable items.
pub struct Pool<T: Recycle> {
    items: ArrayQueue<T>,
    create: Box<Create<T>>,
}

/// An item borrowed from a [`Pool`], returned on drop.
pub struct Pooled<T: Recycle> {
    pool: Arc<Pool<T>>,
    item: Option<T>,
}

impl<T: Recycle> Pool<T> {
    /// A pool retaining at most `capacity` idle items.
    pub fn new<F>(capacity: usize, create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Pool {
            items: ArrayQueue::new(capacity.max(1)),
            create: Box::new(create),
        }
    }

    /// Borrow an idle item or create a fresh one.
    pub fn get(self: &Arc<Self>) -> Pooled<T> {
        let item = self.items.pop().unwrap_or_else(|| (self.create)());
        Pooled {
            pool: Arc::clone(self),
            item: Some(item),
        }
    }

    /// The number of idle items.
    pub fn idle(&self) -> usize {
        self.items.len()
    }

    fn put(&self, mut item: T) {
        item.recycle();
        // A full pool drops the surplus.
        let _ = self.items.push(item);
    }
}

impl<T: Recycle> Pooled<T> {
    /// Take the item out of the pool for good.
    pub fn into_inner(mut self) -> T {
        self.item.take().expect("pooled item is present until dropped")
    }
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled item is present until dropped")
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled item is present until dropped")
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

impl<T: Recycle> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.items.len())
            .field("capacity", &self.items.capacity())
            .finish()
    }
}

impl<T: Recycle + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Scratch(Vec<u8>);

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn items_are_recycled_and_reused() {
        let pool = Arc::new(Pool::new(2, Scratch::default));
        {
            let mut item = pool.get();
            item.0.extend_from_slice(b"secret");
        }
        assert_eq!(pool.idle(), 1);

        let item = pool.get();
        assert!(item.0.is_empty());
        assert!(item.0.capacity() >= 6);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn full_pool_drops_surplus() {
        let pool = Arc::new(Pool::new(1, Scratch::default));
        let first = pool.get();
        let second = pool.get();
        drop(first);
        drop(second);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn into_inner_leaves_the_pool() {
        let pool = Arc::new(Pool::new(1, Scratch::default));
        let item = pool.get().into_inner();
        drop(item);
        assert_eq!(pool.idle(), 0);
    }
}
