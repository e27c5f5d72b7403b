//! Pools of scarce resources shared between concurrent conversions.

use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fixed set of resources handed out one at a time.
///
/// `checkout` waits until a resource is free; dropping the guard puts it
/// back.
#[derive(Debug)]
pub struct ResourcePool<T> {
    items: Arc<Mutex<Vec<T>>>,
    available: Arc<Semaphore>,
    capacity: usize,
}

impl<T> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            available: Arc::clone(&self.available),
            capacity: self.capacity,
        }
    }
}

impl<T: Send + 'static> ResourcePool<T> {
    pub fn new(items: Vec<T>) -> Self {
        let count = items.len();
        Self {
            items: Arc::new(Mutex::new(items)),
            available: Arc::new(Semaphore::new(count)),
            capacity: count,
        }
    }

    /// Builds `size` resources with `make`.
    pub fn filled(size: usize, mut make: impl FnMut(usize) -> T) -> Self {
        Self::new((0..size).map(&mut make).collect())
    }

    /// Waits for a free resource. Returns `None` when the pool is empty by
    /// construction.
    pub async fn checkout(&self) -> Option<PoolGuard<T>> {
        if self.capacity == 0 {
            return None;
        }
        let permit = Arc::clone(&self.available).acquire_owned().await.ok()?;
        let item = self.items.lock().ok()?.pop()?;
        Some(PoolGuard {
            item: Some(item),
            items: Arc::clone(&self.items),
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resources currently free.
    pub fn available(&self) -> usize {
        self.available.available_permits()
    }
}

/// A checked-out resource.
pub struct PoolGuard<T> {
    item: Option<T>,
    items: Arc<Mutex<Vec<T>>>,
    // Released after the item is pushed back, see Drop.
    _permit: OwnedSemaphorePermit,
}

impl<T> std::ops::Deref for PoolGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only taken in drop.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            if let Ok(mut items) = self.items.lock() {
                items.push(item);
            }
        }
    }
}
