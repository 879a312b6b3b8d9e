use crossbeam::queue::SegQueue;

/// Lock-free free-list of reusable containers.
///
/// `acquire` hands out a pooled item or builds a fresh one; `release` returns
/// it. An item is owned by exactly one holder between those two calls, so the
/// pooled values themselves need no synchronization. Capacity is bounded to
/// keep a burst of parallel leaves from pinning memory forever.
pub struct ObjectPool<T> {
    items: SegQueue<T>,
    max_idle: usize,
}

impl<T> ObjectPool<T> {
    pub fn new(max_idle: usize) -> Self {
        Self {
            items: SegQueue::new(),
            max_idle,
        }
    }

    pub fn acquire(&self, create: impl FnOnce() -> T) -> T {
        self.items.pop().unwrap_or_else(create)
    }

    /// Returns an item to the pool. Items beyond the idle cap are dropped.
    pub fn release(&self, item: T) {
        if self.items.len() < self.max_idle {
            self.items.push(item);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycles_released_items() {
        let pool: ObjectPool<Vec<u8>> = ObjectPool::new(8);
        let mut buffer = pool.acquire(|| Vec::with_capacity(16));
        buffer.push(1);
        let capacity = buffer.capacity();
        buffer.clear();
        pool.release(buffer);

        assert_eq!(pool.idle_count(), 1);
        let recycled = pool.acquire(|| Vec::new());
        assert_eq!(recycled.capacity(), capacity);
        assert!(recycled.is_empty());
    }

    #[test]
    fn respects_idle_cap() {
        let pool: ObjectPool<u64> = ObjectPool::new(2);
        for value in 0..10 {
            pool.release(value);
        }
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;

        let pool: Arc<ObjectPool<Vec<f64>>> = Arc::new(ObjectPool::new(32));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let buffer = pool.acquire(|| vec![0.0; 4]);
                        assert_eq!(buffer.len(), 4);
                        pool.release(buffer);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
