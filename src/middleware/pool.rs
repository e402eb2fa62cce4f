//! Reusable render buffers.
//!
//! Every request that produces a log line borrows one `String` from the pool,
//! renders into it, and gives it back when the guard drops. Acquire and
//! release are safe from any number of tasks at once; callers never lock.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Initial capacity of a freshly allocated buffer.
pub(crate) const BUFFER_CAPACITY: usize = 256;

/// Buffers kept idle at most. Extra buffers are freed on release.
const MAX_IDLE: usize = 64;

/// Buffers that grew past this are freed instead of pooled.
const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Default)]
pub(crate) struct BufferPool {
    idle: Mutex<Vec<String>>,
}

impl BufferPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes an empty buffer, reusing an idle one when available.
    pub(crate) fn get(&self) -> PooledBuffer<'_> {
        let reused = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let mut buf = reused.unwrap_or_else(|| String::with_capacity(BUFFER_CAPACITY));
        buf.clear();
        PooledBuffer { buf, pool: self }
    }

    fn put(&self, buf: String) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE {
            idle.push(buf);
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A buffer on loan from a [`BufferPool`]; returned when dropped.
pub(crate) struct PooledBuffer<'a> {
    buf: String,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_round_trip_and_come_back_empty() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.get();
            buf.push_str("GET 200");
            assert!(buf.capacity() >= BUFFER_CAPACITY);
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= BUFFER_CAPACITY);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn oversized_buffers_are_dropped() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.get();
            buf.reserve(MAX_RETAINED_CAPACITY * 2);
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn concurrent_use() {
        let pool = std::sync::Arc::new(BufferPool::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = std::sync::Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.get();
                        assert!(buf.is_empty());
                        buf.push_str(&i.to_string());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}
