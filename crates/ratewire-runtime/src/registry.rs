//! Snapshot cells for configuration registries
//!
//! Readers take an `Arc` snapshot and keep using it for the whole request;
//! writers build a complete replacement and swap it in, so a reader observes
//! either the old or the new configuration, never a mix.

use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<T> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the snapshot wholesale, returning the previous one
    pub fn store(&self, value: T) -> Arc<T> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(value))
    }

    /// Build the next snapshot from the current one under the write lock,
    /// so concurrent updates are never lost
    pub fn update<R>(&self, f: impl FnOnce(&T) -> (T, R)) -> R {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let (next, output) = f(&guard);
        *guard = Arc::new(next);
        output
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_reader_keeps_old_snapshot() {
        let cell = SnapshotCell::new(BTreeMap::from([("a", 1)]));
        let before = cell.load();

        cell.store(BTreeMap::from([("b", 2)]));

        assert_eq!(before.get("a"), Some(&1));
        assert!(cell.load().get("a").is_none());
        assert_eq!(cell.load().get("b"), Some(&2));
    }

    #[test]
    fn test_update_derives_from_current() {
        let cell = SnapshotCell::new(vec![1]);
        let len = cell.update(|current| {
            let mut next = current.clone();
            next.push(2);
            let len = next.len();
            (next, len)
        });
        assert_eq!(len, 2);
        assert_eq!(*cell.load(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cell = Arc::new(SnapshotCell::new(vec![0u32; 8]));
        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for i in 1..200u32 {
                    cell.store(vec![i; 8]);
                }
            })
        };
        for _ in 0..200 {
            let snapshot = cell.load();
            assert!(snapshot.iter().all(|v| *v == snapshot[0]));
        }
        writer.join().unwrap();
    }
}
