//! Keyed, reference-counted async mutexes
//!
//! One mutex per (context, subject), created on first use and reclaimed
//! once the last holder or waiter is gone, so the map stays bounded under
//! large subject cardinalities.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as MapMutex;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockKey = (String, String);

#[derive(Debug)]
struct Entry {
    /// Holders plus waiters currently interested in this key
    interested: usize,
    mutex: Arc<Mutex<()>>,
}

/// Map of per-(context, subject) mutexes
#[derive(Debug, Default, Clone)]
pub(crate) struct LockMap {
    entries: Arc<MapMutex<HashMap<LockKey, Entry>>>,
}

impl LockMap {
    pub fn new() -> Self {
        LockMap::default()
    }

    /// Serialize a read-validate-write window on one (context, subject)
    pub async fn acquire(&self, context: &str, subject: &str) -> SubjectGuard {
        let key = (context.to_string(), subject.to_string());
        let mutex = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
                interested: 0,
                mutex: Arc::new(Mutex::new(())),
            });
            entry.interested += 1;
            entry.mutex.clone()
        };
        // the reservation keeps the refcount honest even if this future
        // is dropped while waiting
        let reservation = Reservation {
            entries: self.entries.clone(),
            key,
        };
        let permit = mutex.lock_owned().await;
        SubjectGuard {
            _permit: permit,
            _reservation: reservation,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

struct Reservation {
    entries: Arc<MapMutex<HashMap<LockKey, Entry>>>,
    key: LockKey,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&self.key) {
            entry.interested -= 1;
            if entry.interested == 0 {
                entries.remove(&self.key);
            }
        }
    }
}

/// Held for the duration of a subject's critical section
pub(crate) struct SubjectGuard {
    // released before the reservation drops the refcount
    _permit: OwnedMutexGuard<()>,
    _reservation: Reservation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn entries_are_reclaimed_after_release() {
        let locks = LockMap::new();
        {
            let _guard = locks.acquire(".", "subject-a").await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn same_key_is_mutually_exclusive() {
        let locks = LockMap::new();
        let running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let running = running.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(".", "hot").await;
                let inside = running.fetch_add(1, Ordering::SeqCst);
                assert_eq!(inside, 0, "two tasks inside one critical section");
                tokio::task::yield_now().await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = LockMap::new();
        let _a = locks.acquire(".", "a").await;
        // would deadlock if "b" shared a mutex with "a"
        let _b = locks.acquire(".", "b").await;
        assert_eq!(locks.len(), 2);
    }
}
