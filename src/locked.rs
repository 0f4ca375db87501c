//! The coarse-locked variant: one mutex around a sequential set and its log.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Instant;

use crate::log::{Entry, Method};
use crate::set::{ConcurrentSet, SetKey};

/// An ordered set guarded by a single mutex, logging inside the critical
/// section.
///
/// Far slower under contention than the lock-free list, but its timestamps
/// are taken while holding the lock, so its log always replays without
/// discrepancies. That makes it the trusted baseline the logged lock-free
/// variants are compared against.
pub struct LockedSet<T> {
    birth: Instant,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    members: BTreeSet<T>,
    entries: Vec<Entry>,
}

impl<T: SetKey> LockedSet<T> {
    pub fn new() -> Self {
        LockedSet {
            birth: Instant::now(),
            inner: Mutex::new(Inner {
                members: BTreeSet::new(),
                entries: Vec::new(),
            }),
        }
    }

    /// Runs one operation and logs it under the same lock acquisition, so the
    /// stamp order is exactly the execution order.
    fn run(
        &self,
        method: Method,
        argument: u64,
        op: impl FnOnce(&mut BTreeSet<T>) -> bool,
    ) -> bool {
        let mut inner = self.inner.lock().expect("set mutex poisoned");
        let stamp = self.birth.elapsed().as_nanos() as i64;
        let returned = op(&mut inner.members);
        inner.entries.push(Entry::new(method, argument, returned, stamp));
        returned
    }
}

impl<T: SetKey> Default for LockedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentSet<T> for LockedSet<T>
where
    T: SetKey + Send + Sync,
{
    fn add(&self, _thread_id: usize, value: T) -> bool {
        let argument = value.id();
        self.run(Method::Add, argument, |members| members.insert(value))
    }

    fn remove(&self, _thread_id: usize, value: &T) -> bool {
        self.run(Method::Remove, value.id(), |members| members.remove(value))
    }

    fn contains(&self, _thread_id: usize, value: &T) -> bool {
        self.run(Method::Contains, value.id(), |members| {
            members.contains(value)
        })
    }

    fn log(&self) -> Vec<Entry> {
        let mut entries = self
            .inner
            .lock()
            .expect("set mutex poisoned")
            .entries
            .clone();
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }

    fn reset(&mut self) {
        let inner = self.inner.get_mut().expect("set mutex poisoned");
        inner.members.clear();
        inner.entries.clear();
    }
}

#[cfg(test)]
mod locked_test {
    use std::sync::Arc;

    use rand::Rng;

    use super::*;
    use crate::log::validate;

    #[test]
    fn test_sequential_set_semantics() {
        let set = LockedSet::new();

        assert!(set.add(0, 5));
        assert!(!set.add(0, 5));
        assert!(set.contains(0, &5));
        assert!(set.remove(0, &5));
        assert!(!set.remove(0, &5));
        assert!(!set.contains(0, &5));

        assert_eq!(set.log().len(), 6);
        assert_eq!(validate(&set.log()), 0);
    }

    #[test]
    fn test_contended_replay_is_exact() {
        let threads = 8usize;
        let per_thread = 2_000usize;
        let set = Arc::new(LockedSet::<i64>::new());

        let workers = (0..threads)
            .map(|thread_id| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for _ in 0..per_thread {
                        let value = rng.gen_range(0..32i64);
                        match rng.gen_range(0..3) {
                            0 => {
                                set.add(thread_id, value);
                            }
                            1 => {
                                set.remove(thread_id, &value);
                            }
                            _ => {
                                set.contains(thread_id, &value);
                            }
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().unwrap();
        }

        let entries = set.log();
        assert_eq!(entries.len(), threads * per_thread);
        // stamps are taken inside the critical section: replay is exact even
        // under arbitrary contention on a handful of keys
        assert_eq!(validate(&entries), 0);
    }

    #[test]
    fn test_reset_restores_empty() {
        let mut set = LockedSet::new();
        for value in 0..50 {
            assert!(set.add(0, value));
        }
        set.reset();
        assert!(set.log().is_empty());
        for value in 0..50 {
            assert!(!set.contains(0, &value));
        }
    }
}
