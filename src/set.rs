//! The operation surface shared by every set variant, the logged key
//! identity, and the by-name variant factory.

use crate::locked::LockedSet;
use crate::log::{Entry, LinkedLog, NoLog, SharedLog, ThreadLog};
use crate::skiplist::SkipListSet;

/// A totally ordered value with a stable identity for the operation log.
///
/// The identity must be independent of how values compare and unique per
/// value: replay matches operations by identity alone, so two distinct
/// values sharing one would corrupt the replay.
pub trait SetKey: Ord {
    fn id(&self) -> u64;
}

macro_rules! impl_set_key {
    ($($int:ty),*) => {
        $(impl SetKey for $int {
            fn id(&self) -> u64 {
                *self as u64
            }
        })*
    };
}

impl_set_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// The fixed operation set every variant implements.
///
/// `thread_id` is attribution only and never affects a result; it selects
/// the buffer in the per-thread log variant. [`log`](Self::log) returns the
/// recorded entries sorted ascending by timestamp. [`reset`](Self::reset)
/// restores the empty initial state; it requires that no operation is in
/// flight, which the `&mut` receiver enforces.
pub trait ConcurrentSet<T>: Send + Sync {
    fn add(&self, thread_id: usize, value: T) -> bool;

    fn remove(&self, thread_id: usize, value: &T) -> bool;

    fn contains(&self, thread_id: usize, value: &T) -> bool;

    fn log(&self) -> Vec<Entry>;

    fn reset(&mut self);
}

/// Builds a set variant by name, the way a workload driver selects one at
/// startup. `threads` sizes the per-thread variant's buffers and is ignored
/// by the others. Returns `None` for an unknown name.
///
/// - `"plain"`: lock-free list, no logging (timing baseline)
/// - `"locked"`: coarse-locked set, logged inside the critical section
/// - `"thread"`: lock-free list, per-thread log buffers
/// - `"shared"`: lock-free list, shared lock-free queue log
/// - `"linked"`: lock-free list, hand-rolled append-only queue log
pub fn by_name<T>(name: &str, threads: usize) -> Option<Box<dyn ConcurrentSet<T>>>
where
    T: SetKey + Send + Sync + 'static,
{
    match name {
        "plain" => Some(Box::new(SkipListSet::<T, NoLog>::new())),
        "locked" => Some(Box::new(LockedSet::<T>::new())),
        "thread" => Some(Box::new(SkipListSet::<T, ThreadLog>::with_log(
            ThreadLog::new(threads),
        ))),
        "shared" => Some(Box::new(SkipListSet::<T, SharedLog>::new())),
        "linked" => Some(Box::new(SkipListSet::<T, LinkedLog>::new())),
        _ => None,
    }
}

#[cfg(test)]
mod set_test {
    use super::*;
    use crate::log::validate;

    #[test]
    fn test_by_name_builds_every_variant() {
        for name in ["plain", "locked", "thread", "shared", "linked"] {
            let mut set = by_name::<i64>(name, 4).unwrap();

            assert!(set.add(0, 11), "variant {name}");
            assert!(!set.add(1, 11), "variant {name}");
            assert!(set.contains(2, &11), "variant {name}");
            assert!(set.remove(3, &11), "variant {name}");
            assert!(!set.contains(0, &11), "variant {name}");

            if name == "plain" {
                assert!(set.log().is_empty());
            } else {
                assert_eq!(set.log().len(), 5, "variant {name}");
                assert_eq!(validate(&set.log()), 0, "variant {name}");
            }

            set.reset();
            assert!(set.log().is_empty());
            assert!(!set.contains(0, &11));
        }

        assert!(by_name::<i64>("bogus", 4).is_none());
    }

    #[test]
    fn test_key_identity_is_stable_and_distinct() {
        assert_eq!(7i64.id(), 7u64);
        assert_eq!(7i64.id(), 7i64.id());
        // negatives keep a distinct identity through the cast
        assert_eq!((-1i64).id(), u64::MAX);
        assert_ne!((-1i64).id(), 1i64.id());
        assert_eq!(255u8.id(), 255u64);
    }
}
