//! Lock-free ordered sets that record each operation's linearization point
//! and can replay the record to count consistency violations.
//!
//! The core is a lock-free skip list: multi-level links held as marked
//! references, two-phase logical deletion, and retry-on-conflict
//! compare-and-exchange loops. Every `add`/`remove`/`contains` call appends
//! one timestamped entry to a pluggable operation log at the instant the
//! operation takes effect; [`validate`] later replays the sorted log against
//! a sequential reference set and counts disagreements.
//!
//! Variants differ only in synchronization and logging strategy and are all
//! reachable through [`by_name`]:
//!
//! ```
//! use skiplog::{by_name, validate};
//!
//! let mut set = by_name::<i64>("shared", 1).unwrap();
//! assert!(set.add(0, 7));
//! assert!(set.contains(0, &7));
//! assert!(set.remove(0, &7));
//! assert_eq!(validate(&set.log()), 0);
//! set.reset();
//! assert!(!set.contains(0, &7));
//! ```
#![warn(rust_2018_idioms, unreachable_pub)]

pub mod locked;
pub mod log;
pub mod queue;
pub mod set;
pub mod skiplist;

mod marked;
mod node;

pub use crate::locked::LockedSet;
pub use crate::log::{validate, Entry, LinkedLog, Method, NoLog, OperationLog, SharedLog, ThreadLog};
pub use crate::queue::AppendQueue;
pub use crate::set::{by_name, ConcurrentSet, SetKey};
pub use crate::skiplist::SkipListSet;
