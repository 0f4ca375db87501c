//! A lock-free skip list set that records the linearization point of every
//! operation it performs.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use std::time::Instant;

use crate::log::{Entry, Method, OperationLog, SharedLog};
use crate::node::{Node, MAX_LEVEL};
use crate::set::{ConcurrentSet, SetKey};

/// Number of link levels in a sentinel tower.
const LEVELS: usize = MAX_LEVEL + 1;

/// Draws a level in `0..=MAX_LEVEL` with `P[level = h] = 1/2^(h+1)`, the
/// leftover mass landing on `MAX_LEVEL` itself.
pub(crate) fn random_level() -> usize {
    let r: u32 = rand::random();
    (r & ((1 << MAX_LEVEL) - 1)).trailing_ones() as usize
}

/// A lock-free skip list over totally ordered values, generic over the log
/// backend it feeds at each operation's linearization point.
///
/// Every mutation of shared state is a single compare-and-exchange on a
/// marked reference, and a failed exchange means a conflicting one succeeded,
/// so the structure as a whole always makes progress. Removal is two-phase:
/// a node is first marked level by level (logical deletion), then snipped out
/// of each level by whichever traversal passes it next.
///
/// Nodes are never freed while shared references to the set exist, so a
/// pointer read from a live link stays dereferenceable and an exchange can
/// never observe a recycled address. [`SkipListSet::reset`] and `Drop` take
/// the set exclusively and free every node published since the last reset.
pub struct SkipListSet<T, L = SharedLog> {
    head: *mut Node<T>,
    tail: *mut Node<T>,
    /// Base of the monotonic clock all timestamps are read from.
    birth: Instant,
    log: L,
    /// Every node that won its bottom-level insertion, chained intrusively.
    published: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send + Sync, L: Send> Send for SkipListSet<T, L> {}
unsafe impl<T: Send + Sync, L: Sync> Sync for SkipListSet<T, L> {}

struct Search<T> {
    preds: [*mut Node<T>; LEVELS],
    succs: [*mut Node<T>; LEVELS],
    found: bool,
    /// Clock reading of the last bottom-level cursor advance, if requested.
    stamp: i64,
}

impl<T, L> SkipListSet<T, L> {
    fn stamp(&self) -> i64 {
        self.birth.elapsed().as_nanos() as i64
    }

    /// Pushes a freshly linked node onto the intrusive tracking stack so that
    /// reset/drop can reach it even after it is unlinked from every level.
    fn track(&self, node: *mut Node<T>) {
        let mut top = self.published.load(Ordering::Relaxed);
        loop {
            unsafe { (*node).tracked.store(top, Ordering::Relaxed) };
            match self.published.compare_exchange_weak(
                top,
                node,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => top = observed,
            }
        }
    }

    /// Frees every tracked node. Requires exclusive access.
    fn drain_published(&mut self) {
        let mut node = core::mem::replace(self.published.get_mut(), ptr::null_mut());
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.tracked.load(Ordering::Relaxed);
        }
    }
}

impl<T, L> SkipListSet<T, L>
where
    T: SetKey + Send + Sync,
    L: OperationLog,
{
    /// An empty set feeding `log`.
    pub fn with_log(log: L) -> Self {
        let head = Box::into_raw(Box::new(Node::sentinel()));
        let tail = Box::into_raw(Box::new(Node::sentinel()));
        for level in 0..LEVELS {
            unsafe { (*head).next[level].store(tail, false) };
        }
        SkipListSet {
            head,
            tail,
            birth: Instant::now(),
            log,
            published: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// An empty set with a default-constructed log backend.
    pub fn new() -> Self
    where
        L: Default,
    {
        Self::with_log(L::default())
    }

    /// Locates `value`, filling in the last unmarked predecessor and the
    /// first node at or after the target for every level, and snipping out
    /// each marked node passed over on the way. Restarts from the head
    /// whenever a snip loses a race; there are no partial retries.
    ///
    /// With `record_stamp` set, also reports the clock reading of the last
    /// bottom-level cursor advance, which serves as the linearization point
    /// of a failed add and a failed remove.
    fn find(&self, value: &T, record_stamp: bool) -> Search<T> {
        'retry: loop {
            let mut stamp = -1;
            let mut preds = [ptr::null_mut(); LEVELS];
            let mut succs = [ptr::null_mut(); LEVELS];
            let mut pred = self.head;
            for level in (0..LEVELS).rev() {
                let mut curr = unsafe { (*pred).next[level].load_ref() };
                if level == 0 && record_stamp {
                    stamp = self.stamp();
                }
                loop {
                    let (mut succ, mut marked) = unsafe { (*curr).next[level].load() };
                    while marked {
                        // Snip the logically deleted node out of this level. A
                        // failed exchange means the links moved under us.
                        if unsafe { (*pred).next[level].compare_exchange(curr, false, succ, false) }
                            .is_err()
                        {
                            continue 'retry;
                        }
                        curr = succ;
                        if level == 0 && record_stamp {
                            stamp = self.stamp();
                        }
                        let next = unsafe { (*curr).next[level].load() };
                        succ = next.0;
                        marked = next.1;
                    }
                    match unsafe { &(*curr).value } {
                        Some(v) if v < value => {
                            pred = curr;
                            curr = succ;
                            if level == 0 && record_stamp {
                                stamp = self.stamp();
                            }
                        }
                        _ => break,
                    }
                }
                preds[level] = pred;
                succs[level] = curr;
            }
            let found = unsafe { (*succs[0]).value.as_ref() }.map_or(false, |v| v == value);
            return Search {
                preds,
                succs,
                found,
                stamp,
            };
        }
    }

    /// Adds `value`, returning whether it was absent.
    ///
    /// A failed attempt is linearized at the traversal read that observed the
    /// duplicate. A successful one is linearized at the bottom-level exchange
    /// that publishes the node, with the timestamp taken immediately before
    /// the exchange so it reflects the instant the node becomes visible
    /// rather than when this thread notices success.
    pub fn add(&self, thread_id: usize, value: T) -> bool {
        let top_level = random_level();
        let argument = value.id();
        let mut value = value;
        loop {
            let search = self.find(&value, true);
            if search.found {
                self.log.record(
                    thread_id,
                    Entry::new(Method::Add, argument, false, search.stamp),
                );
                return false;
            }

            let node = Box::into_raw(Box::new(Node::new(value, top_level)));
            for level in 0..=top_level {
                unsafe { (*node).next[level].store(search.succs[level], false) };
            }

            let pred = search.preds[0];
            let succ = search.succs[0];
            let stamp = self.stamp();
            if unsafe { (*pred).next[0].compare_exchange(succ, false, node, false) }.is_err() {
                // Never published, so no other thread holds this pointer:
                // take the value back and retry from a fresh search.
                let mut unlinked = unsafe { Box::from_raw(node) };
                value = unlinked.value.take().expect("a built node holds a value");
                continue;
            }
            self.track(node);
            self.log
                .record(thread_id, Entry::new(Method::Add, argument, true, stamp));

            // Upper levels are shortcuts only. They are linked after the
            // linearization point, and a race that leaves one incomplete is
            // repaired by the snipping in later traversals.
            let key = unsafe { (*node).value.as_ref() }.expect("a published node holds a value");
            let mut search = search;
            for level in 1..=top_level {
                loop {
                    let pred = search.preds[level];
                    let succ = search.succs[level];
                    if unsafe { (*pred).next[level].compare_exchange(succ, false, node, false) }
                        .is_ok()
                    {
                        break;
                    }
                    search = self.find(key, false);
                }
            }
            return true;
        }
    }

    /// Removes `value`, returning whether it was present.
    ///
    /// The upper levels are marked first, top down, each spun on until it is
    /// observed marked by anyone. The bottom-level mark is then raced for;
    /// the winning exchange is the linearization point of the removal. A
    /// thread that loses that race reports the winner's published timestamp,
    /// because two threads racing on the same key must log a single moment
    /// at which the value left the set.
    pub fn remove(&self, thread_id: usize, value: &T) -> bool {
        let argument = value.id();
        let search = self.find(value, true);
        if !search.found {
            self.log.record(
                thread_id,
                Entry::new(Method::Remove, argument, false, search.stamp),
            );
            return false;
        }

        let node = search.succs[0];
        let top_level = unsafe { (*node).top_level };

        // Phase one: logically delete the shortcut levels.
        for level in (1..=top_level).rev() {
            let (mut succ, mut marked) = unsafe { (*node).next[level].load() };
            while !marked {
                let _ = unsafe { (*node).next[level].compare_exchange(succ, false, succ, true) };
                let next = unsafe { (*node).next[level].load() };
                succ = next.0;
                marked = next.1;
            }
        }

        // Phase two: race for the bottom-level mark.
        let (mut succ, _) = unsafe { (*node).next[0].load() };
        loop {
            let stamp = self.stamp();
            let won = unsafe { (*node).next[0].compare_exchange(succ, false, succ, true) }.is_ok();
            if won {
                unsafe { (*node).removal_stamp.store(stamp, Ordering::Release) };
                self.log
                    .record(thread_id, Entry::new(Method::Remove, argument, true, stamp));
                // Best-effort physical unlink through the traversal's snipping.
                self.find(value, false);
                return true;
            }
            let (next, marked) = unsafe { (*node).next[0].load() };
            succ = next;
            if marked {
                // Someone else won the mark. The winner publishes its stamp
                // right after the exchange; if it is not visible yet, fall
                // back to our own reading as an approximation of the same
                // instant.
                let mut winner = unsafe { (*node).removal_stamp.load(Ordering::Acquire) };
                if winner == -1 {
                    winner = stamp;
                }
                self.log.record(
                    thread_id,
                    Entry::new(Method::Remove, argument, false, winner),
                );
                return false;
            }
            // Nobody marked it, the successor just changed: retry the mark.
        }
    }

    /// Membership test: the same descent as `find` but with no snipping and
    /// no writes to shared state, linearized at the last bottom-level cursor
    /// read.
    pub fn contains(&self, thread_id: usize, value: &T) -> bool {
        let mut stamp = -1;
        let mut pred = self.head;
        let mut curr = self.head;
        for level in (0..LEVELS).rev() {
            curr = unsafe { (*pred).next[level].load_ref() };
            if level == 0 {
                stamp = self.stamp();
            }
            loop {
                let (mut succ, mut marked) = unsafe { (*curr).next[level].load() };
                while marked {
                    curr = succ;
                    if level == 0 {
                        stamp = self.stamp();
                    }
                    let next = unsafe { (*curr).next[level].load() };
                    succ = next.0;
                    marked = next.1;
                }
                match unsafe { &(*curr).value } {
                    Some(v) if v < value => {
                        pred = curr;
                        curr = succ;
                        if level == 0 {
                            stamp = self.stamp();
                        }
                    }
                    _ => break,
                }
            }
        }
        let present = unsafe { (*curr).value.as_ref() }.map_or(false, |v| v == value);
        self.log.record(
            thread_id,
            Entry::new(Method::Contains, value.id(), present, stamp),
        );
        present
    }

    /// Snapshot of the operation log, sorted ascending by timestamp.
    pub fn log(&self) -> Vec<Entry> {
        let mut entries = self.log.snapshot();
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }

    /// Restores the empty initial state, discarding every node and every log
    /// entry. Exclusive access guarantees no operation is in flight.
    pub fn reset(&mut self) {
        for level in 0..LEVELS {
            unsafe { (*self.head).next[level].store(self.tail, false) };
        }
        self.drain_published();
        self.log.clear();
    }
}

impl<T, L> Default for SkipListSet<T, L>
where
    T: SetKey + Send + Sync,
    L: OperationLog + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, L> Drop for SkipListSet<T, L> {
    fn drop(&mut self) {
        self.drain_published();
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T, L> ConcurrentSet<T> for SkipListSet<T, L>
where
    T: SetKey + Send + Sync,
    L: OperationLog,
{
    fn add(&self, thread_id: usize, value: T) -> bool {
        SkipListSet::add(self, thread_id, value)
    }

    fn remove(&self, thread_id: usize, value: &T) -> bool {
        SkipListSet::remove(self, thread_id, value)
    }

    fn contains(&self, thread_id: usize, value: &T) -> bool {
        SkipListSet::contains(self, thread_id, value)
    }

    fn log(&self) -> Vec<Entry> {
        SkipListSet::log(self)
    }

    fn reset(&mut self) {
        SkipListSet::reset(self)
    }
}
