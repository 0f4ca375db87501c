//! Linearization-point records, the pluggable log backends, and the
//! sequential replay validator.

use std::collections::HashSet;
use std::sync::Mutex;

use crossbeam_queue::SegQueue;
use crossbeam_utils::CachePadded;

use crate::queue::AppendQueue;

/// The operation a log entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Add,
    Remove,
    Contains,
}

/// One operation as it linearized: what ran, on which key identity, what it
/// returned, and the monotonic-clock reading of its linearization point.
///
/// Entries are immutable once created and carry no order of their own;
/// replay establishes order by sorting on the timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub method: Method,
    pub argument: u64,
    pub returned: bool,
    pub timestamp: i64,
}

impl Entry {
    pub fn new(method: Method, argument: u64, returned: bool, timestamp: i64) -> Self {
        Entry {
            method,
            argument,
            returned,
            timestamp,
        }
    }
}

/// Replays `log` in timestamp order against a sequential reference set and
/// counts the entries whose recorded return value disagrees with what the
/// replay produces.
///
/// A nonzero count means the recorded linearization points do not fit a
/// single total order. It is a signal to investigate, not a failure: it can
/// come from a real linearizability bug or from a stamp-assignment race.
pub fn validate(log: &[Entry]) -> usize {
    let mut entries = log.to_vec();
    entries.sort_by_key(|entry| entry.timestamp);

    let mut replay = HashSet::new();
    let mut discrepancies = 0;
    for entry in &entries {
        let outcome = match entry.method {
            Method::Add => replay.insert(entry.argument),
            Method::Remove => replay.remove(&entry.argument),
            Method::Contains => replay.contains(&entry.argument),
        };
        if outcome != entry.returned {
            discrepancies += 1;
        }
    }
    discrepancies
}

/// Where a set sends the entry it creates at each linearization point.
///
/// Appends must be individually linearizable, but no order among concurrent
/// appends is assumed: replay re-establishes order from the timestamps.
pub trait OperationLog: Send + Sync {
    /// Records one entry. `thread_id` only selects the buffer in backends
    /// that keep per-thread state.
    fn record(&self, thread_id: usize, entry: Entry);

    /// Copies out the entries recorded so far, in no particular order.
    fn snapshot(&self) -> Vec<Entry>;

    /// Discards all entries. Exclusive access, so no synchronization.
    fn clear(&mut self);
}

/// Discards everything; the backend of the unlogged baseline variant.
#[derive(Default)]
pub struct NoLog;

impl OperationLog for NoLog {
    fn record(&self, _thread_id: usize, _entry: Entry) {}

    fn snapshot(&self) -> Vec<Entry> {
        Vec::new()
    }

    fn clear(&mut self) {}
}

/// A single shared lock-free queue from the ecosystem.
#[derive(Default)]
pub struct SharedLog {
    entries: SegQueue<Entry>,
}

impl OperationLog for SharedLog {
    fn record(&self, _thread_id: usize, entry: Entry) {
        self.entries.push(entry);
    }

    fn snapshot(&self) -> Vec<Entry> {
        // The queue cannot be iterated in place: drain and re-append. The
        // changed append order is irrelevant, replay sorts by timestamp.
        let mut out = Vec::with_capacity(self.entries.len());
        while let Some(entry) = self.entries.pop() {
            out.push(entry);
        }
        for entry in &out {
            self.entries.push(*entry);
        }
        out
    }

    fn clear(&mut self) {
        while self.entries.pop().is_some() {}
    }
}

/// The hand-rolled append-only queue.
#[derive(Default)]
pub struct LinkedLog {
    entries: AppendQueue<Entry>,
}

impl OperationLog for LinkedLog {
    fn record(&self, _thread_id: usize, entry: Entry) {
        self.entries.push(entry);
    }

    fn snapshot(&self) -> Vec<Entry> {
        self.entries.snapshot()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One padded buffer per worker thread, merged at snapshot time.
///
/// During a trial each buffer's mutex is only ever taken by its owning
/// thread, so appends never contend; the padding keeps the buffers off each
/// other's cache lines.
pub struct ThreadLog {
    buffers: Box<[CachePadded<Mutex<Vec<Entry>>>]>,
}

impl ThreadLog {
    /// A log with one buffer per thread. `record` panics on a thread id
    /// outside `0..threads`.
    pub fn new(threads: usize) -> Self {
        ThreadLog {
            buffers: (0..threads)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
        }
    }
}

impl OperationLog for ThreadLog {
    fn record(&self, thread_id: usize, entry: Entry) {
        self.buffers[thread_id]
            .lock()
            .expect("log buffer poisoned")
            .push(entry);
    }

    fn snapshot(&self) -> Vec<Entry> {
        let mut out = Vec::new();
        for buffer in self.buffers.iter() {
            out.extend_from_slice(&buffer.lock().expect("log buffer poisoned"));
        }
        out
    }

    fn clear(&mut self) {
        for buffer in self.buffers.iter_mut() {
            buffer.get_mut().expect("log buffer poisoned").clear();
        }
    }
}
