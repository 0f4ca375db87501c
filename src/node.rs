use core::ptr;
use core::sync::atomic::{AtomicI64, AtomicPtr};

use crate::marked::MarkedRef;

/// Highest level a node can participate in; levels are `0..=MAX_LEVEL`.
pub(crate) const MAX_LEVEL: usize = 16;

/// A skip-list node. The value is fixed at construction; all mutability lives
/// in the per-level links, the removal timestamp, and the tracking link.
///
/// `value` is `None` only for the two sentinels. The tail is the only
/// sentinel ever reached as a successor, so during traversal `None` always
/// compares greater than every stored value; the head's value is never
/// compared at all.
pub(crate) struct Node<T> {
    pub(crate) value: Option<T>,
    pub(crate) next: Box<[MarkedRef<Node<T>>]>,
    pub(crate) top_level: usize,
    /// Clock reading of the bottom-level mark that removed this node,
    /// -1 until some remove wins that mark.
    pub(crate) removal_stamp: AtomicI64,
    /// Intrusive link chaining every published node, walked by reset/drop.
    pub(crate) tracked: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T, top_level: usize) -> Self {
        Self::build(Some(value), top_level)
    }

    /// Sentinels participate in every level and hold no value.
    pub(crate) fn sentinel() -> Self {
        Self::build(None, MAX_LEVEL)
    }

    fn build(value: Option<T>, top_level: usize) -> Self {
        debug_assert!(top_level <= MAX_LEVEL);
        Node {
            value,
            next: (0..=top_level).map(|_| MarkedRef::null()).collect(),
            top_level,
            removal_stamp: AtomicI64::new(-1),
            tracked: AtomicPtr::new(ptr::null_mut()),
        }
    }
}
