//! An unbounded lock-free append-only queue.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// A Michael–Scott-style queue reduced to what an operation log needs:
/// lock-free appends, a non-destructive snapshot, and wholesale clearing
/// under exclusive access.
///
/// Links are never dequeued one at a time; they are freed only by
/// [`AppendQueue::clear`] and `Drop`, both of which require `&mut self`.
/// That is what makes walking the links from `snapshot` safe under
/// concurrent appends without any reclamation scheme.
pub struct AppendQueue<T> {
    head: AtomicPtr<Link<T>>,
    tail: AtomicPtr<Link<T>>,
}

struct Link<T> {
    value: Option<T>,
    next: AtomicPtr<Link<T>>,
}

impl<T> Link<T> {
    fn sentinel() -> *mut Self {
        Box::into_raw(Box::new(Link {
            value: None,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

unsafe impl<T: Send> Send for AppendQueue<T> {}
unsafe impl<T: Send + Sync> Sync for AppendQueue<T> {}

impl<T> AppendQueue<T> {
    pub fn new() -> Self {
        let sentinel = Link::sentinel();
        AppendQueue {
            head: AtomicPtr::new(sentinel),
            tail: AtomicPtr::new(sentinel),
        }
    }

    /// Appends `value`. A failed link exchange means a concurrent append
    /// succeeded, and a lagging tail is moved forward by whoever observes it.
    pub fn push(&self, value: T) {
        let link = Box::into_raw(Box::new(Link {
            value: Some(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }));
        loop {
            let last = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*last).next.load(Ordering::Acquire) };
            if last != self.tail.load(Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                if unsafe {
                    (*last).next.compare_exchange(
                        ptr::null_mut(),
                        link,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                }
                .is_ok()
                {
                    // The link is visible; moving the tail is cooperative.
                    let _ =
                        self.tail
                            .compare_exchange(last, link, Ordering::AcqRel, Ordering::Acquire);
                    return;
                }
            } else {
                // Help a stalled append move the tail forward.
                let _ = self
                    .tail
                    .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire);
            }
        }
    }

    /// Copies out the current contents in append order. Safe under concurrent
    /// pushes: a link is immutable once its publishing exchange succeeds.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::new();
        let mut curr = unsafe { (*self.head.load(Ordering::Acquire)).next.load(Ordering::Acquire) };
        while !curr.is_null() {
            let link = unsafe { &*curr };
            if let Some(value) = &link.value {
                out.push(value.clone());
            }
            curr = link.next.load(Ordering::Acquire);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        unsafe { (*self.head.load(Ordering::Acquire)).next.load(Ordering::Acquire) }.is_null()
    }

    /// Frees every link and reinstalls a fresh sentinel.
    pub fn clear(&mut self) {
        self.free_links();
        let sentinel = Link::sentinel();
        *self.head.get_mut() = sentinel;
        *self.tail.get_mut() = sentinel;
    }

    fn free_links(&mut self) {
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            let link = unsafe { Box::from_raw(curr) };
            curr = link.next.load(Ordering::Relaxed);
        }
    }
}

impl<T> Default for AppendQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AppendQueue<T> {
    fn drop(&mut self) {
        self.free_links();
    }
}
