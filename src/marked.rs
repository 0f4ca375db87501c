use core::sync::atomic::{AtomicPtr, Ordering};

/// A `(reference, marked)` pair held in a single atomic word.
///
/// The mark records logical deletion and lives in the low bit of the pointer,
/// which is free because the pointee's alignment is at least 2. Reading
/// returns both fields from one load, and replacement goes through one
/// compare-and-exchange over the composed word, so a traverser can never
/// observe the mark and the reference as two separate updates.
pub(crate) struct MarkedRef<T> {
    inner: AtomicPtr<T>,
}

const MARK: usize = 0b1;

impl<T> MarkedRef<T> {
    pub(crate) fn new(ptr: *mut T, marked: bool) -> Self {
        MarkedRef {
            inner: AtomicPtr::new(compose(ptr, marked)),
        }
    }

    pub(crate) fn null() -> Self {
        Self::new(core::ptr::null_mut(), false)
    }

    /// Reads the reference and the mark together.
    pub(crate) fn load(&self) -> (*mut T, bool) {
        decompose(self.inner.load(Ordering::Acquire))
    }

    pub(crate) fn load_ref(&self) -> *mut T {
        self.load().0
    }

    pub(crate) fn store(&self, ptr: *mut T, marked: bool) {
        self.inner.store(compose(ptr, marked), Ordering::Release);
    }

    /// Replaces `(current, current_marked)` with `(new, new_marked)` in a
    /// single compare-and-exchange; both expected fields must match. On
    /// failure returns the pair that was observed instead.
    pub(crate) fn compare_exchange(
        &self,
        current: *mut T,
        current_marked: bool,
        new: *mut T,
        new_marked: bool,
    ) -> Result<(), (*mut T, bool)> {
        self.inner
            .compare_exchange(
                compose(current, current_marked),
                compose(new, new_marked),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(decompose)
    }
}

fn compose<T>(ptr: *mut T, marked: bool) -> *mut T {
    debug_assert!(core::mem::align_of::<T>() > 1);
    debug_assert_eq!(ptr as usize & MARK, 0);
    (ptr as usize | usize::from(marked)) as *mut T
}

fn decompose<T>(raw: *mut T) -> (*mut T, bool) {
    ((raw as usize & !MARK) as *mut T, raw as usize & MARK == MARK)
}

#[cfg(test)]
mod marked_test {
    use super::*;

    #[test]
    fn test_load_store_roundtrip() {
        let a = Box::into_raw(Box::new(7u64));
        let b = Box::into_raw(Box::new(8u64));

        let link = MarkedRef::new(a, false);
        assert_eq!(link.load(), (a, false));
        assert_eq!(link.load_ref(), a);

        link.store(b, true);
        assert_eq!(link.load(), (b, true));
        assert_eq!(link.load_ref(), b);

        unsafe {
            drop(Box::from_raw(a));
            drop(Box::from_raw(b));
        }
    }

    #[test]
    fn test_compare_exchange_checks_both_fields() {
        let a = Box::into_raw(Box::new(1u64));
        let b = Box::into_raw(Box::new(2u64));

        let link = MarkedRef::new(a, false);

        // wrong mark, right reference
        assert_eq!(link.compare_exchange(a, true, b, false), Err((a, false)));
        // wrong reference, right mark
        assert_eq!(link.compare_exchange(b, false, b, true), Err((a, false)));
        // both match: reference and mark swap in one step
        assert!(link.compare_exchange(a, false, b, true).is_ok());
        assert_eq!(link.load(), (b, true));

        unsafe {
            drop(Box::from_raw(a));
            drop(Box::from_raw(b));
        }
    }

    #[test]
    fn test_mark_in_place() {
        let a = Box::into_raw(Box::new(3u64));

        let link = MarkedRef::new(a, false);
        // marking keeps the reference and flips only the bit
        assert!(link.compare_exchange(a, false, a, true).is_ok());
        assert_eq!(link.load(), (a, true));
        // a second identical attempt fails, the mark is already set
        assert!(link.compare_exchange(a, false, a, true).is_err());

        unsafe { drop(Box::from_raw(a)) };
    }

    #[test]
    fn test_null_is_unmarked() {
        let link: MarkedRef<u64> = MarkedRef::null();
        let (ptr, marked) = link.load();
        assert!(ptr.is_null());
        assert!(!marked);
    }
}
