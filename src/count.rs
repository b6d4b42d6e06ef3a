//! Tally pair backing every control block.

use std::cell::Cell;

/// Shared and weak tallies for one control block.
///
/// `shared` counts owning handles; the target lives exactly while it is
/// positive. `weak` counts observers; the block's own allocation lives while
/// either tally is positive. `releasing` is raised for the duration of the
/// target's drop so that weak entries handed back from inside it leave the
/// free decision to the frame already tearing the block down.
///
/// Plain `Cell` arithmetic: handles are single-threaded by construction.
#[derive(Debug)]
pub(crate) struct Counters {
    shared: Cell<usize>,
    weak: Cell<usize>,
    releasing: Cell<bool>,
}

impl Counters {
    /// A fresh block starts with one owner and no observers.
    pub(crate) fn new() -> Self {
        Self {
            shared: Cell::new(1),
            weak: Cell::new(0),
            releasing: Cell::new(false),
        }
    }

    #[inline]
    pub(crate) fn shared(&self) -> usize {
        self.shared.get()
    }

    #[inline]
    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    /// Aborts on overflow: a wrapped tally releases the target early.
    #[inline]
    pub(crate) fn increment_shared(&self) {
        match self.shared.get().checked_add(1) {
            Some(tally) => self.shared.set(tally),
            None => std::process::abort(),
        }
    }

    /// Returns the new value.
    #[inline]
    pub(crate) fn decrement_shared(&self) -> usize {
        let val = self.shared.get();
        debug_assert!(val > 0, "Decrementing zero shared count");
        self.shared.set(val - 1);
        val - 1
    }

    /// Aborts on overflow: a wrapped tally frees the block early.
    #[inline]
    pub(crate) fn increment_weak(&self) {
        match self.weak.get().checked_add(1) {
            Some(tally) => self.weak.set(tally),
            None => std::process::abort(),
        }
    }

    /// Returns the new value.
    #[inline]
    pub(crate) fn decrement_weak(&self) -> usize {
        let val = self.weak.get();
        debug_assert!(val > 0, "Decrementing zero weak count");
        self.weak.set(val - 1);
        val - 1
    }

    #[inline]
    pub(crate) fn releasing(&self) -> bool {
        self.releasing.get()
    }

    #[inline]
    pub(crate) fn set_releasing(&self, on: bool) {
        self.releasing.set(on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_counters() {
        let counters = Counters::new();
        assert_eq!(counters.shared(), 1);
        assert_eq!(counters.weak(), 0);
        assert!(!counters.releasing());
    }

    #[test]
    fn test_shared_tally() {
        let counters = Counters::new();
        counters.increment_shared();
        counters.increment_shared();
        assert_eq!(counters.shared(), 3);
        assert_eq!(counters.decrement_shared(), 2);
        assert_eq!(counters.decrement_shared(), 1);
        assert_eq!(counters.decrement_shared(), 0);
    }

    #[test]
    fn test_weak_tally() {
        let counters = Counters::new();
        counters.increment_weak();
        counters.increment_weak();
        assert_eq!(counters.weak(), 2);
        assert_eq!(counters.decrement_weak(), 1);
        assert_eq!(counters.decrement_weak(), 0);
    }

    #[test]
    fn test_increment_at_tally_ceiling() {
        // One step below the ceiling still counts; only a wrap aborts.
        let counters = Counters::new();
        counters.shared.set(usize::MAX - 1);
        counters.increment_shared();
        assert_eq!(counters.shared(), usize::MAX);

        counters.weak.set(usize::MAX - 1);
        counters.increment_weak();
        assert_eq!(counters.weak(), usize::MAX);
    }

    #[test]
    fn test_releasing_flag() {
        let counters = Counters::new();
        counters.set_releasing(true);
        assert!(counters.releasing());
        counters.set_releasing(false);
        assert!(!counters.releasing());
    }
}
