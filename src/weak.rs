//! Weak observer handle.

use std::fmt;

use crate::block::{release_weak, Link};
use crate::shared::Shared;

/// Non-owning observer of a shared target.
///
/// A weak handle never keeps the target alive; it keeps only the block's
/// bookkeeping alive, so it can always answer whether the target still
/// exists and attempt promotion to an owning handle.
///
/// # Example
///
/// ```
/// use tally_mem::Shared;
///
/// let owner = Shared::new(10);
/// let observer = owner.downgrade();
///
/// assert!(!observer.expired());
/// drop(owner);
/// assert!(observer.expired());
/// assert!(observer.upgrade().is_none());
/// ```
pub struct Weak<T: ?Sized> {
    pub(crate) link: Option<Link<T>>,
}

impl<T: ?Sized> Weak<T> {
    /// The empty observer: watches nothing, `expired` from birth.
    pub fn empty() -> Self {
        Weak { link: None }
    }

    /// Returns true if this handle observes nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.link.is_none()
    }

    /// Number of owning handles on the observed block, 0 for the empty
    /// observer.
    pub fn use_count(&self) -> usize {
        self.link.map_or(0, |link| link.counters().shared())
    }

    /// Returns true once the observed target has been released (and for the
    /// empty observer).
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Attempts promotion to an owning handle.
    ///
    /// Liveness is checked before any tally is touched: an expired observer
    /// returns `None` and the block's tallies never move.
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let link = self.link?;
        let counters = link.counters();
        if counters.shared() == 0 {
            return None;
        }
        counters.increment_shared();
        Some(Shared { link: Some(link) })
    }

    /// Drops this handle's observation, leaving it empty.
    pub fn reset(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe { release_weak(link.block) };
        }
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    fn clone(&self) -> Self {
        match self.link {
            Some(link) => {
                link.counters().increment_weak();
                Weak { link: Some(link) }
            }
            None => Weak::empty(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        // Same-block assignment only re-aims the exposed pointer.
        match (&mut self.link, source.link) {
            (Some(mine), Some(theirs))
                if std::ptr::addr_eq(mine.block.as_ptr(), theirs.block.as_ptr()) =>
            {
                mine.ptr = theirs.ptr;
                mine.projected = theirs.projected;
            }
            _ => *self = source.clone(),
        }
    }
}

impl<T: ?Sized> Drop for Weak<T> {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe { release_weak(link.block) };
        }
    }
}

impl<T: ?Sized> Default for Weak<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> From<&Shared<T>> for Weak<T> {
    fn from(owner: &Shared<T>) -> Self {
        owner.downgrade()
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}
