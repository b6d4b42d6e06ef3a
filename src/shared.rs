//! Shared ownership handle.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::ptr::NonNull;

use crate::block::{release_shared, EmplaceBlock, Link, Plain, PtrBlock};
use crate::error::Dangling;
use crate::weak::Weak;

/// Reference-counted owning handle.
///
/// Every clone co-owns the target; the target is released exactly when the
/// last owner lets go. A handle may also be empty (no target, no block), the
/// state `Default`, `reset` and a failed promotion produce.
///
/// Handles are single-threaded: the tallies are plain cells, and the type is
/// neither `Send` nor `Sync`.
///
/// # Example
///
/// ```
/// use tally_mem::Shared;
///
/// let a = Shared::new(vec![1, 2, 3]);
/// let b = a.clone();
///
/// assert_eq!(a.use_count(), 2);
/// assert_eq!(b.get(), Some(&vec![1, 2, 3]));
/// ```
pub struct Shared<T: ?Sized> {
    pub(crate) link: Option<Link<T>>,
}

impl<T: 'static> Shared<T> {
    /// Builds the target in place: target and tallies share one allocation.
    pub fn new(value: T) -> Self {
        Shared {
            link: Some(EmplaceBlock::<T, Plain>::emplace(value)),
        }
    }
}

impl<T: ?Sized + 'static> Shared<T> {
    /// Takes over an existing allocation; the block is allocated separately.
    pub fn from_box(target: Box<T>) -> Self {
        Shared {
            link: Some(PtrBlock::<T, Plain>::adopt(target)),
        }
    }
}

impl<T: ?Sized> Shared<T> {
    /// The empty handle: no target, no block.
    pub fn empty() -> Self {
        Shared { link: None }
    }

    /// Returns true if this handle owns nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.link.is_none()
    }

    /// The target, or `None` for the empty handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.link.map(|link| unsafe { link.ptr.as_ref() })
    }

    /// The target, unchecked.
    ///
    /// # Safety
    ///
    /// The handle must not be empty.
    #[inline]
    pub unsafe fn get_unchecked(&self) -> &T {
        debug_assert!(!self.is_empty(), "Dereferencing an empty handle");
        self.link.unwrap_unchecked().ptr.as_ref()
    }

    /// Number of owning handles on this block, 0 for the empty handle.
    pub fn use_count(&self) -> usize {
        self.link.map_or(0, |link| link.counters().shared())
    }

    /// Drops this handle's ownership, leaving it empty.
    pub fn reset(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe { release_shared(link.block) };
        }
    }

    /// A new observer of this handle's target.
    pub fn downgrade(&self) -> Weak<T> {
        match self.link {
            Some(link) => {
                link.counters().increment_weak();
                Weak { link: Some(link) }
            }
            None => Weak::empty(),
        }
    }

    /// Exclusive access to the target, granted only when this is the sole
    /// owner, no observer exists, and the handle still aims at the block's
    /// own target.
    ///
    /// A target bound through a `SelfRef` slot always has at least its own
    /// weak entry, so bound targets never pass this gate. Handles re-aimed
    /// by [`project`](Self::project) never pass it either: the projection
    /// closure may expose memory the block does not own.
    pub fn try_get_mut(&mut self) -> Option<&mut T> {
        let link = self.link?;
        let counters = link.counters();
        if !link.projected && counters.shared() == 1 && counters.weak() == 0 {
            Some(unsafe { &mut *link.ptr.as_ptr() })
        } else {
            None
        }
    }

    /// Re-aims this handle at a sub-object of its target. The returned
    /// handle co-owns the same block, so the whole target stays alive as
    /// long as the projection does.
    ///
    /// The empty handle projects to the empty handle. Projected handles are
    /// permanently read-only: [`try_get_mut`](Self::try_get_mut) refuses
    /// them.
    ///
    /// # Example
    ///
    /// ```
    /// use tally_mem::Shared;
    ///
    /// let pair = Shared::new((String::from("key"), 42));
    /// let key: Shared<String> = pair.clone().project(|p| &p.0);
    /// assert_eq!(key.get().map(String::as_str), Some("key"));
    /// ```
    pub fn project<U: ?Sized>(self, f: impl for<'a> FnOnce(&'a T) -> &'a U) -> Shared<U> {
        match self.link {
            Some(link) => {
                let ptr = NonNull::from(f(unsafe { link.ptr.as_ref() }));
                mem::forget(self);
                Shared {
                    link: Some(Link {
                        ptr,
                        block: link.block,
                        projected: true,
                    }),
                }
            }
            None => Shared::empty(),
        }
    }

    /// Fallible projection; hands the handle back untouched when `f`
    /// declines.
    pub fn try_project<U: ?Sized>(
        self,
        f: impl for<'a> FnOnce(&'a T) -> Option<&'a U>,
    ) -> Result<Shared<U>, Shared<T>> {
        let link = match self.link {
            Some(link) => link,
            None => return Ok(Shared::empty()),
        };
        match f(unsafe { link.ptr.as_ref() }) {
            Some(target) => {
                let ptr = NonNull::from(target);
                mem::forget(self);
                Ok(Shared {
                    link: Some(Link {
                        ptr,
                        block: link.block,
                        projected: true,
                    }),
                })
            }
            None => Err(self),
        }
    }

    /// Returns true if both handles expose the same target address.
    ///
    /// Two handles may share a block yet expose different sub-objects, and
    /// then they are not equal; empty handles compare equal to each other.
    pub fn ptr_eq(&self, other: &Shared<T>) -> bool {
        match (self.link, other.link) {
            (Some(a), Some(b)) => std::ptr::addr_eq(a.ptr.as_ptr(), b.ptr.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        match self.link {
            Some(link) => {
                link.counters().increment_shared();
                Shared { link: Some(link) }
            }
            None => Shared::empty(),
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

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe { release_shared(link.block) };
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> TryFrom<&Weak<T>> for Shared<T> {
    type Error = Dangling;

    /// Promotion; fails once the target has been released.
    fn try_from(observer: &Weak<T>) -> Result<Self, Dangling> {
        observer.upgrade().ok_or(Dangling)
    }
}

impl<T: ?Sized> PartialEq for Shared<T> {
    /// Identity of the exposed target, not value equality.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link
            .map(|link| link.ptr.cast::<u8>().as_ptr() as usize)
            .hash(state);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f
                .debug_struct("Shared")
                .field("value", &value)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("Shared(<empty>)"),
        }
    }
}
