//! Sole-ownership handle with a pluggable release action.

use std::fmt;
use std::ptr::NonNull;

/// Disposal strategy for an [`Exclusive`] target.
pub trait ReleaseAction<T: ?Sized> {
    /// Disposes of `target`.
    ///
    /// # Safety
    ///
    /// `target` is the pointer this action's handle took ownership of, and
    /// it is released through here exactly once.
    unsafe fn release(&mut self, target: NonNull<T>);
}

/// Default action: the target lives in a `Box` allocation.
///
/// Covers slices too: `Box<[T]>` drop glue releases element-wise, so
/// targets built with [`Exclusive::from_vec`] need nothing special.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxRelease;

impl<T: ?Sized> ReleaseAction<T> for BoxRelease {
    #[inline]
    unsafe fn release(&mut self, target: NonNull<T>) {
        drop(Box::from_raw(target.as_ptr()));
    }
}

/// Move-only sole owner of a heap target.
///
/// No tallies, no block: exactly one handle owns the target, and dropping
/// the handle (or `reset`) disposes of it through the release action.
///
/// # Example
///
/// ```
/// use tally_mem::Exclusive;
///
/// let mut owner = Exclusive::new(vec![1, 2]);
/// owner.as_mut().unwrap().push(3);
/// assert_eq!(owner.as_ref(), Some(&vec![1, 2, 3]));
/// ```
pub struct Exclusive<T: ?Sized, R: ReleaseAction<T> = BoxRelease> {
    target: Option<NonNull<T>>,
    action: R,
}

impl<T> Exclusive<T, BoxRelease> {
    /// Allocates and owns `value`.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> Exclusive<T, BoxRelease> {
    /// Takes over an existing allocation.
    pub fn from_box(target: Box<T>) -> Self {
        Exclusive {
            target: Some(NonNull::from(Box::leak(target))),
            action: BoxRelease,
        }
    }

    /// Recovers the allocation, leaving nothing behind to release.
    pub fn into_box(mut self) -> Option<Box<T>> {
        self.target
            .take()
            .map(|target| unsafe { Box::from_raw(target.as_ptr()) })
    }

    /// Releases the current target, then owns `target` instead.
    pub fn replace_box(&mut self, target: Box<T>) {
        self.reset();
        self.target = Some(NonNull::from(Box::leak(target)));
    }
}

impl<T> Exclusive<[T], BoxRelease> {
    /// Owns the vector's elements as a boxed slice.
    pub fn from_vec(values: Vec<T>) -> Self {
        Self::from_box(values.into_boxed_slice())
    }
}

impl<T: ?Sized, R: ReleaseAction<T>> Exclusive<T, R> {
    /// Owns `target`, to be disposed of through `action`.
    ///
    /// # Safety
    ///
    /// `target` must stay valid until released, and running `action` on it
    /// must be the correct way to dispose of it.
    pub unsafe fn from_raw(target: NonNull<T>, action: R) -> Self {
        Exclusive {
            target: Some(target),
            action,
        }
    }

    /// Returns true if this handle owns nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    /// The target, or `None` for the empty handle.
    #[inline]
    pub fn as_ref(&self) -> Option<&T> {
        self.target.map(|target| unsafe { target.as_ref() })
    }

    /// The target, mutably. Sole ownership makes this always safe to grant.
    #[inline]
    pub fn as_mut(&mut self) -> Option<&mut T> {
        self.target.map(|mut target| unsafe { target.as_mut() })
    }

    /// The raw target, ownership retained.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.target
    }

    /// Surrenders the target without running the action. The caller owns
    /// the pointed-to resource from here on.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.target.take()
    }

    /// Disposes of the current target, leaving the handle empty.
    pub fn reset(&mut self) {
        if let Some(target) = self.target.take() {
            unsafe { self.action.release(target) };
        }
    }

    /// The release action.
    pub fn action(&self) -> &R {
        &self.action
    }

    /// The release action, mutably.
    pub fn action_mut(&mut self) -> &mut R {
        &mut self.action
    }
}

impl<T: ?Sized, R: ReleaseAction<T>> Drop for Exclusive<T, R> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, R: ReleaseAction<T> + Default> Default for Exclusive<T, R> {
    fn default() -> Self {
        Exclusive {
            target: None,
            action: R::default(),
        }
    }
}

impl<T: ?Sized + fmt::Debug, R: ReleaseAction<T>> fmt::Debug for Exclusive<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_ref() {
            Some(value) => f.debug_struct("Exclusive").field("value", &value).finish(),
            None => f.write_str("Exclusive(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropTracker(Rc<Cell<bool>>);

    impl Drop for DropTracker {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[test]
    fn test_new_and_access() {
        let mut owner = Exclusive::new(String::from("a"));
        owner.as_mut().unwrap().push('b');
        assert_eq!(owner.as_ref().map(String::as_str), Some("ab"));
        assert!(!owner.is_empty());
    }

    #[test]
    fn test_drop_releases() {
        let dropped = Rc::new(Cell::new(false));
        let owner = Exclusive::new(DropTracker(dropped.clone()));
        drop(owner);
        assert!(dropped.get());
    }

    #[test]
    fn test_reset_releases_and_empties() {
        let dropped = Rc::new(Cell::new(false));
        let mut owner = Exclusive::new(DropTracker(dropped.clone()));
        owner.reset();
        assert!(dropped.get());
        assert!(owner.is_empty());
        assert!(owner.as_ref().is_none());
    }

    #[test]
    fn test_into_box_recovers_allocation() {
        let owner = Exclusive::new(7);
        let recovered = owner.into_box().expect("owned a target");
        assert_eq!(*recovered, 7);

        let empty: Exclusive<i32> = Exclusive::default();
        assert!(empty.into_box().is_none());
    }

    #[test]
    fn test_as_ptr_keeps_ownership() {
        let owner = Exclusive::new(8);
        let raw = owner.as_ptr().expect("owned a target");
        assert!(std::ptr::eq(
            raw.as_ptr(),
            owner.as_ref().expect("owned a target")
        ));
        assert!(!owner.is_empty());

        let empty: Exclusive<i32> = Exclusive::default();
        assert!(empty.as_ptr().is_none());
    }

    #[test]
    fn test_release_surrenders_ownership() {
        let dropped = Rc::new(Cell::new(false));
        let mut owner = Exclusive::new(DropTracker(dropped.clone()));
        let raw = owner.release().expect("owned a target");

        drop(owner);
        // The handle no longer owns it; nothing was released.
        assert!(!dropped.get());

        drop(unsafe { Box::from_raw(raw.as_ptr()) });
        assert!(dropped.get());
    }

    #[test]
    fn test_replace_box_releases_previous() {
        let first = Rc::new(Cell::new(false));
        let mut owner = Exclusive::new(DropTracker(first.clone()));

        let second = Rc::new(Cell::new(false));
        owner.replace_box(Box::new(DropTracker(second.clone())));
        assert!(first.get());
        assert!(!second.get());
    }

    #[test]
    fn test_from_vec_slice_target() {
        let mut owner = Exclusive::from_vec(vec![1, 2, 3]);
        owner.as_mut().unwrap()[0] = 9;
        assert_eq!(owner.as_ref(), Some(&[9, 2, 3][..]));
    }

    #[test]
    fn test_custom_release_action() {
        struct Recorded(Rc<Cell<u32>>);

        impl ReleaseAction<u32> for Recorded {
            unsafe fn release(&mut self, target: NonNull<u32>) {
                self.0.set(*target.as_ref());
                drop(Box::from_raw(target.as_ptr()));
            }
        }

        let seen = Rc::new(Cell::new(0));
        let target = NonNull::from(Box::leak(Box::new(41u32)));
        let owner = unsafe { Exclusive::from_raw(target, Recorded(seen.clone())) };

        assert_eq!(owner.as_ref(), Some(&41));
        drop(owner);
        assert_eq!(seen.get(), 41);
    }

    #[test]
    fn test_action_accessors() {
        #[derive(Default)]
        struct Counting(u32);

        impl ReleaseAction<i32> for Counting {
            unsafe fn release(&mut self, target: NonNull<i32>) {
                self.0 += 1;
                drop(Box::from_raw(target.as_ptr()));
            }
        }

        let target = NonNull::from(Box::leak(Box::new(5)));
        let mut owner = unsafe { Exclusive::from_raw(target, Counting::default()) };
        assert_eq!(owner.action().0, 0);
        owner.action_mut().0 = 10;
        owner.reset();
        assert_eq!(owner.action().0, 11);
    }

    #[test]
    fn test_debug_output() {
        let owner = Exclusive::new(3);
        assert!(format!("{owner:?}").contains("Exclusive"));
        let empty: Exclusive<i32> = Exclusive::default();
        assert_eq!(format!("{empty:?}"), "Exclusive(<empty>)");
    }
}
