//! Self-referencing targets.
//!
//! A managed value sometimes needs handles to itself that agree with the
//! ownership the outside world already holds (callback registries, intrusive
//! graphs). Embedding a `SelfRef` slot and implementing `SelfReferencing`
//! gives a type that ability; the factories on the trait bind the slot at
//! the moment the value comes under management.

use std::cell::Cell;
use std::fmt;

use crate::block::{EmplaceBlock, Link, PtrBlock, SelfAware};
use crate::error::Dangling;
use crate::shared::Shared;
use crate::weak::Weak;

/// Slot a self-referencing type embeds.
///
/// Starts unbound; the `SelfReferencing` factories bind it right after the
/// value reaches its managed storage. Binding registers one weak entry that
/// is never surrendered; the slot has no drop code, which is the
/// detach-without-decrement the block's teardown compensates for.
pub struct SelfRef<T: ?Sized> {
    link: Cell<Option<Link<T>>>,
}

impl<T: ?Sized> SelfRef<T> {
    /// An unbound slot.
    pub fn new() -> Self {
        SelfRef {
            link: Cell::new(None),
        }
    }
}

impl<T: ?Sized> Default for SelfRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for SelfRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.link.get().is_some() {
            f.write_str("SelfRef(bound)")
        } else {
            f.write_str("SelfRef(unbound)")
        }
    }
}

/// Capability for managed values that mint handles to themselves.
///
/// Implementors embed a [`SelfRef<Self>`] field and hand it out unchanged:
///
/// ```
/// use tally_mem::{SelfRef, SelfReferencing, Shared};
///
/// struct Node {
///     name: String,
///     self_ref: SelfRef<Node>,
/// }
///
/// unsafe impl SelfReferencing for Node {
///     fn self_ref(&self) -> &SelfRef<Node> {
///         &self.self_ref
///     }
/// }
///
/// let node = Node { name: "a".into(), self_ref: SelfRef::new() }.into_shared();
/// let again = node.get().unwrap().shared_from_self().unwrap();
/// assert!(node.ptr_eq(&again));
/// assert_eq!(node.use_count(), 2);
/// assert_eq!(again.get().map(|n| n.name.as_str()), Some("a"));
/// ```
///
/// # Safety
///
/// `self_ref` must return a slot stored directly inside `*self`, the same
/// one every time, for the value's whole life. The factories below bind that
/// slot when they place the value under management and afterwards trust it
/// to describe that managed storage; a slot borrowed from another instance,
/// or a fresh one conjured per call, would let minted handles outlive their
/// block.
pub unsafe trait SelfReferencing: Sized + 'static {
    /// The embedded slot.
    fn self_ref(&self) -> &SelfRef<Self>;

    /// Moves `self` under management, value and tallies in one allocation,
    /// and binds the slot.
    fn into_shared(self) -> Shared<Self> {
        let link = EmplaceBlock::<Self, SelfAware>::emplace(self);
        bind(link);
        Shared { link: Some(link) }
    }

    /// Adopts the boxed value behind a separately allocated block and binds
    /// the slot.
    fn into_shared_boxed(self: Box<Self>) -> Shared<Self> {
        let link = PtrBlock::<Self, SelfAware>::adopt(self);
        bind(link);
        Shared { link: Some(link) }
    }

    /// A counted owning handle to this managed value.
    ///
    /// Fails while the value is not under management (it never went through
    /// a factory above) or once its release has begun.
    fn shared_from_self(&self) -> Result<Shared<Self>, Dangling> {
        let link = self.self_ref().link.get().ok_or(Dangling)?;
        let counters = link.counters();
        if counters.shared() == 0 {
            return Err(Dangling);
        }
        counters.increment_shared();
        Ok(Shared { link: Some(link) })
    }

    /// A counted observer handle to this managed value, or the empty
    /// observer when the value is not under management.
    fn weak_from_self(&self) -> Weak<Self> {
        match self.self_ref().link.get() {
            Some(link) => {
                link.counters().increment_weak();
                Weak { link: Some(link) }
            }
            None => Weak::empty(),
        }
    }
}

/// Registers the phantom weak entry, then aims the slot at its block.
fn bind<T: SelfReferencing>(link: Link<T>) {
    link.counters().increment_weak();
    unsafe { link.ptr.as_ref() }.self_ref().link.set(Some(link));
}
