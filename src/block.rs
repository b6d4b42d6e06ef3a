//! Control blocks backing the shared and weak handles.
//!
//! Two block shapes share one object-safe interface: `PtrBlock` owns a
//! separately allocated target through a pointer, `EmplaceBlock` carries the
//! target inline so target and tallies share a single allocation. Handles
//! never know which shape backs them.

use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use crate::count::Counters;

// ============================================================================
// Self-reference dispatch
// ============================================================================

/// Compile-time tag selecting whether a block compensates for the phantom
/// weak entry a bound `SelfRef` slot holds and never hands back.
pub(crate) trait SelfTag: 'static {
    const SELF_REFERENCING: bool;
}

/// Tag for ordinary targets; the compensation branch folds away.
pub(crate) struct Plain;

/// Tag for targets bound through a `SelfRef` slot.
pub(crate) struct SelfAware;

impl SelfTag for Plain {
    const SELF_REFERENCING: bool = false;
}

impl SelfTag for SelfAware {
    const SELF_REFERENCING: bool = true;
}

// ============================================================================
// Block interface
// ============================================================================

/// Object-safe interface the handles drive tally updates through.
///
/// The decrement methods return true when the caller must free the block
/// allocation. A block never frees itself: the `&self` borrow has to end
/// first, so the handle performs the `Box::from_raw` once the call returns.
pub(crate) trait Block {
    fn counters(&self) -> &Counters;

    /// Gives up one owning entry. Releases the target on the 1 -> 0
    /// transition.
    ///
    /// Caller must hold a counted shared entry on this block and surrenders
    /// it with this call.
    unsafe fn decrement_shared(&self) -> bool;

    /// Gives up one observer entry.
    ///
    /// Caller must hold a counted weak entry on this block and surrenders
    /// it with this call.
    unsafe fn decrement_weak(&self) -> bool;
}

/// Target pointer plus the block tracking it. Copied freely inside the
/// crate; the tallies are the source of truth for ownership.
pub(crate) struct Link<T: ?Sized> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) block: NonNull<dyn Block>,
    /// Raised by projection: `ptr` may no longer aim at block-owned memory.
    pub(crate) projected: bool,
}

impl<T: ?Sized> Link<T> {
    pub(crate) fn counters(&self) -> &Counters {
        unsafe { self.block.as_ref() }.counters()
    }
}

impl<T: ?Sized> Clone for Link<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Link<T> {}

/// Surrenders one counted shared entry, freeing the block when it was the
/// last interest in it.
pub(crate) unsafe fn release_shared(block: NonNull<dyn Block>) {
    if block.as_ref().decrement_shared() {
        drop(Box::from_raw(block.as_ptr()));
    }
}

/// Surrenders one counted weak entry, freeing the block when it was the
/// last interest in it.
pub(crate) unsafe fn release_weak(block: NonNull<dyn Block>) {
    if block.as_ref().decrement_weak() {
        drop(Box::from_raw(block.as_ptr()));
    }
}

// ============================================================================
// Decrement algorithm, shared by both block shapes
// ============================================================================

/// Shared-side decrement. `release` drops the target and runs exactly once,
/// on the transition to zero. The `releasing` flag is up for its duration so
/// weak entries surrendered from inside it (the target's own drop code may
/// hold weak handles to the dying target) defer the free decision to this
/// frame.
unsafe fn drain_shared<S: SelfTag, F: FnOnce()>(counters: &Counters, release: F) -> bool {
    debug_assert!(!counters.releasing(), "Owner surrendered during release");
    if counters.decrement_shared() > 0 {
        return false;
    }
    counters.set_releasing(true);
    release();
    counters.set_releasing(false);
    block_done::<S>(counters)
}

/// Weak-side decrement.
unsafe fn drain_weak<S: SelfTag>(counters: &Counters) -> bool {
    counters.decrement_weak();
    if counters.releasing() {
        // The shared-side frame below us owns the free decision.
        return false;
    }
    counters.shared() == 0 && block_done::<S>(counters)
}

/// With the target gone, is the block itself done? For self-aware blocks a
/// lone weak entry is provably the phantom held by the target's own slot;
/// nothing will ever surrender it, so the block must go now.
fn block_done<S: SelfTag>(counters: &Counters) -> bool {
    let weak = counters.weak();
    weak == 0 || (S::SELF_REFERENCING && weak == 1)
}

// ============================================================================
// PtrBlock: two allocations, block owns the target by pointer
// ============================================================================

pub(crate) struct PtrBlock<T: ?Sized, S: SelfTag> {
    counters: Counters,
    target: Cell<Option<NonNull<T>>>,
    _tag: PhantomData<S>,
}

impl<T: ?Sized + 'static, S: SelfTag> PtrBlock<T, S> {
    /// Takes over `target`'s allocation behind a fresh block. The caller
    /// receives the sole counted shared entry.
    pub(crate) fn adopt(target: Box<T>) -> Link<T> {
        let ptr = NonNull::from(Box::leak(target));
        let block = Box::new(Self {
            counters: Counters::new(),
            target: Cell::new(Some(ptr)),
            _tag: PhantomData,
        });
        Link {
            ptr,
            block: NonNull::from(Box::leak(block)),
            projected: false,
        }
    }
}

impl<T: ?Sized, S: SelfTag> Block for PtrBlock<T, S> {
    fn counters(&self) -> &Counters {
        &self.counters
    }

    unsafe fn decrement_shared(&self) -> bool {
        drain_shared::<S, _>(&self.counters, || {
            if let Some(target) = self.target.take() {
                unsafe { drop(Box::from_raw(target.as_ptr())) };
            }
        })
    }

    unsafe fn decrement_weak(&self) -> bool {
        drain_weak::<S>(&self.counters)
    }
}

// ============================================================================
// EmplaceBlock: target and tallies in one allocation
// ============================================================================

pub(crate) struct EmplaceBlock<T, S: SelfTag> {
    counters: Counters,
    value: UnsafeCell<ManuallyDrop<T>>,
    _tag: PhantomData<S>,
}

impl<T: 'static, S: SelfTag> EmplaceBlock<T, S> {
    /// Moves `value` into a fresh block, target and tallies together. The
    /// caller receives the sole counted shared entry.
    pub(crate) fn emplace(value: T) -> Link<T> {
        let block = Box::leak(Box::new(Self {
            counters: Counters::new(),
            value: UnsafeCell::new(ManuallyDrop::new(value)),
            _tag: PhantomData,
        }));
        Link {
            ptr: unsafe { NonNull::new_unchecked(block.value.get().cast::<T>()) },
            block: NonNull::from(block),
            projected: false,
        }
    }
}

impl<T, S: SelfTag> Block for EmplaceBlock<T, S> {
    fn counters(&self) -> &Counters {
        &self.counters
    }

    unsafe fn decrement_shared(&self) -> bool {
        drain_shared::<S, _>(&self.counters, || {
            unsafe { ManuallyDrop::drop(&mut *self.value.get()) };
        })
    }

    unsafe fn decrement_weak(&self) -> bool {
        drain_weak::<S>(&self.counters)
    }
}
