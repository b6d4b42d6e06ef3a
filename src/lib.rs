//! # Tally-Mem
//!
//! Manual ownership handles for heap targets: shared handles that keep a
//! target alive by tally, weak handles that observe it without owning it,
//! and an exclusive handle for sole ownership. No garbage collector and no
//! cycle detection; lifetimes end exactly when the tallies say so.
//!
//! ## Features
//!
//! - **Shared ownership**: [`Shared<T>`] keeps its target alive until the
//!   last shared handle is gone. Cloning a handle is a tally increment,
//!   never a copy of the target.
//! - **Weak observation**: [`Weak<T>`] watches a target without extending
//!   its life, and promotes back to a [`Shared`] only while the target is
//!   still alive.
//! - **Aliased views**: [`Shared::project`] yields a read-only handle to a
//!   part of the target (a field, a trait view) that keeps the whole alive.
//! - **Self-reference**: types implementing [`SelfReferencing`] can mint
//!   handles to themselves from inside their own methods.
//! - **Sole ownership**: [`Exclusive<T>`] owns one target outright, with a
//!   pluggable [`ReleaseAction`] for targets that are not plain boxes.
//!
//! ## Quick Start
//!
//! ```
//! use tally_mem::Shared;
//!
//! let a = Shared::new(vec![1, 2, 3]);
//! let b = a.clone();
//! assert_eq!(a.use_count(), 2);
//! assert!(a.ptr_eq(&b));
//!
//! let observer = a.downgrade();
//! drop(a);
//! drop(b);
//!
//! // Both owners are gone: the vector was released, the observer knows.
//! assert!(observer.expired());
//! assert!(observer.upgrade().is_none());
//! ```

mod block;
mod count;
mod error;
mod exclusive;
mod self_ref;
mod shared;
mod weak;

pub use error::Dangling;
pub use exclusive::{BoxRelease, Exclusive, ReleaseAction};
pub use self_ref::{SelfRef, SelfReferencing};
pub use shared::Shared;
pub use weak::Weak;
