//! Computed Values
//!
//! A computed is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes, and only when it is read.
//!
//! # Lazy Evaluation
//!
//! Writes never run getters. A write only marks the computeds downstream:
//! `Dirty` if they read the written signal directly, `Pending` otherwise.
//! The next read of a pending computed walks its dependencies first; if
//! none of them produced a new value, the cached result is reused without
//! running the getter at all.
//!
//! # Equality
//!
//! The new value is compared with the cached one using `PartialEq`. An
//! equal result does not count as a change, so readers further down stay
//! clean.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::error::{ReactiveError, Result};
use crate::graph::node::{Recompute, Role, Status};
use crate::graph::NodeId;

use super::batch::BatchGuard;
use super::runtime::Runtime;

/// A lazily evaluated, cached derivation.
///
/// The getter receives the previously computed value, if any.
///
/// # Example
///
/// ```rust
/// use signals_core::reactive::{computed, signal};
///
/// let count = signal(2);
/// let doubled = computed({
///     let count = count.clone();
///     move |_| count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    node: NodeId,
    getter: Box<dyn Fn(Option<&T>) -> T>,
    value: RefCell<Option<T>>,
}

impl<T: PartialEq> Recompute for ComputedInner<T> {
    fn recompute(&self) -> bool {
        let next = {
            let current = self.value.borrow();
            (self.getter)(current.as_ref())
        };
        let previous = {
            let mut slot = self.value.borrow_mut();
            if slot.as_ref() == Some(&next) {
                return false;
            }
            slot.replace(next)
        };
        drop(previous);
        true
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        let node = self.node;
        Runtime::try_with(|rt| rt.release(node));
    }
}

impl<T: PartialEq + 'static> Computed<T> {
    /// Create a computed. The getter does not run until the first read.
    pub fn new(getter: impl Fn(Option<&T>) -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let body: Weak<dyn Recompute> = weak.clone();
            let node = Runtime::with(|rt| {
                rt.create(Role::Computed {
                    status: Status::dirty(),
                    body,
                })
            });
            ComputedInner {
                node,
                getter: Box::new(getter),
                value: RefCell::new(None),
            }
        });
        Self { inner }
    }
}

impl<T: 'static> Computed<T> {
    /// The computed's node in the graph.
    pub fn id(&self) -> NodeId {
        self.inner.node
    }

    /// Get the current value, recomputing it first if needed.
    ///
    /// # Panics
    ///
    /// Panics if the computed reads itself, directly or through other
    /// computeds. Use [`Computed::try_get`] to handle that case.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Get the current value, or an error if reading it would form a cycle.
    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.refresh()?;
        self.cached(T::clone)
    }

    /// Borrow the current value, recomputing it first if needed.
    ///
    /// Writes made by `f` are batched until the borrow ends, so `f` may
    /// write the computed's own sources. It must not read the computed again
    /// after doing so.
    ///
    /// # Panics
    ///
    /// Panics on a cycle, like [`Computed::get`].
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Borrow the current value, or return an error if reading it would
    /// form a cycle.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.refresh()?;
        let _batch = BatchGuard::new();
        self.cached(f)
    }

    fn refresh(&self) -> Result<()> {
        let node = self.inner.node;
        Runtime::with(|rt| {
            rt.refresh_computed(node)?;
            rt.track_computed(node);
            Ok::<_, ReactiveError>(())
        })
    }

    fn cached<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let value = self.inner.value.borrow();
        value
            .as_ref()
            .map(f)
            .ok_or_else(|| ReactiveError::Disposed(format!("{:?}", self.inner.node)))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.subscriber_count(self.inner.node)))
    }

    /// Number of nodes read by the last evaluation.
    pub fn dependency_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.dependency_count(self.inner.node)))
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.node)
            .field("cached", &self.inner.value.try_borrow().ok().as_deref())
            .finish()
    }
}

/// Create a computed. Shorthand for [`Computed::new`].
pub fn computed<T: PartialEq + 'static>(
    getter: impl Fn(Option<&T>) -> T + 'static,
) -> Computed<T> {
    Computed::new(getter)
}
