//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued. It re-runs when the
//!    queue is flushed: right after the write, or at the end of the
//!    outermost batch.
//!
//! 3. Before re-running, the effect rewinds its dependency list; whatever
//!    the new run does not read again is unlinked afterwards.
//!
//! # Ownership
//!
//! An effect created while another effect (or a scope) is running is owned
//! by it. When the owner re-runs or is disposed, the effects it owned are
//! disposed with it. An inner effect whose dependencies change re-runs on
//! its own, without re-running its owner.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when deps change).
//! - Computeds cache results; effects just run their side effect.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::graph::NodeId;

use super::runtime::Runtime;

/// Handle to a running effect.
///
/// Dropping the handle does not stop the effect; call [`Effect::dispose`].
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use signals_core::reactive::{effect, signal};
///
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let e = effect({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.set(count.get())
/// });
/// assert_eq!(seen.get(), 0);
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
///
/// e.dispose();
/// count.set(6);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    node: NodeId,
    _not_send: PhantomData<*const ()>,
}

impl Effect {
    /// Create an effect and run it once.
    pub fn new(run: impl Fn() + 'static) -> Self {
        let node = Runtime::with(|rt| rt.create_effect(Rc::new(run)));
        Self {
            node,
            _not_send: PhantomData,
        }
    }

    /// The effect's node in the graph.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// Stop the effect: unlink it from its dependencies and its owner, and
    /// dispose the effects it owns. Disposing twice is a no-op.
    pub fn dispose(&self) {
        Runtime::with(|rt| rt.dispose(self.node));
    }

    pub fn is_disposed(&self) -> bool {
        Runtime::with(|rt| !rt.graph(|graph| graph.contains(self.node)))
    }

    /// Number of nodes the last run read, plus the inner effects it owns.
    pub fn dependency_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.dependency_count(self.node)))
    }
}

/// Create an effect. Shorthand for [`Effect::new`].
pub fn effect(run: impl Fn() + 'static) -> Effect {
    Effect::new(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal;
    use std::cell::Cell;

    #[test]
    fn effect_runs_immediately() {
        let count = Rc::new(Cell::new(0));
        let _e = effect({
            let count = count.clone();
            move || count.set(count.get() + 1)
        });
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn effect_reruns_on_change() {
        let s = signal(1);
        let seen = Rc::new(Cell::new(0));
        let _e = effect({
            let (s, seen) = (s.clone(), seen.clone());
            move || seen.set(s.get())
        });

        s.set(7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn dispose_is_idempotent() {
        let s = signal(1);
        let e = effect({
            let s = s.clone();
            move || {
                s.get();
            }
        });
        assert_eq!(e.dependency_count(), 1);

        e.dispose();
        e.dispose();
        assert!(e.is_disposed());
        assert_eq!(s.subscriber_count(), 0);
        assert_eq!(e.dependency_count(), 0);
    }

    #[test]
    fn dropping_the_handle_keeps_the_effect() {
        let s = signal(1);
        let seen = Rc::new(Cell::new(0));
        drop(effect({
            let (s, seen) = (s.clone(), seen.clone());
            move || seen.set(s.get())
        }));

        s.set(3);
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn disposing_frees_captured_handles() {
        let s = signal(1);
        let e = effect({
            let s = s.clone();
            move || {
                s.get();
            }
        });
        let id = s.id();
        e.dispose();
        drop(s);

        assert!(!Runtime::with(|rt| rt.graph(|graph| graph.contains(id))));
    }
}
