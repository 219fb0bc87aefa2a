//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    runtime links the signal to that context.
//!
//! 2. When a signal's value changes, its subscribers are marked and the
//!    effects among them (direct or downstream) are flushed.
//!
//! 3. Writing a value equal to the current one does nothing.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A node id in the runtime's graph (8 bytes)
//! - The value, behind a `RefCell` shared by all clones of the handle
//!
//! The graph node is freed when the last clone is dropped.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::graph::node::Role;
use crate::graph::NodeId;

use super::batch::BatchGuard;
use super::runtime::Runtime;

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use signals_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    node: NodeId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        let node = self.node;
        Runtime::try_with(|rt| rt.release(node));
    }
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        let node = Runtime::with(|rt| rt.create(Role::Signal));
        Self {
            inner: Rc::new(SignalInner {
                node,
                value: RefCell::new(value),
            }),
        }
    }

    /// The signal's node in the graph.
    pub fn id(&self) -> NodeId {
        self.inner.node
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        Runtime::with(|rt| rt.track(self.inner.node));
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, tracking the read.
    ///
    /// Writes made by `f` are batched until the borrow ends. `f` must not
    /// write to this signal directly.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::with(|rt| rt.track(self.inner.node));
        let _batch = BatchGuard::new();
        let value = self.inner.value.borrow();
        f(&value)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Nothing happens if the new value equals the current one.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        let previous = {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return;
            }
            std::mem::replace(&mut *slot, value)
        };
        // The old value may own handles; drop it with the value released.
        drop(previous);
        self.notify();
    }

    /// Modify the value in place and notify subscribers.
    ///
    /// Unlike [`Signal::set`], this always notifies: there is no previous
    /// value to compare against.
    ///
    /// # Panics
    ///
    /// The value stays mutably borrowed while `f` runs, so reading or
    /// writing this signal from inside `f` panics.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    fn notify(&self) {
        Runtime::with(|rt| rt.signal_changed(self.inner.node));
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.subscriber_count(self.inner.node)))
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.node)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a signal. Shorthand for [`Signal::new`].
pub fn signal<T: 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(vec![1, 2]);
        signal.update(|v| v.push(3));
        assert_eq!(signal.get(), vec![1, 2, 3]);
    }

    #[test]
    fn equal_writes_do_not_notify() {
        let s = signal(1);
        let runs = Rc::new(Cell::new(0));
        let _e = effect({
            let (s, runs) = (s.clone(), runs.clone());
            move || {
                s.get();
                runs.set(runs.get() + 1);
            }
        });

        s.set(1);
        assert_eq!(runs.get(), 1);
        s.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn update_always_notifies() {
        let s = signal(1);
        let runs = Rc::new(Cell::new(0));
        let _e = effect({
            let (s, runs) = (s.clone(), runs.clone());
            move || {
                s.get();
                runs.set(runs.get() + 1);
            }
        });

        s.update(|_| {});
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn with_borrows_without_cloning() {
        let s = signal(String::from("hello"));
        assert_eq!(s.with(|v| v.len()), 5);
    }

    #[test]
    fn dropping_the_last_handle_frees_the_node() {
        let before = crate::reactive::graph_stats().signals;
        let s = signal(0);
        let copy = s.clone();
        drop(s);
        assert_eq!(crate::reactive::graph_stats().signals, before + 1);
        drop(copy);
        assert_eq!(crate::reactive::graph_stats().signals, before);
    }

    #[test]
    fn writes_inside_with_flush_after_the_borrow() {
        let s = signal(1);
        let t = signal(0);
        let _e = effect({
            let (s, t) = (s.clone(), t.clone());
            move || s.set(t.get() * 10)
        });
        assert_eq!(s.get(), 0);

        s.with(|v| t.set(*v + 2));

        assert_eq!(t.get(), 2);
        assert_eq!(s.get(), 20);
    }

    #[test]
    #[should_panic]
    fn reading_inside_update_panics() {
        let s = signal(1);
        s.update(|v| *v += s.get());
    }
}
