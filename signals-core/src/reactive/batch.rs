//! Batching
//!
//! Writes inside a batch still mark the graph immediately, but effects are
//! only flushed when the outermost batch ends. Each effect queued during the
//! batch runs at most once, however many of its dependencies changed.

use crate::error::Result;

use super::runtime::Runtime;

/// Open a batch. Batches nest.
pub fn start_batch() {
    Runtime::with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
}

/// Close the innermost batch, flushing queued effects if it was the
/// outermost one.
///
/// Returns [`ReactiveError::UnbalancedBatch`](crate::error::ReactiveError::UnbalancedBatch)
/// if no batch is open.
pub fn end_batch() -> Result<()> {
    Runtime::with(|rt| rt.end_batch())
}

/// Run `f` inside a batch.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use signals_core::reactive::{batch, effect, signal};
///
/// let a = signal(1);
/// let b = signal(2);
/// let runs = Rc::new(Cell::new(0));
/// let _e = effect({
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     move || {
///         let _ = a.get() + b.get();
///         runs.set(runs.get() + 1);
///     }
/// });
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(runs.get(), 2);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _guard = BatchGuard::new();
    f()
}

/// Keeps a batch open for as long as it is alive.
///
/// If the guard is dropped during a panic the batch is closed without
/// flushing; queued effects run at the next flush.
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct BatchGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl BatchGuard {
    pub fn new() -> Self {
        start_batch();
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Default for BatchGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            Runtime::with(|rt| rt.batch_depth.set(rt.batch_depth.get().saturating_sub(1)));
        } else {
            let _ = end_batch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;
    use crate::reactive::{effect, signal};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn nested_batches_flush_once_at_the_outermost_end() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let _e = effect({
            let (s, runs) = (s.clone(), runs.clone());
            move || {
                s.get();
                runs.set(runs.get() + 1);
            }
        });

        start_batch();
        start_batch();
        s.set(1);
        end_batch().unwrap();
        assert_eq!(runs.get(), 1);
        s.set(2);
        end_batch().unwrap();

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unbalanced_end_is_an_error() {
        assert_eq!(end_batch(), Err(ReactiveError::UnbalancedBatch));
        // Counter stays at zero: writes flush immediately.
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let _e = effect({
            let (s, runs) = (s.clone(), runs.clone());
            move || {
                s.get();
                runs.set(runs.get() + 1);
            }
        });
        s.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn batch_returns_the_closure_result() {
        assert_eq!(batch(|| 7), 7);
    }
}
