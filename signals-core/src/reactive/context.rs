//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the runtime links it to the current computation.
//!
//! # Implementation
//!
//! The active subscriber and the active scope live in the thread's
//! [`Runtime`]. Entering a computation swaps them in through a guard that
//! swaps the previous ones back when dropped, so nesting (a computed read
//! from an effect, an effect created inside an effect) restores the outer
//! context on the way out, even while unwinding.
//!
//! Pausing tracking keeps its own stack of saved subscribers, so that
//! `pause_tracking` / `resume_tracking` pairs can nest as well.

use tracing::warn;

use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

use super::runtime::Runtime;

/// Guard for one evaluation of a computed, effect or scope.
///
/// While it is alive, reads link to `node` and the node's dependency list is
/// being rebuilt. Dropping it prunes the dependencies that were not read
/// again and restores the previous context.
pub(crate) struct TrackingGuard<'rt> {
    runtime: &'rt Runtime,
    node: NodeId,
    prev_sub: Option<NodeId>,
    prev_scope: Option<NodeId>,
    scope: bool,
}

impl<'rt> TrackingGuard<'rt> {
    /// Make `node` the active subscriber.
    pub(crate) fn enter(runtime: &'rt Runtime, node: NodeId) -> Self {
        runtime.graph(|graph| graph.start_tracking(node));
        Self {
            runtime,
            node,
            prev_sub: runtime.active_sub.replace(Some(node)),
            prev_scope: runtime.active_scope.get(),
            scope: false,
        }
    }

    /// Make `scope` the active scope, with no active subscriber.
    pub(crate) fn enter_scope(runtime: &'rt Runtime, scope: NodeId) -> Self {
        runtime.graph(|graph| graph.start_tracking(scope));
        Self {
            runtime,
            node: scope,
            prev_sub: runtime.active_sub.replace(None),
            prev_scope: runtime.active_scope.replace(Some(scope)),
            scope: true,
        }
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        let unwinding = std::thread::panicking();
        let (node, scope) = (self.node, self.scope);
        self.runtime.graph(|graph| {
            graph.end_tracking(node);
            if unwinding && !scope {
                graph.mark_unwound(node);
            }
        });
        self.runtime.active_sub.set(self.prev_sub);
        self.runtime.active_scope.set(self.prev_scope);
    }
}

/// Stop recording reads until the matching [`resume_tracking`].
///
/// Calls nest: every pause saves the current subscriber and every resume
/// restores the most recently saved one.
pub fn pause_tracking() {
    Runtime::with(|rt| {
        let current = rt.active_sub.replace(None);
        rt.paused.borrow_mut().push(current);
    });
}

/// Undo the most recent [`pause_tracking`].
///
/// Returns [`ReactiveError::UnbalancedResume`] if tracking is not paused.
pub fn resume_tracking() -> Result<()> {
    Runtime::with(|rt| {
        let saved = rt.paused.borrow_mut().pop();
        match saved {
            Some(sub) => {
                rt.active_sub.set(sub);
                Ok(())
            }
            None => {
                warn!("resume_tracking called without a matching pause_tracking");
                Err(ReactiveError::UnbalancedResume)
            }
        }
    })
}

/// Pauses tracking for as long as it is alive.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl PauseGuard {
    pub fn new() -> Self {
        pause_tracking();
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Default for PauseGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        // Balanced by construction.
        let _ = resume_tracking();
    }
}

/// Run `f` without recording any of its reads.
///
/// # Example
///
/// ```rust
/// use signals_core::reactive::{effect, signal, untracked};
///
/// let a = signal(1);
/// let b = signal(10);
/// let _e = effect({
///     let (a, b) = (a.clone(), b.clone());
///     move || {
///         let _sum = a.get() + untracked(|| b.get());
///     }
/// });
///
/// // Only `a` is a dependency.
/// assert_eq!(a.subscriber_count(), 1);
/// assert_eq!(b.subscriber_count(), 0);
/// ```
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = PauseGuard::new();
    f()
}

/// Whether reads are currently being recorded.
pub fn is_tracking() -> bool {
    Runtime::with(|rt| rt.active_sub.get().is_some())
}

/// The node recording reads right now, if any.
pub fn current_subscriber() -> Option<NodeId> {
    Runtime::with(|rt| rt.active_sub.get())
}
