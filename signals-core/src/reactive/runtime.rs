//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns the dependency graph and drives evaluation.
//!
//! # How It Works
//!
//! 1. When a node is created, it is inserted into the runtime's graph.
//!
//! 2. When a computed or effect reads a node, the runtime links the two.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks direct readers dirty and indirect readers pending
//!    b. Queues the effects reached along the way
//!    c. Flushes the queue, unless a batch is open
//!    d. Leaves computeds alone - they recompute on next read
//!
//! # Thread Safety
//!
//! There is one runtime per thread, stored in a thread-local. Handles are
//! `!Send`, so a graph is only ever touched by the thread that built it and
//! no locking is needed.
//!
//! The graph sits in a `RefCell` that is only borrowed for short, non
//! re-entrant steps. Getters, effect bodies and drops of captured handles
//! always run with the graph released.

use std::cell::{Cell, RefCell};

use slotmap::SecondaryMap;
use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use crate::config::{default_config, RuntimeConfig};
use crate::error::{ReactiveError, Result};
use crate::graph::node::{Freshness, Role, Status};
use crate::graph::{CheckStep, Graph, GraphStats, LinkId, NodeId, NodeKind};

use super::context::TrackingGuard;

thread_local! {
    static RUNTIME: Runtime = Runtime::new(default_config());
}

/// The reactive runtime of the current thread.
pub(crate) struct Runtime {
    graph: RefCell<Graph>,

    /// Node whose evaluation is currently recording reads.
    pub(crate) active_sub: Cell<Option<NodeId>>,

    /// Scope collecting the effects created right now.
    pub(crate) active_scope: Cell<Option<NodeId>>,

    /// Subscribers saved by `pause_tracking`, innermost last.
    pub(crate) paused: RefCell<Vec<Option<NodeId>>>,

    pub(crate) batch_depth: Cell<usize>,
    flushing: Cell<bool>,

    /// Nodes whose handle dropped while the graph was borrowed.
    deferred_release: RefCell<Vec<NodeId>>,

    config: Cell<RuntimeConfig>,
}

impl Runtime {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            graph: RefCell::new(Graph::with_capacity(
                config.node_capacity,
                config.link_capacity,
            )),
            active_sub: Cell::new(None),
            active_scope: Cell::new(None),
            paused: RefCell::new(Vec::new()),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            deferred_release: RefCell::new(Vec::new()),
            config: Cell::new(config),
        }
    }

    /// Run `f` against the current thread's runtime.
    pub(crate) fn with<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        RUNTIME.with(f)
    }

    /// Like [`Runtime::with`], but returns `None` while the thread-local is
    /// being torn down.
    pub(crate) fn try_with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
        RUNTIME.try_with(f).ok()
    }

    /// Borrow the graph for one step.
    ///
    /// Effect callbacks freed during the step are dropped after the borrow
    /// ends, since they may own handles whose drop re-enters the runtime.
    pub(crate) fn graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        let (result, released) = {
            let mut graph = self.graph.borrow_mut();
            let result = f(&mut graph);
            (result, std::mem::take(&mut graph.released))
        };
        drop(released);
        self.release_deferred();
        result
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn create(&self, role: Role) -> NodeId {
        self.graph(|graph| graph.insert(role))
    }

    /// Free the node behind a dropped handle.
    pub(crate) fn release(&self, id: NodeId) {
        match self.graph.try_borrow_mut() {
            Ok(mut graph) => {
                graph.release(id);
                let released = std::mem::take(&mut graph.released);
                drop(graph);
                drop(released);
            }
            Err(_) => self.deferred_release.borrow_mut().push(id),
        }
    }

    fn release_deferred(&self) {
        loop {
            let pending = std::mem::take(&mut *self.deferred_release.borrow_mut());
            if pending.is_empty() {
                return;
            }
            for id in pending {
                self.release(id);
            }
        }
    }

    /// Detach an effect or scope from everything and free it.
    pub(crate) fn dispose(&self, id: NodeId) {
        let disposed = self.graph(|graph| {
            if !graph.contains(id) {
                return false;
            }
            graph.start_tracking(id);
            graph.end_tracking(id);
            graph.release(id);
            true
        });
        if disposed {
            debug!(node = ?id, "disposed");
        }
    }

    // ------------------------------------------------------------------
    // Reads and writes
    // ------------------------------------------------------------------

    /// Record a read of `dep` by the active subscriber.
    pub(crate) fn track(&self, dep: NodeId) {
        if let Some(sub) = self.active_sub.get() {
            self.graph(|graph| graph.link(dep, sub));
        }
    }

    /// Record a read of computed `dep`: by the active subscriber, or else by
    /// the active scope, which then keeps it subscribed until disposed.
    pub(crate) fn track_computed(&self, dep: NodeId) {
        if let Some(owner) = self.active_sub.get().or(self.active_scope.get()) {
            self.graph(|graph| graph.link(dep, owner));
        }
    }

    /// A signal's value changed: mark its readers and flush.
    pub(crate) fn signal_changed(&self, id: NodeId) {
        let Some(first) = self.graph(|graph| graph.first_sub(id)) else {
            return;
        };
        self.graph(|graph| graph.propagate(first));
        if self.batch_depth.get() == 0 {
            self.flush();
        }
    }

    /// Bring computed `id` up to date before its value is read.
    pub(crate) fn refresh_computed(&self, id: NodeId) -> Result<()> {
        let status = self
            .graph(|graph| graph.status(id))
            .ok_or_else(|| ReactiveError::Disposed(format!("{id:?}")))?;
        if status.tracking {
            return Err(ReactiveError::Cycle(format!("{id:?}")));
        }

        let stale = match status.freshness {
            Freshness::Clean => false,
            Freshness::Dirty => true,
            Freshness::Pending => self.resolve_pending(id),
        };
        if stale && self.update_computed(id) {
            self.shallow_propagate_from(id);
        }
        Ok(())
    }

    /// Run a dirty check for pending node `id`. Marks it `Dirty` and returns
    /// `true` if it has to re-run, otherwise settles it back to `Clean`.
    fn resolve_pending(&self, id: NodeId) -> bool {
        let dirty = match self.graph(|graph| graph.first_dep(id)) {
            Some(first) => self.check_dirty(first),
            None => false,
        };
        self.graph(|graph| {
            if dirty {
                if let Some(status) = graph.status_mut(id) {
                    status.freshness = Freshness::Dirty;
                }
            } else {
                graph.settle(id);
            }
        });
        dirty
    }

    /// Re-run computed `id`'s getter. Returns whether its value changed.
    pub(crate) fn update_computed(&self, id: NodeId) -> bool {
        let body = self.graph(|graph| match graph.nodes.get(id).map(|node| &node.role) {
            Some(Role::Computed { status, body }) if !status.tracking => body.upgrade(),
            _ => None,
        });
        let Some(body) = body else {
            return false;
        };

        let _guard = TrackingGuard::enter(self, id);
        body.recompute()
    }

    fn shallow_propagate_from(&self, id: NodeId) {
        self.graph(|graph| {
            if let Some(first) = graph.first_sub(id) {
                graph.shallow_propagate(first);
            }
        });
    }

    /// Walk the dependencies starting at `first` and decide whether their
    /// subscriber has to re-run.
    ///
    /// Dirty computeds met on the way are recomputed; pending ones are
    /// checked in turn, using an explicit stack instead of recursion.
    pub(crate) fn check_dirty(&self, first: LinkId) -> bool {
        // Links we descended through, innermost last. The dependency of each
        // is the pending computed whose inputs are being checked.
        let mut stack: SmallVec<[LinkId; 8]> = SmallVec::new();
        let mut current = first;

        'walk: loop {
            let mut dirty = false;
            match self.graph(|graph| graph.check_step(current)) {
                CheckStep::Gone => return true,
                CheckStep::SubscriberDirty => dirty = true,
                CheckStep::Recompute(dep) => {
                    if self.update_computed(dep) {
                        self.shallow_propagate_from(dep);
                        dirty = true;
                    }
                }
                CheckStep::Descend(first_dep) => {
                    stack.push(current);
                    current = first_dep;
                    continue 'walk;
                }
                CheckStep::Clean => {}
            }

            if !dirty {
                if let Some(next) = self.graph(|graph| graph.next_dep(current)) {
                    current = next;
                    continue 'walk;
                }
            }

            while let Some(parent) = stack.pop() {
                let Some(computed) = self.graph(|graph| graph.links.get(parent).map(|l| l.dep))
                else {
                    return true;
                };
                if dirty {
                    if self.update_computed(computed) {
                        self.shallow_propagate_from(computed);
                    } else {
                        dirty = false;
                    }
                } else {
                    self.graph(|graph| graph.settle(computed));
                }

                current = parent;
                if !dirty {
                    if let Some(next) = self.graph(|graph| graph.next_dep(current)) {
                        current = next;
                        continue 'walk;
                    }
                }
            }

            return dirty;
        }
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Create an effect owned by the active subscriber or scope and run it.
    pub(crate) fn create_effect(&self, body: std::rc::Rc<dyn Fn()>) -> NodeId {
        let owner = self.active_sub.get().or(self.active_scope.get());
        let id = self.graph(|graph| {
            let id = graph.insert(Role::Effect {
                status: Status::dirty(),
                body,
            });
            if let Some(owner) = owner {
                graph.link(id, owner);
            }
            id
        });
        self.run_effect(id);
        id
    }

    /// Create a scope owned by the active subscriber or scope and run `f`
    /// inside it.
    pub(crate) fn create_scope(&self, f: impl FnOnce()) -> NodeId {
        let owner = self.active_sub.get().or(self.active_scope.get());
        let id = self.graph(|graph| {
            let id = graph.insert(Role::Scope {
                status: Status::default(),
            });
            if let Some(owner) = owner {
                graph.link(id, owner);
            }
            id
        });
        {
            let _guard = TrackingGuard::enter_scope(self, id);
            f();
        }
        id
    }

    /// Run effect `id`'s body, re-recording its dependencies.
    fn run_effect(&self, id: NodeId) {
        let Some(body) = self.graph(|graph| graph.effect_body(id)) else {
            return;
        };
        {
            let _guard = TrackingGuard::enter(self, id);
            body();
        }
        // Inner effects dirtied by the body's own writes.
        self.process_pending_inner(id);
    }

    /// Flush one queued effect or scope. Returns whether its body re-ran.
    fn notify_effect(&self, id: NodeId) -> bool {
        let Some((kind, status)) =
            self.graph(|graph| Some((graph.kind(id)?, graph.status(id)?)))
        else {
            return false;
        };

        let rerun = kind == NodeKind::Effect
            && match status.freshness {
                Freshness::Dirty => true,
                Freshness::Pending => self.resolve_pending(id),
                Freshness::Clean => false,
            };
        if rerun {
            self.run_effect(id);
        } else {
            self.process_pending_inner(id);
        }
        rerun
    }

    /// Notify `id` and clear its `notified` mark if it declined to run.
    fn notify(&self, id: NodeId) {
        if !self.notify_effect(id) {
            self.graph(|graph| {
                if let Some(status) = graph.status_mut(id) {
                    status.notified = false;
                }
            });
        }
    }

    /// Notify the inner effects of `id` that a propagation reached.
    fn process_pending_inner(&self, id: NodeId) {
        let inner = self.graph(|graph| graph.take_pending_inner(id));
        for child in inner {
            self.notify(child);
        }
    }

    /// Drain the effect queue.
    ///
    /// A flush started while another one is running leaves the work to the
    /// outer loop, which picks up everything queued in the meantime.
    ///
    /// The flush limit caps how often one effect is notified within a flush,
    /// so wide fan-out is never cut. Once an effect goes over it, the rest of
    /// the queue is dropped and re-armed for the next write that reaches it.
    pub(crate) fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        let _flushing = FlushGuard(self);
        let limit = self.config.get().flush_limit;
        let mut rounds: SecondaryMap<NodeId, usize> = SecondaryMap::new();
        let mut notified = 0usize;

        while let Some(id) = self.graph(|graph| graph.queue.pop_front()) {
            let round = rounds.entry(id).map(|entry| {
                let round = entry.or_insert(0);
                *round += 1;
                *round
            });
            if round.is_some_and(|round| round > limit) {
                let dropped = self.graph(|graph| {
                    graph.queue.push_front(id);
                    graph.drain_queue()
                });
                error!(
                    limit,
                    dropped, "effect flush limit reached; dropping queued effects"
                );
                return;
            }
            notified += 1;
            let _unwound = UnwindGuard(self, id);
            self.notify(id);
        }

        if notified > 0 {
            trace!(notified, "flushed effects");
        }
    }

    pub(crate) fn end_batch(&self) -> Result<()> {
        let depth = self.batch_depth.get();
        if depth == 0 {
            warn!("end_batch called outside of a batch");
            return Err(ReactiveError::UnbalancedBatch);
        }
        self.batch_depth.set(depth - 1);
        if depth == 1 {
            self.flush();
        }
        Ok(())
    }

    pub(crate) fn set_config(&self, config: RuntimeConfig) {
        self.config.set(config);
    }
}

struct FlushGuard<'rt>(&'rt Runtime);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.flushing.set(false);
    }
}

/// Re-arms the effect being notified if notifying it panicked, e.g. in a
/// computed its dirty check recomputed. Effects still queued behind it run
/// at the next flush.
struct UnwindGuard<'rt>(&'rt Runtime, NodeId);

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let id = self.1;
            self.0.graph(|graph| graph.mark_unwound(id));
        }
    }
}

/// Node and link counts of the current thread's graph.
pub fn graph_stats() -> GraphStats {
    Runtime::with(|rt| rt.graph(|graph| graph.stats()))
}

/// Replace the configuration of the current thread's runtime.
pub fn configure(config: RuntimeConfig) -> Result<()> {
    config.validate()?;
    Runtime::with(|rt| rt.set_config(config));
    Ok(())
}

/// Configuration of the current thread's runtime.
pub fn current_config() -> RuntimeConfig {
    Runtime::with(|rt| rt.config.get())
}
