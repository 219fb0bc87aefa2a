//! Change Propagation
//!
//! The push half of the push-pull algorithm. When a signal changes:
//!
//! 1. Its direct subscribers are marked `Dirty`.
//! 2. Subscribers of those subscribers are marked `Pending`: they only have
//!    to re-run if a dirty check finds that one of their inputs really
//!    produced a different value.
//! 3. Owners reached through an inner effect are marked `pending_inner`, so
//!    that flushing the owner notifies the inner effect without re-running
//!    the owner's own body.
//! 4. Effects at the end of a chain are queued for the next flush.
//!
//! Computeds are never evaluated here. The pull half ([`CheckStep`] driven
//! by the runtime) decides lazily, on read, what actually has to recompute.

use smallvec::SmallVec;
use tracing::trace;

use super::link::LinkId;
use super::node::{Freshness, NodeId, NodeKind, Role, Target};
use super::Graph;

/// What the dirty check should do with one dependency link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckStep {
    /// The link no longer exists. The caller should assume the worst.
    Gone,

    /// The subscriber was already marked dirty by an earlier step.
    SubscriberDirty,

    /// The dependency is a dirty computed. Recompute it and compare.
    Recompute(NodeId),

    /// The dependency is a pending computed. Check its own dependencies,
    /// starting at this link.
    Descend(LinkId),

    /// Nothing to do for this dependency.
    Clean,
}

impl Graph {
    /// Mark everything downstream of `first` and its siblings.
    ///
    /// `first` is the head of the subscriber list of a node whose value just
    /// changed.
    pub(crate) fn propagate(&mut self, first: LinkId) {
        // Sibling to resume at once a level is exhausted, with the mark that
        // level hands out.
        let mut branches: SmallVec<[(LinkId, Target); 8]> = SmallVec::new();
        let mut current = Some(first);
        let mut target = Target::Dirty;
        let mut visited = 0usize;

        loop {
            let Some(id) = current else {
                match branches.pop() {
                    Some((resume, mark)) => {
                        current = Some(resume);
                        target = mark;
                        continue;
                    }
                    None => break,
                }
            };
            let Some(link) = self.links.get(id).copied() else {
                current = None;
                continue;
            };
            visited += 1;

            match self.mark(id, link.sub, target) {
                Some((children, mark)) => {
                    if let Some(next) = link.next_sub {
                        branches.push((next, target));
                    }
                    current = Some(children);
                    target = mark;
                }
                None => current = link.next_sub,
            }
        }

        trace!(visited, queued = self.queue.len(), "propagated change");
    }

    /// Apply `target` to the subscriber of link `id`.
    ///
    /// Returns the subscriber list to continue into, and the mark for it,
    /// when the subscriber's own subscribers have to hear about this change.
    fn mark(&mut self, id: LinkId, sub: NodeId, target: Target) -> Option<(LinkId, Target)> {
        let node = self.nodes.get(sub)?;
        let kind = node.kind();
        // Scopes have no reactive reads; only inner effects concern them.
        if kind == NodeKind::Scope && target != Target::PendingInner {
            return None;
        }
        let before = *node.status()?;
        let effect_like = node.is_effect_like();
        // A scope's tracking only collects ownership links.
        let tracking = before.tracking && kind != NodeKind::Scope;
        let parent = self.notify_parent(sub);

        let descend = if !tracking && !before.recursed && !before.is_propagated() {
            self.update_status(sub, |status| {
                status.apply(target);
                status.notified = true;
            });
            true
        } else if before.recursed && !tracking {
            self.update_status(sub, |status| {
                status.recursed = false;
                status.apply(target);
                status.notified = true;
            });
            true
        } else if !before.is_propagated() && self.is_tracked_link(id, sub) {
            // Changed while it is evaluating and has already read this
            // dependency.
            self.update_status(sub, |status| {
                status.recursed = true;
                status.apply(target);
                status.notified = true;
            });
            if parent.is_none() {
                return None;
            }
            true
        } else {
            if !tracking && !before.has(target) {
                self.update_status(sub, |status| {
                    status.apply(target);
                    status.notified = true;
                });
                if effect_like && !before.notified {
                    self.queue.push_back(sub);
                }
            } else if !before.has(target) && before.is_propagated() && self.is_tracked_link(id, sub)
            {
                self.update_status(sub, |status| status.apply(target));
            }
            false
        };

        if !descend {
            return None;
        }
        if parent.is_some() {
            return parent;
        }
        if effect_like {
            self.queue.push_back(sub);
        }
        None
    }

    /// Where a change continues after reaching `sub`.
    ///
    /// A computed hands `Pending` to its readers. An effect or scope hands
    /// `pending_inner` to its owner when the owner is an effect or scope; an
    /// effect owned by a computed is flushed on its own.
    fn notify_parent(&self, sub: NodeId) -> Option<(LinkId, Target)> {
        let node = self.nodes.get(sub)?;
        let first = node.subs?;
        match node.role {
            Role::Signal => None,
            Role::Computed { .. } => Some((first, Target::Pending)),
            Role::Effect { .. } | Role::Scope { .. } => {
                let owner = self.links.get(first)?.sub;
                let owned_by_effect = self.nodes.get(owner)?.is_effect_like();
                owned_by_effect.then_some((first, Target::PendingInner))
            }
        }
    }

    fn update_status(&mut self, id: NodeId, f: impl FnOnce(&mut super::node::Status)) {
        if let Some(status) = self.status_mut(id) {
            f(status);
        }
    }

    /// Turn the `Pending` readers in the subscriber list starting at `first`
    /// into `Dirty` ones. Used after a computed recomputed to a new value:
    /// anything that was waiting on a dirty check now knows the answer.
    pub(crate) fn shallow_propagate(&mut self, first: LinkId) {
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            let Some(link) = self.links.get(id).copied() else {
                break;
            };
            cursor = link.next_sub;

            let Some(node) = self.nodes.get_mut(link.sub) else {
                continue;
            };
            let is_effect = node.kind() == NodeKind::Effect;
            let enqueue = match &mut node.role {
                Role::Signal | Role::Scope { .. } => continue,
                Role::Computed { status, .. } | Role::Effect { status, .. } => {
                    if status.freshness != Freshness::Pending {
                        continue;
                    }
                    status.freshness = Freshness::Dirty;
                    let was_notified = status.notified;
                    status.notified = true;
                    is_effect && !was_notified
                }
            };
            if enqueue {
                self.queue.push_back(link.sub);
            }
        }
    }

    /// Classify dependency link `id` for the dirty check.
    pub(crate) fn check_step(&mut self, id: LinkId) -> CheckStep {
        let Some(link) = self.links.get(id).copied() else {
            return CheckStep::Gone;
        };
        if self
            .status(link.sub)
            .is_some_and(|status| status.freshness == Freshness::Dirty)
        {
            return CheckStep::SubscriberDirty;
        }
        let Some(node) = self.nodes.get(link.dep) else {
            return CheckStep::Gone;
        };
        let first_dep = node.deps;
        // A computed that is evaluating right now is left alone.
        let freshness = match &node.role {
            Role::Computed { status, .. } if !status.tracking => status.freshness,
            _ => return CheckStep::Clean,
        };
        match freshness {
            Freshness::Dirty => CheckStep::Recompute(link.dep),
            Freshness::Pending => match first_dep {
                Some(first) => CheckStep::Descend(first),
                None => {
                    self.settle(link.dep);
                    CheckStep::Clean
                }
            },
            Freshness::Clean => CheckStep::Clean,
        }
    }

    /// Resolve a `Pending` node to `Clean` after a dirty check found nothing.
    pub(crate) fn settle(&mut self, id: NodeId) {
        if let Some(status) = self.status_mut(id) {
            if status.freshness == Freshness::Pending {
                status.freshness = Freshness::Clean;
            }
        }
    }

    /// Leave `id` ready to re-run after its evaluation unwound.
    ///
    /// Its readers never heard about the change that failed, so the node is
    /// also flagged `recursed`: the next propagation that reaches it passes
    /// through to its readers and queues it again.
    pub(crate) fn mark_unwound(&mut self, id: NodeId) {
        let is_scope = self.kind(id) == Some(NodeKind::Scope);
        if let Some(status) = self.status_mut(id) {
            status.notified = false;
            status.tracking = false;
            if !is_scope {
                status.freshness = Freshness::Dirty;
                status.recursed = true;
            }
        }
    }

    /// Clear `pending_inner` on `id` and return the inner effects that still
    /// carry a propagation mark.
    pub(crate) fn take_pending_inner(&mut self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let mut inner = SmallVec::new();
        match self.status_mut(id) {
            Some(status) if status.pending_inner => status.pending_inner = false,
            _ => return inner,
        }
        let mut cursor = self.first_dep(id);
        while let Some(link) = cursor {
            let dep = self.links[link].dep;
            cursor = self.links[link].next_dep;
            if let Some(node) = self.nodes.get(dep) {
                if node.is_effect_like()
                    && node.status().is_some_and(|status| status.is_propagated())
                {
                    inner.push(dep);
                }
            }
        }
        inner
    }

    /// Drop every queued notification.
    ///
    /// Dropped effects keep their stale state but lose `notified`, and are
    /// flagged `recursed` together with any inner effects waiting on them, so
    /// the next propagation that reaches one queues it again.
    pub(crate) fn drain_queue(&mut self) -> usize {
        let dropped: Vec<NodeId> = self.queue.drain(..).collect();
        let mut stack: SmallVec<[NodeId; 8]> = dropped.iter().copied().collect();
        while let Some(id) = stack.pop() {
            stack.extend(self.take_pending_inner(id));
            if let Some(status) = self.status_mut(id) {
                status.notified = false;
                status.recursed = true;
            }
        }
        dropped.len()
    }
}
