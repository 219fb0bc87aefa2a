//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//!
//! Each node has a role fixed at creation. Signals are pure sources and carry
//! no status at all; computeds, effects and scopes are subscribers and each
//! carry a [`Status`] describing where they stand in the current propagation.

use std::rc::{Rc, Weak};

use super::link::LinkId;

slotmap::new_key_type! {
    /// Unique identifier for a node in the dependency graph.
    ///
    /// Ids are generational: once a node is freed, its id never resolves to
    /// another node.
    pub struct NodeId;
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    Signal,

    /// A derived node. Caches a value computed from its dependencies.
    Computed,

    /// An effect node. Runs its callback when its dependencies change.
    Effect,

    /// A grouping node that owns the effects created inside it.
    Scope,
}

/// How far a subscriber's cached state can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Freshness {
    /// Up-to-date.
    #[default]
    Clean,

    /// Some transitive dependency changed. A dirty check decides whether
    /// this node really has to re-run.
    Pending,

    /// A direct dependency changed. Must re-run before its value is used.
    Dirty,
}

/// Propagation state of a subscriber node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub freshness: Freshness,

    /// The node's body is running and its dependency list is being rebuilt.
    pub tracking: bool,

    /// Already reached by the current propagation (and queued, for effects).
    pub notified: bool,

    /// Reached by a propagation while it was tracking.
    pub recursed: bool,

    /// An inner effect owned by this node needs a flush even though the node
    /// itself may be clean. Only effects and scopes own inner effects.
    pub pending_inner: bool,
}

impl Status {
    pub(crate) fn dirty() -> Self {
        Self {
            freshness: Freshness::Dirty,
            ..Self::default()
        }
    }

    /// Whether a propagation has left a mark on this node.
    pub fn is_propagated(&self) -> bool {
        self.freshness != Freshness::Clean || self.pending_inner
    }

    pub(crate) fn has(&self, target: Target) -> bool {
        match target {
            Target::Dirty => self.freshness == Freshness::Dirty,
            Target::Pending => self.freshness >= Freshness::Pending,
            Target::PendingInner => self.pending_inner,
        }
    }

    pub(crate) fn apply(&mut self, target: Target) {
        match target {
            Target::Dirty => self.freshness = Freshness::Dirty,
            Target::Pending => {
                if self.freshness == Freshness::Clean {
                    self.freshness = Freshness::Pending;
                }
            }
            Target::PendingInner => self.pending_inner = true,
        }
    }
}

/// The mark a propagation leaves on the subscribers of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Dirty,
    Pending,
    PendingInner,
}

/// A cached derivation that can be brought up to date.
pub(crate) trait Recompute {
    /// Run the getter and store its result. Returns whether the value changed.
    fn recompute(&self) -> bool;
}

/// Role-specific payload of a node.
pub(crate) enum Role {
    Signal,
    Computed {
        status: Status,
        body: Weak<dyn Recompute>,
    },
    Effect {
        status: Status,
        body: Rc<dyn Fn()>,
    },
    Scope {
        status: Status,
    },
}

/// A node in the dependency graph.
pub(crate) struct Node {
    pub(crate) role: Role,

    /// Head of the list of links to the nodes this node reads from.
    pub(crate) deps: Option<LinkId>,

    /// Tracking cursor into `deps`. Everything up to and including it was
    /// read during the current evaluation; outside of tracking it is the
    /// last dependency.
    pub(crate) deps_tail: Option<LinkId>,

    /// Head of the list of links to the nodes that read this node.
    pub(crate) subs: Option<LinkId>,
    pub(crate) subs_tail: Option<LinkId>,
}

impl Node {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            deps: None,
            deps_tail: None,
            subs: None,
            subs_tail: None,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.role {
            Role::Signal => NodeKind::Signal,
            Role::Computed { .. } => NodeKind::Computed,
            Role::Effect { .. } => NodeKind::Effect,
            Role::Scope { .. } => NodeKind::Scope,
        }
    }

    pub(crate) fn status(&self) -> Option<&Status> {
        match &self.role {
            Role::Signal => None,
            Role::Computed { status, .. }
            | Role::Effect { status, .. }
            | Role::Scope { status } => Some(status),
        }
    }

    pub(crate) fn status_mut(&mut self) -> Option<&mut Status> {
        match &mut self.role {
            Role::Signal => None,
            Role::Computed { status, .. }
            | Role::Effect { status, .. }
            | Role::Scope { status } => Some(status),
        }
    }

    /// Effects and scopes: nodes that are flushed rather than read.
    pub(crate) fn is_effect_like(&self) -> bool {
        matches!(self.role, Role::Effect { .. } | Role::Scope { .. })
    }
}
